use std::collections::HashSet;

use crate::catalog::Schema;
use crate::common::rid::Rid;
use crate::dbtype::value::Value;
use crate::execution::executor::{ExecutionResult, Executor};
use crate::execution::plans::DistinctPlanNode;
use crate::storage::table::tuple::Tuple;

/// Removes duplicate rows from the child's output. `init` drains the child,
/// keeping the first row of each distinct value vector; `next` replays the
/// survivors in their arrival order.
pub struct DistinctExecutor {
    plan: DistinctPlanNode,
    child: Box<dyn Executor>,
    unique: Vec<(Tuple, Rid)>,
    cursor: usize,
}

impl DistinctExecutor {
    pub fn new(plan: DistinctPlanNode, child: Box<dyn Executor>) -> DistinctExecutor {
        DistinctExecutor {
            plan,
            child,
            unique: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for DistinctExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;
        let mut seen: HashSet<Vec<Value>> = HashSet::new();
        self.unique.clear();
        while let Some((tuple, rid)) = self.child.next()? {
            let key = tuple.values(self.child.output_schema());
            if seen.insert(key) {
                self.unique.push((tuple, rid));
            }
        }
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some((tuple, rid)) = self.unique.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some((tuple.clone(), *rid)))
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
