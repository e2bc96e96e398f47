use crate::catalog::Schema;
use crate::common::rid::Rid;
use crate::dbtype::value::Value;
use crate::execution::executor::{ExecutionResult, Executor};
use crate::execution::plans::NestedLoopJoinPlanNode;
use crate::storage::table::tuple::Tuple;

/// Tuple-at-a-time nested loop join. The left cursor is persistent state:
/// it advances only when the right side is exhausted, and the right side is
/// reinitialized for each left tuple — in that order, so the right child is
/// never pulled past the left child's last row.
pub struct NestedLoopJoinExecutor {
    plan: NestedLoopJoinPlanNode,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    left_tuple: Option<(Tuple, Rid)>,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        plan: NestedLoopJoinPlanNode,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
    ) -> NestedLoopJoinExecutor {
        NestedLoopJoinExecutor {
            plan,
            left,
            right,
            left_tuple: None,
        }
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.left.init()?;
        self.right.init()?;
        self.left_tuple = self.left.next()?;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        if self.left_tuple.is_none() {
            return Ok(None);
        }

        loop {
            let right_tuple = match self.right.next()? {
                Some((tuple, _)) => tuple,
                None => {
                    // Right side exhausted: move the left cursor first, so
                    // a finished join never touches the right child again.
                    self.left_tuple = self.left.next()?;
                    if self.left_tuple.is_none() {
                        return Ok(None);
                    }
                    self.right.init()?;
                    match self.right.next()? {
                        Some((tuple, _)) => tuple,
                        // The right side is empty altogether.
                        None => return Ok(None),
                    }
                }
            };

            let (left_tuple, left_rid) = self.left_tuple.as_ref().unwrap();
            let matches = match &self.plan.predicate {
                Some(predicate) => predicate
                    .evaluate_join(
                        left_tuple,
                        self.left.output_schema(),
                        &right_tuple,
                        self.right.output_schema(),
                    )
                    .as_bool(),
                None => true,
            };
            if !matches {
                continue;
            }

            let values: Vec<Value> = self
                .plan
                .output_exprs
                .iter()
                .map(|e| {
                    e.evaluate_join(
                        left_tuple,
                        self.left.output_schema(),
                        &right_tuple,
                        self.right.output_schema(),
                    )
                })
                .collect();
            let mut out = Tuple::from_values(&values, &self.plan.output_schema);
            out.set_rid(*left_rid);
            return Ok(Some((out, *left_rid)));
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
