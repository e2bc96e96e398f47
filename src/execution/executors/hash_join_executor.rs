use std::collections::HashMap;

use itertools::Itertools;

use crate::catalog::Schema;
use crate::common::rid::Rid;
use crate::dbtype::value::Value;
use crate::execution::executor::{ExecutionResult, Executor};
use crate::execution::plans::HashJoinPlanNode;
use crate::storage::table::tuple::Tuple;

/// Hash join over a single equi-key. `init` drains the left child into a
/// key -> rows map; `next` walks the right child, probing the map and
/// stepping a position through the current match list so rows with
/// duplicate keys all pair up.
pub struct HashJoinExecutor {
    plan: HashJoinPlanNode,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    join_map: HashMap<Value, Vec<Tuple>>,
    right_tuple: Option<Tuple>,
    probe_pos: usize,
}

impl HashJoinExecutor {
    pub fn new(
        plan: HashJoinPlanNode,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
    ) -> HashJoinExecutor {
        HashJoinExecutor {
            plan,
            left,
            right,
            join_map: HashMap::new(),
            right_tuple: None,
            probe_pos: 0,
        }
    }
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.left.init()?;
        self.right.init()?;

        // Build phase: key every left row.
        let mut pairs = Vec::new();
        while let Some((tuple, _)) = self.left.next()? {
            let key = self
                .plan
                .left_key_expr
                .evaluate(&tuple, self.left.output_schema());
            pairs.push((key, tuple));
        }
        self.join_map = pairs.into_iter().into_group_map();

        // Prime the probe cursor.
        self.right_tuple = self.right.next()?.map(|(tuple, _)| tuple);
        self.probe_pos = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        loop {
            let Some(right_tuple) = self.right_tuple.clone() else {
                return Ok(None);
            };
            let key = self
                .plan
                .right_key_expr
                .evaluate(&right_tuple, self.right.output_schema());

            if let Some(matches) = self.join_map.get(&key) {
                if self.probe_pos < matches.len() {
                    let left_tuple = &matches[self.probe_pos];
                    self.probe_pos += 1;

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
                    let rid = left_tuple.rid();
                    let mut out = Tuple::from_values(&values, &self.plan.output_schema);
                    out.set_rid(rid);
                    return Ok(Some((out, rid)));
                }
            }

            // No matches left for this right row; advance the cursor.
            self.right_tuple = self.right.next()?.map(|(tuple, _)| tuple);
            self.probe_pos = 0;
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
