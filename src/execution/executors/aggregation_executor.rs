use std::cmp::Ordering;
use std::collections::HashMap;

use crate::catalog::Schema;
use crate::common::rid::Rid;
use crate::dbtype::value::Value;
use crate::execution::executor::{ExecutionResult, Executor};
use crate::execution::plans::{AggregationPlanNode, AggregationType};
use crate::storage::table::tuple::Tuple;

/// A group's key: the group-by expressions evaluated in order. Grouping
/// falls out of `Value`'s derived equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub group_bys: Vec<Value>,
}

/// A group's running aggregates, one slot per declared aggregate.
#[derive(Debug, Clone)]
pub struct AggregateValue {
    pub aggregates: Vec<Value>,
}

/// In-memory hash table specialized for grouped aggregation: values start
/// at their identities (0 for the counting aggregates and Sum, null for
/// Min/Max) and fold one incoming row at a time.
pub struct SimpleAggregationHashTable {
    aggregate_types: Vec<AggregationType>,
    map: HashMap<AggregateKey, AggregateValue>,
}

impl SimpleAggregationHashTable {
    pub fn new(aggregate_types: Vec<AggregationType>) -> SimpleAggregationHashTable {
        SimpleAggregationHashTable {
            aggregate_types,
            map: HashMap::new(),
        }
    }

    fn initial_value(&self) -> AggregateValue {
        AggregateValue {
            aggregates: self
                .aggregate_types
                .iter()
                .map(|t| match t {
                    AggregationType::CountStar
                    | AggregationType::Count
                    | AggregationType::Sum => Value::Integer(0),
                    AggregationType::Min | AggregationType::Max => Value::Null,
                })
                .collect(),
        }
    }

    /// Fold one row's inputs into its group, creating the group at its
    /// identity values first if this is the group's first row.
    pub fn insert_combine(&mut self, key: AggregateKey, input: AggregateValue) {
        let initial = self.initial_value();
        let entry = self.map.entry(key).or_insert(initial);
        for (idx, agg_type) in self.aggregate_types.iter().enumerate() {
            let current = &entry.aggregates[idx];
            let incoming = &input.aggregates[idx];
            let folded = match agg_type {
                AggregationType::CountStar => current.add(&Value::Integer(1)),
                AggregationType::Count => {
                    if incoming.is_null() {
                        current.clone()
                    } else {
                        current.add(&Value::Integer(1))
                    }
                }
                AggregationType::Sum => {
                    if incoming.is_null() {
                        current.clone()
                    } else {
                        current.add(incoming)
                    }
                }
                AggregationType::Min => {
                    if incoming.is_null()
                        || (!current.is_null() && current.compare(incoming) != Ordering::Greater)
                    {
                        current.clone()
                    } else {
                        incoming.clone()
                    }
                }
                AggregationType::Max => {
                    if incoming.is_null()
                        || (!current.is_null() && current.compare(incoming) != Ordering::Less)
                    {
                        current.clone()
                    } else {
                        incoming.clone()
                    }
                }
            };
            entry.aggregates[idx] = folded;
        }
    }

    pub fn into_entries(self) -> Vec<(AggregateKey, AggregateValue)> {
        self.map.into_iter().collect()
    }
}

/// Grouped aggregation: `init` drains the child into the aggregation hash
/// table; `next` walks the groups, applying the optional having predicate
/// to each (group-by, aggregates) pair before projecting the output row.
pub struct AggregationExecutor {
    plan: AggregationPlanNode,
    child: Box<dyn Executor>,
    entries: Vec<(AggregateKey, AggregateValue)>,
    cursor: usize,
}

impl AggregationExecutor {
    pub fn new(plan: AggregationPlanNode, child: Box<dyn Executor>) -> AggregationExecutor {
        AggregationExecutor {
            plan,
            child,
            entries: Vec::new(),
            cursor: 0,
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()?;

        let mut table = SimpleAggregationHashTable::new(self.plan.aggregate_types.clone());
        while let Some((tuple, _)) = self.child.next()? {
            let schema = self.child.output_schema();
            let key = AggregateKey {
                group_bys: self
                    .plan
                    .group_by_exprs
                    .iter()
                    .map(|e| e.evaluate(&tuple, schema))
                    .collect(),
            };
            let input = AggregateValue {
                aggregates: self
                    .plan
                    .aggregate_exprs
                    .iter()
                    .map(|e| e.evaluate(&tuple, schema))
                    .collect(),
            };
            table.insert_combine(key, input);
        }
        self.entries = table.into_entries();
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        while self.cursor < self.entries.len() {
            let (key, value) = &self.entries[self.cursor];
            self.cursor += 1;

            if let Some(having) = &self.plan.having {
                if !having
                    .evaluate_aggregate(&key.group_bys, &value.aggregates)
                    .as_bool()
                {
                    continue;
                }
            }

            let values: Vec<Value> = self
                .plan
                .output_exprs
                .iter()
                .map(|e| e.evaluate_aggregate(&key.group_bys, &value.aggregates))
                .collect();
            let out = Tuple::from_values(&values, &self.plan.output_schema);
            // Synthesized rows have no home in any table heap.
            return Ok(Some((out, Rid::invalid())));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
