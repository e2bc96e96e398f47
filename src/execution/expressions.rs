use std::cmp::Ordering;

use crate::catalog::schema::Schema;
use crate::dbtype::value::Value;
use crate::storage::table::tuple::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonType {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonType {
    fn matches(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonType::Equal => ordering == Ordering::Equal,
            ComparisonType::NotEqual => ordering != Ordering::Equal,
            ComparisonType::LessThan => ordering == Ordering::Less,
            ComparisonType::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonType::GreaterThan => ordering == Ordering::Greater,
            ComparisonType::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }
}

/// Scalar expressions evaluated against operator rows. The three evaluate
/// flavors mirror the three row shapes an operator sees: a plain tuple, a
/// joined pair of tuples, and an aggregation's (group-by, aggregates) pair.
#[derive(Debug, Clone)]
pub enum Expression {
    /// One column of the input. For joins, `tuple_idx` 0 reads the left
    /// side and 1 the right.
    ColumnValue { tuple_idx: usize, column_idx: usize },
    Constant { value: Value },
    Comparison {
        left: Box<Expression>,
        right: Box<Expression>,
        comparison_type: ComparisonType,
    },
    /// A term of an aggregation's output: one of the group-by columns, or
    /// one of the computed aggregates.
    AggregateRef { is_group_by: bool, term_idx: usize },
}

impl Expression {
    pub fn column(column_idx: usize) -> Expression {
        Expression::ColumnValue {
            tuple_idx: 0,
            column_idx,
        }
    }

    pub fn join_column(tuple_idx: usize, column_idx: usize) -> Expression {
        Expression::ColumnValue {
            tuple_idx,
            column_idx,
        }
    }

    pub fn constant(value: Value) -> Expression {
        Expression::Constant { value }
    }

    pub fn comparison(
        left: Expression,
        right: Expression,
        comparison_type: ComparisonType,
    ) -> Expression {
        Expression::Comparison {
            left: Box::new(left),
            right: Box::new(right),
            comparison_type,
        }
    }

    pub fn group_by_ref(term_idx: usize) -> Expression {
        Expression::AggregateRef {
            is_group_by: true,
            term_idx,
        }
    }

    pub fn aggregate_ref(term_idx: usize) -> Expression {
        Expression::AggregateRef {
            is_group_by: false,
            term_idx,
        }
    }

    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Value {
        match self {
            Expression::ColumnValue { column_idx, .. } => tuple.value(schema, *column_idx),
            Expression::Constant { value } => value.clone(),
            Expression::Comparison {
                left,
                right,
                comparison_type,
            } => {
                let ordering = left
                    .evaluate(tuple, schema)
                    .compare(&right.evaluate(tuple, schema));
                Value::Boolean(comparison_type.matches(ordering))
            }
            Expression::AggregateRef { .. } => {
                panic!("aggregate reference evaluated outside an aggregation")
            }
        }
    }

    pub fn evaluate_join(
        &self,
        left: &Tuple,
        left_schema: &Schema,
        right: &Tuple,
        right_schema: &Schema,
    ) -> Value {
        match self {
            Expression::ColumnValue {
                tuple_idx,
                column_idx,
            } => {
                if *tuple_idx == 0 {
                    left.value(left_schema, *column_idx)
                } else {
                    right.value(right_schema, *column_idx)
                }
            }
            Expression::Constant { value } => value.clone(),
            Expression::Comparison {
                left: lhs,
                right: rhs,
                comparison_type,
            } => {
                let ordering = lhs
                    .evaluate_join(left, left_schema, right, right_schema)
                    .compare(&rhs.evaluate_join(left, left_schema, right, right_schema));
                Value::Boolean(comparison_type.matches(ordering))
            }
            Expression::AggregateRef { .. } => {
                panic!("aggregate reference evaluated outside an aggregation")
            }
        }
    }

    pub fn evaluate_aggregate(&self, group_bys: &[Value], aggregates: &[Value]) -> Value {
        match self {
            Expression::AggregateRef {
                is_group_by,
                term_idx,
            } => {
                if *is_group_by {
                    group_bys[*term_idx].clone()
                } else {
                    aggregates[*term_idx].clone()
                }
            }
            Expression::Constant { value } => value.clone(),
            Expression::Comparison {
                left,
                right,
                comparison_type,
            } => {
                let ordering = left
                    .evaluate_aggregate(group_bys, aggregates)
                    .compare(&right.evaluate_aggregate(group_bys, aggregates));
                Value::Boolean(comparison_type.matches(ordering))
            }
            Expression::ColumnValue { .. } => {
                panic!("column reference evaluated against an aggregation")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::{Column, DataType};

    #[test]
    fn test_comparison_over_tuple() {
        let schema = Schema::new(vec![
            Column::new("a", DataType::Integer),
            Column::new("b", DataType::Integer),
        ]);
        let tuple = Tuple::from_values(&[Value::Integer(3), Value::Integer(7)], &schema);

        let predicate = Expression::comparison(
            Expression::column(0),
            Expression::constant(Value::Integer(5)),
            ComparisonType::LessThan,
        );
        assert_eq!(Value::Boolean(true), predicate.evaluate(&tuple, &schema));

        let predicate = Expression::comparison(
            Expression::column(1),
            Expression::constant(Value::Integer(5)),
            ComparisonType::LessThan,
        );
        assert_eq!(Value::Boolean(false), predicate.evaluate(&tuple, &schema));
    }

    #[test]
    fn test_aggregate_refs() {
        let group_bys = vec![Value::Integer(1)];
        let aggregates = vec![Value::Integer(10), Value::Integer(20)];
        assert_eq!(
            Value::Integer(1),
            Expression::group_by_ref(0).evaluate_aggregate(&group_bys, &aggregates)
        );
        assert_eq!(
            Value::Integer(20),
            Expression::aggregate_ref(1).evaluate_aggregate(&group_bys, &aggregates)
        );
    }
}
