use std::collections::HashMap;

use derive_new::new;

use crate::catalog::schema::Schema;
use crate::common::config::TableOid;
use crate::dbtype::value::Value;
use crate::execution::expressions::Expression;

/// How one column changes under an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    /// Replace the column with the given integer.
    Set,
    /// Add the given integer delta to the column.
    Add,
}

#[derive(Debug, Clone, Copy, new)]
pub struct UpdateInfo {
    pub update_type: UpdateType,
    pub update_value: i32,
}

/// The aggregate functions the aggregation operator computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone, new)]
pub struct SeqScanPlanNode {
    pub output_schema: Schema,
    /// One expression per output column, evaluated against the raw table
    /// tuple.
    pub output_exprs: Vec<Expression>,
    pub predicate: Option<Expression>,
    pub table_oid: TableOid,
}

#[derive(Debug, Clone, new)]
pub struct InsertPlanNode {
    pub table_oid: TableOid,
    /// Literal rows for a raw insert; empty when the rows come from a child
    /// executor instead.
    pub raw_values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, new)]
pub struct DeletePlanNode {
    pub table_oid: TableOid,
}

#[derive(Debug, Clone, new)]
pub struct UpdatePlanNode {
    pub table_oid: TableOid,
    /// Column index -> how it changes. Untouched columns copy through.
    pub update_attrs: HashMap<usize, UpdateInfo>,
}

#[derive(Debug, Clone, new)]
pub struct NestedLoopJoinPlanNode {
    pub output_schema: Schema,
    pub output_exprs: Vec<Expression>,
    pub predicate: Option<Expression>,
}

#[derive(Debug, Clone, new)]
pub struct HashJoinPlanNode {
    pub output_schema: Schema,
    pub output_exprs: Vec<Expression>,
    /// Evaluated against left rows during the build phase.
    pub left_key_expr: Expression,
    /// Evaluated against right rows during the probe phase.
    pub right_key_expr: Expression,
}

#[derive(Debug, Clone, new)]
pub struct AggregationPlanNode {
    pub output_schema: Schema,
    /// Evaluated with `evaluate_aggregate` against (group-bys, aggregates).
    pub output_exprs: Vec<Expression>,
    pub group_by_exprs: Vec<Expression>,
    pub aggregate_exprs: Vec<Expression>,
    pub aggregate_types: Vec<AggregationType>,
    pub having: Option<Expression>,
}

#[derive(Debug, Clone, new)]
pub struct DistinctPlanNode {
    pub output_schema: Schema,
}
