pub mod aggregation_executor;
pub mod delete_executor;
pub mod distinct_executor;
pub mod hash_join_executor;
pub mod insert_executor;
pub mod nested_loop_join_executor;
pub mod seq_scan_executor;
pub mod update_executor;

pub use aggregation_executor::AggregationExecutor;
pub use delete_executor::DeleteExecutor;
pub use distinct_executor::DistinctExecutor;
pub use hash_join_executor::HashJoinExecutor;
pub use insert_executor::InsertExecutor;
pub use nested_loop_join_executor::NestedLoopJoinExecutor;
pub use seq_scan_executor::SeqScanExecutor;
pub use update_executor::UpdateExecutor;
