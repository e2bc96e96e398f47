pub mod executor;
pub mod executor_context;
pub mod executors;
pub mod expressions;
pub mod plans;

pub use executor::{ExecutionError, ExecutionResult, Executor};
pub use executor_context::ExecutorContext;
