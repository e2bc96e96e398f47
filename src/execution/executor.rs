use std::fmt;

use crate::catalog::schema::Schema;
use crate::common::rid::Rid;
use crate::storage::table::tuple::Tuple;

/// Failures that abort a running query. Recoverable storage conditions stay
/// booleans down in the storage layer; what reaches the operator tree is
/// either a transaction killed by the lock manager or a broken internal
/// invariant.
#[derive(Debug)]
pub enum ExecutionError {
    /// The transaction was aborted (wound-wait, or an isolation-level
    /// violation) while this operator held it.
    TransactionAborted,
    /// An operation the engine relies on failed mid-flight, e.g. a
    /// mark-delete on a tuple the child just produced.
    Internal(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::TransactionAborted => write!(f, "transaction aborted"),
            ExecutionError::Internal(msg) => write!(f, "execution failed: {}", msg),
        }
    }
}

impl std::error::Error for ExecutionError {}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// The pull-based operator contract: `init` prepares state (and runs any
/// build phase), then each `next` yields one output row until `Ok(None)`
/// signals exhaustion — and keeps signalling it on every later call.
/// Operators compose by owning their children.
pub trait Executor {
    fn init(&mut self) -> ExecutionResult<()>;

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>>;

    fn output_schema(&self) -> &Schema;
}
