use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::concurrency::lock_manager::LockManager;
use crate::concurrency::transaction::Transaction;

/// Everything an executor needs from its surroundings, bundled per query.
/// No global state: the collaborators are passed in explicitly.
pub struct ExecutorContext {
    pub transaction: Arc<Transaction>,
    pub catalog: Arc<Catalog>,
    pub bpm: Arc<dyn BufferPoolManager>,
    pub lock_manager: Arc<LockManager>,
}

impl ExecutorContext {
    pub fn new(
        transaction: Arc<Transaction>,
        catalog: Arc<Catalog>,
        bpm: Arc<dyn BufferPoolManager>,
        lock_manager: Arc<LockManager>,
    ) -> ExecutorContext {
        ExecutorContext {
            transaction,
            catalog,
            bpm,
            lock_manager,
        }
    }
}
