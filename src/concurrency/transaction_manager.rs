use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;

use crate::catalog::Catalog;
use crate::concurrency::lock_manager::LockManager;
use crate::concurrency::transaction::{
    IsolationLevel, Transaction, TransactionState, WriteType,
};

/// Owns transaction lifecycles: hands out ids, and turns a commit or abort
/// into lock releases (and, for aborts, an undo pass over the transaction's
/// write sets). The engine core only ever sees `Arc<Transaction>` handles.
pub struct TransactionManager {
    next_txn_id: AtomicU32,
    lock_manager: Arc<LockManager>,
    catalog: Arc<Catalog>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>, catalog: Arc<Catalog>) -> TransactionManager {
        TransactionManager {
            next_txn_id: AtomicU32::new(0),
            lock_manager,
            catalog,
        }
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(Transaction::new(id, isolation_level))
    }

    pub fn commit(&self, txn: &Arc<Transaction>) {
        txn.set_state(TransactionState::Committed);
        // The write sets become irrelevant once the outcome is decided.
        txn.take_table_writes();
        txn.take_index_writes();
        self.release_locks(txn);
    }

    /// Undo every table and index write in reverse order, then release all
    /// locks.
    pub fn abort(&self, txn: &Arc<Transaction>) {
        txn.set_state(TransactionState::Aborted);
        debug!("rolling back txn {}", txn.id());

        let mut table_writes = txn.take_table_writes();
        while let Some(record) = table_writes.pop() {
            let table = self
                .catalog
                .table_by_oid(record.table_oid)
                .expect("write record for an unknown table");
            match record.wtype {
                WriteType::Insert => table.table.apply_delete(record.rid),
                WriteType::Delete => table.table.rollback_delete(record.rid),
                WriteType::Update => table
                    .table
                    .restore_tuple(record.rid, record.old_tuple.as_ref().unwrap()),
            }
        }

        let mut index_writes = txn.take_index_writes();
        while let Some(record) = index_writes.pop() {
            let index = self
                .catalog
                .index_by_oid(record.index_oid)
                .expect("write record for an unknown index");
            match record.wtype {
                WriteType::Insert => {
                    index.index.delete_entry(&record.key_tuple, record.rid);
                }
                WriteType::Delete => {
                    index.index.insert_entry(&record.key_tuple, record.rid);
                }
                WriteType::Update => {
                    index.index.delete_entry(&record.key_tuple, record.rid);
                    index
                        .index
                        .insert_entry(record.old_key_tuple.as_ref().unwrap(), record.rid);
                }
            }
        }

        self.release_locks(txn);
    }

    fn release_locks(&self, txn: &Arc<Transaction>) {
        let rids: Vec<_> = txn
            .shared_lock_set()
            .iter()
            .chain(txn.exclusive_lock_set().iter())
            .copied()
            .collect();
        for rid in rids {
            self.lock_manager.unlock(txn, rid);
        }
    }
}
