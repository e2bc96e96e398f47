use std::collections::HashSet;

use parking_lot::{Mutex, MutexGuard};

use crate::common::config::{IndexOid, TableOid, TxnId};
use crate::common::rid::Rid;
use crate::storage::table::tuple::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    Insert,
    Delete,
    Update,
}

/// One table-heap modification, kept so an abort can undo it.
#[derive(Debug, Clone)]
pub struct TableWriteRecord {
    pub rid: Rid,
    pub wtype: WriteType,
    pub table_oid: TableOid,
    /// The tuple the update overwrote; `None` for inserts and deletes.
    pub old_tuple: Option<Tuple>,
}

/// One index modification, kept so an abort can undo it.
#[derive(Debug, Clone)]
pub struct IndexWriteRecord {
    pub rid: Rid,
    pub wtype: WriteType,
    pub index_oid: IndexOid,
    /// The key tuple the operation applied to.
    pub key_tuple: Tuple,
    /// For updates: the key the new one replaced.
    pub old_key_tuple: Option<Tuple>,
}

/// A transaction as the lock manager and executors see it: an id (which
/// doubles as its age for wound-wait — smaller is older), an isolation
/// level fixed at begin, a state, the sets of record ids it holds locks on,
/// and append-only undo logs consumed by the transaction manager on abort.
///
/// State is written by other threads (wound-wait), so everything mutable
/// sits behind mutexes and handles are shared as `Arc<Transaction>`.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    shared_lock_set: Mutex<HashSet<Rid>>,
    exclusive_lock_set: Mutex<HashSet<Rid>>,
    table_write_set: Mutex<Vec<TableWriteRecord>>,
    index_write_set: Mutex<Vec<IndexWriteRecord>>,
}

impl Transaction {
    pub fn new(id: TxnId, isolation_level: IsolationLevel) -> Transaction {
        Transaction {
            id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            table_write_set: Mutex::new(Vec::new()),
            index_write_set: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    pub fn shared_lock_set(&self) -> MutexGuard<'_, HashSet<Rid>> {
        self.shared_lock_set.lock()
    }

    pub fn exclusive_lock_set(&self) -> MutexGuard<'_, HashSet<Rid>> {
        self.exclusive_lock_set.lock()
    }

    pub fn is_shared_locked(&self, rid: &Rid) -> bool {
        self.shared_lock_set.lock().contains(rid)
    }

    pub fn is_exclusive_locked(&self, rid: &Rid) -> bool {
        self.exclusive_lock_set.lock().contains(rid)
    }

    pub fn append_table_write(&self, record: TableWriteRecord) {
        self.table_write_set.lock().push(record);
    }

    pub fn append_index_write(&self, record: IndexWriteRecord) {
        self.index_write_set.lock().push(record);
    }

    pub fn take_table_writes(&self) -> Vec<TableWriteRecord> {
        std::mem::take(&mut *self.table_write_set.lock())
    }

    pub fn take_index_writes(&self) -> Vec<IndexWriteRecord> {
        std::mem::take(&mut *self.index_write_set.lock())
    }
}
