use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::common::config::TxnId;
use crate::common::rid::Rid;
use crate::concurrency::transaction::{IsolationLevel, Transaction, TransactionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
}

/// Per-record queue of lock requests. `sharing_count` and `has_writer` are
/// derived from the granted requests and recomputed after every queue
/// mutation; an aborted transaction that still holds a granted lock keeps
/// feeding them until its own unlock runs.
struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    cv: Arc<Condvar>,
    sharing_count: usize,
    has_writer: bool,
    upgrading: bool,
}

impl Default for LockRequestQueue {
    fn default() -> Self {
        Self {
            requests: VecDeque::new(),
            cv: Arc::new(Condvar::new()),
            sharing_count: 0,
            has_writer: false,
            upgrading: false,
        }
    }
}

struct LockTable {
    lock_table: HashMap<Rid, LockRequestQueue>,
    /// Weak handles for wound-wait notifications; the transactions are
    /// owned elsewhere and revalidated on use.
    txn_table: HashMap<TxnId, Weak<Transaction>>,
    /// Wait-for graph behind the deadlock-detection hooks. Wound-wait
    /// already prevents cycles, so normal operation never populates it.
    wait_for: DiGraphMap<TxnId, ()>,
}

/// Tuple-granularity lock manager: shared/exclusive locks with two-phase
/// locking driven by the transaction's isolation level, and wound-wait
/// deadlock prevention (an older transaction aborts any younger one in its
/// way, so waits only ever point at older transactions and no cycle can
/// form).
///
/// A wounded transaction observes its `Aborted` state on every wake-up: a
/// waiter dequeues itself and fails, while a holder keeps its lock until
/// rollback releases it.
pub struct LockManager {
    latch: Mutex<LockTable>,
}

impl LockManager {
    pub fn new() -> LockManager {
        LockManager {
            latch: Mutex::new(LockTable {
                lock_table: HashMap::new(),
                txn_table: HashMap::new(),
                wait_for: DiGraphMap::new(),
            }),
        }
    }

    /// Recompute the cached counters from the granted requests.
    fn recount(queue: &mut LockRequestQueue) {
        queue.sharing_count = queue
            .requests
            .iter()
            .filter(|r| r.granted && r.mode == LockMode::Shared)
            .count();
        queue.has_writer = queue
            .requests
            .iter()
            .any(|r| r.granted && r.mode == LockMode::Exclusive);
    }

    /// Wound-wait, old wounds young: abort every younger transaction in the
    /// queue that stands in the way. For a shared request only younger
    /// writers conflict; an exclusive request wounds every younger entry.
    /// Wounding flips the victim's state and notifies the queue; it does not
    /// touch the victim's request, which stays (and keeps counting) until
    /// the victim removes it itself.
    fn wound_younger(table: &mut LockTable, rid: Rid, txn_id: TxnId, only_writers: bool) {
        let LockTable {
            lock_table,
            txn_table,
            ..
        } = table;
        let Some(queue) = lock_table.get(&rid) else {
            return;
        };
        let mut wounded = false;
        for request in &queue.requests {
            if request.txn_id > txn_id && (!only_writers || request.mode == LockMode::Exclusive) {
                if let Some(victim) = txn_table.get(&request.txn_id).and_then(Weak::upgrade) {
                    if victim.state() != TransactionState::Aborted {
                        debug!("txn {} wounds younger txn {}", txn_id, request.txn_id);
                        victim.set_state(TransactionState::Aborted);
                        wounded = true;
                    }
                }
            }
        }
        if wounded {
            queue.cv.notify_all();
        }
    }

    /// Remove `txn_id`'s request from the queue, if any, and wake the queue
    /// up behind it.
    fn remove_request(queue: &mut LockRequestQueue, txn_id: TxnId) -> Option<LockMode> {
        let pos = queue.requests.iter().position(|r| r.txn_id == txn_id)?;
        let request = queue.requests.remove(pos).unwrap();
        Self::recount(queue);
        queue.cv.notify_all();
        Some(request.mode)
    }

    /// Park on the queue's condition variable until `can_grant` holds, or
    /// until this transaction is wounded. Returns false (with the request
    /// dequeued) in the wounded case.
    fn wait_for_grant(
        &self,
        mut table: MutexGuard<'_, LockTable>,
        txn: &Transaction,
        rid: Rid,
        can_grant: fn(&LockRequestQueue) -> bool,
    ) -> bool {
        let cv = table.lock_table[&rid].cv.clone();
        loop {
            let queue = table
                .lock_table
                .get_mut(&rid)
                .expect("lock queue vanished under a waiter");
            if txn.state() == TransactionState::Aborted {
                Self::remove_request(queue, txn.id());
                return false;
            }
            if can_grant(queue) {
                let request = queue
                    .requests
                    .iter_mut()
                    .find(|r| r.txn_id == txn.id())
                    .expect("waiter's request vanished from its queue");
                request.granted = true;
                Self::recount(queue);
                return true;
            }
            cv.wait(&mut table);
        }
    }

    /// Take a shared lock on `rid`. Rejected outright under ReadUncommitted
    /// and after a RepeatableRead transaction has started releasing; both
    /// rejections abort the transaction.
    pub fn lock_shared(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        if txn.isolation_level() == IsolationLevel::ReadUncommitted {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        if txn.isolation_level() == IsolationLevel::RepeatableRead
            && txn.state() != TransactionState::Growing
        {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        if txn.state() == TransactionState::Aborted {
            return false;
        }
        if txn.is_shared_locked(&rid) || txn.is_exclusive_locked(&rid) {
            return true;
        }

        let mut table = self.latch.lock();
        table.txn_table.insert(txn.id(), Arc::downgrade(txn));
        table.lock_table.entry(rid).or_default();
        Self::wound_younger(&mut table, rid, txn.id(), true);
        table.lock_table.get_mut(&rid).unwrap().requests.push_back(LockRequest {
            txn_id: txn.id(),
            mode: LockMode::Shared,
            granted: false,
        });

        if !self.wait_for_grant(table, txn, rid, |queue| !queue.has_writer) {
            return false;
        }
        txn.shared_lock_set().insert(rid);
        true
    }

    /// Take an exclusive lock on `rid`.
    pub fn lock_exclusive(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        if txn.isolation_level() == IsolationLevel::RepeatableRead
            && txn.state() != TransactionState::Growing
        {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        if txn.state() == TransactionState::Aborted {
            return false;
        }
        if txn.is_exclusive_locked(&rid) {
            return true;
        }

        let mut table = self.latch.lock();
        table.txn_table.insert(txn.id(), Arc::downgrade(txn));
        table.lock_table.entry(rid).or_default();
        Self::wound_younger(&mut table, rid, txn.id(), false);
        table.lock_table.get_mut(&rid).unwrap().requests.push_back(LockRequest {
            txn_id: txn.id(),
            mode: LockMode::Exclusive,
            granted: false,
        });

        if !self.wait_for_grant(table, txn, rid, |queue| {
            !queue.has_writer && queue.sharing_count == 0
        }) {
            return false;
        }
        txn.exclusive_lock_set().insert(rid);
        true
    }

    /// Upgrade a held shared lock to exclusive. Only one upgrade may be in
    /// flight per record: a second upgrader is aborted and fails.
    pub fn lock_upgrade(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        if txn.isolation_level() == IsolationLevel::RepeatableRead
            && txn.state() != TransactionState::Growing
        {
            txn.set_state(TransactionState::Aborted);
            return false;
        }
        if txn.state() == TransactionState::Aborted {
            return false;
        }
        if txn.is_exclusive_locked(&rid) {
            return true;
        }

        let mut table = self.latch.lock();
        table.txn_table.insert(txn.id(), Arc::downgrade(txn));
        {
            let Some(queue) = table.lock_table.get_mut(&rid) else {
                txn.set_state(TransactionState::Aborted);
                return false;
            };
            if queue.upgrading {
                txn.set_state(TransactionState::Aborted);
                return false;
            }
            // Upgrading presumes a granted shared lock to step out of.
            let Some(request) = queue
                .requests
                .iter_mut()
                .find(|r| r.txn_id == txn.id() && r.granted && r.mode == LockMode::Shared)
            else {
                txn.set_state(TransactionState::Aborted);
                return false;
            };
            // Step out of the sharers and back into the waiters, in place.
            request.granted = false;
            request.mode = LockMode::Exclusive;
            queue.upgrading = true;
            Self::recount(queue);
        }
        txn.shared_lock_set().remove(&rid);
        Self::wound_younger(&mut table, rid, txn.id(), false);

        // A dedicated wait loop: `upgrading` has to be cleared under the
        // same latch hold that settles the outcome.
        let cv = table.lock_table[&rid].cv.clone();
        loop {
            let queue = table
                .lock_table
                .get_mut(&rid)
                .expect("lock queue vanished under an upgrader");
            if txn.state() == TransactionState::Aborted {
                Self::remove_request(queue, txn.id());
                queue.upgrading = false;
                return false;
            }
            if !queue.has_writer && queue.sharing_count == 0 {
                let request = queue
                    .requests
                    .iter_mut()
                    .find(|r| r.txn_id == txn.id())
                    .expect("upgrader's request vanished from its queue");
                request.granted = true;
                queue.upgrading = false;
                Self::recount(queue);
                break;
            }
            cv.wait(&mut table);
        }
        drop(table);
        txn.exclusive_lock_set().insert(rid);
        true
    }

    /// Release `txn`'s lock on `rid`. Under RepeatableRead the first release
    /// moves the transaction from Growing to Shrinking.
    pub fn unlock(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        let mut table = self.latch.lock();
        let Some(queue) = table.lock_table.get_mut(&rid) else {
            return false;
        };
        if Self::remove_request(queue, txn.id()).is_none() {
            return false;
        }
        drop(table);

        txn.shared_lock_set().remove(&rid);
        txn.exclusive_lock_set().remove(&rid);
        if txn.isolation_level() == IsolationLevel::RepeatableRead
            && txn.state() == TransactionState::Growing
        {
            txn.set_state(TransactionState::Shrinking);
        }
        true
    }

    // Wait-for graph hooks. Wound-wait makes deadlock impossible, so the
    // engine never feeds this graph itself; the hooks exist for an external
    // detector and are fully functional.

    pub fn add_edge(&self, waiter: TxnId, holder: TxnId) {
        self.latch.lock().wait_for.add_edge(waiter, holder, ());
    }

    pub fn remove_edge(&self, waiter: TxnId, holder: TxnId) {
        self.latch.lock().wait_for.remove_edge(waiter, holder);
    }

    /// @return the youngest transaction on some cycle, if any cycle exists
    pub fn has_cycle(&self) -> Option<TxnId> {
        let table = self.latch.lock();
        let mut youngest = None;
        for component in tarjan_scc(&table.wait_for) {
            let cyclic = component.len() > 1
                || (component.len() == 1
                    && table.wait_for.contains_edge(component[0], component[0]));
            if cyclic {
                let youngest_in_cycle = *component.iter().max().unwrap();
                youngest = youngest.max(Some(youngest_in_cycle));
            }
        }
        youngest
    }

    pub fn edge_list(&self) -> Vec<(TxnId, TxnId)> {
        let table = self.latch.lock();
        table.wait_for.all_edges().map(|(a, b, _)| (a, b)).collect()
    }

    /// One detection pass: abort the youngest transaction of every cycle and
    /// drop its edges.
    pub fn run_cycle_detection(&self) {
        while let Some(victim_id) = self.has_cycle() {
            let mut table = self.latch.lock();
            if let Some(victim) = table.txn_table.get(&victim_id).and_then(Weak::upgrade) {
                debug!("cycle detection aborts txn {}", victim_id);
                victim.set_state(TransactionState::Aborted);
            }
            let edges: Vec<(TxnId, TxnId)> = table
                .wait_for
                .all_edges()
                .filter(|(a, b, _)| *a == victim_id || *b == victim_id)
                .map(|(a, b, _)| (a, b))
                .collect();
            for (a, b) in edges {
                table.wait_for.remove_edge(a, b);
            }
            for queue in table.lock_table.values() {
                queue.cv.notify_all();
            }
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    fn txn(id: TxnId, level: IsolationLevel) -> Arc<Transaction> {
        Arc::new(Transaction::new(id, level))
    }

    #[test]
    fn test_shared_locks_coexist() {
        let lm = LockManager::new();
        let t1 = txn(1, IsolationLevel::RepeatableRead);
        let t2 = txn(2, IsolationLevel::RepeatableRead);
        let rid = Rid::new(0, 0);

        assert!(lm.lock_shared(&t1, rid));
        assert!(lm.lock_shared(&t2, rid));
        assert!(t1.is_shared_locked(&rid));
        assert!(t2.is_shared_locked(&rid));

        assert!(lm.unlock(&t1, rid));
        assert!(lm.unlock(&t2, rid));
        assert_eq!(TransactionState::Shrinking, t1.state());
    }

    #[test]
    fn test_read_uncommitted_rejects_shared() {
        let lm = LockManager::new();
        let t1 = txn(1, IsolationLevel::ReadUncommitted);
        let rid = Rid::new(0, 0);

        assert!(!lm.lock_shared(&t1, rid));
        assert_eq!(TransactionState::Aborted, t1.state());
    }

    #[test]
    fn test_two_phase_law_under_repeatable_read() {
        let lm = LockManager::new();
        let t1 = txn(1, IsolationLevel::RepeatableRead);
        let r1 = Rid::new(0, 0);
        let r2 = Rid::new(0, 1);

        assert!(lm.lock_shared(&t1, r1));
        assert!(lm.unlock(&t1, r1));
        assert_eq!(TransactionState::Shrinking, t1.state());

        // No acquisition may succeed after any release.
        assert!(!lm.lock_shared(&t1, r2));
        assert_eq!(TransactionState::Aborted, t1.state());
    }

    #[test]
    fn test_read_committed_relocks_freely() {
        let lm = LockManager::new();
        let t1 = txn(1, IsolationLevel::ReadCommitted);
        let rid = Rid::new(0, 0);

        assert!(lm.lock_shared(&t1, rid));
        assert!(lm.unlock(&t1, rid));
        // Still Growing: ReadCommitted re-acquires after releasing.
        assert_eq!(TransactionState::Growing, t1.state());
        assert!(lm.lock_shared(&t1, rid));
        assert!(lm.unlock(&t1, rid));
    }

    #[test]
    fn test_writer_blocks_until_readers_leave() {
        let lm = Arc::new(LockManager::new());
        let reader = txn(1, IsolationLevel::RepeatableRead);
        let writer = txn(2, IsolationLevel::RepeatableRead);
        let rid = Rid::new(0, 0);
        let writer_granted = AtomicBool::new(false);

        assert!(lm.lock_shared(&reader, rid));

        crossbeam::thread::scope(|s| {
            s.spawn(|_| {
                // Younger writer waits for the older reader (no wound).
                assert!(lm.lock_exclusive(&writer, rid));
                writer_granted.store(true, Ordering::SeqCst);
            });

            std::thread::sleep(Duration::from_millis(50));
            assert!(!writer_granted.load(Ordering::SeqCst));
            assert!(lm.unlock(&reader, rid));
        })
        .unwrap();

        assert!(writer_granted.load(Ordering::SeqCst));
        assert!(writer.is_exclusive_locked(&rid));
    }

    #[test]
    fn test_wound_wait_scenario() {
        // T_old (5) holds X. T_young (10) queues for S and blocks.
        // T_oldest (2) then requests X: both younger transactions are
        // wounded, the young waiter backs out, and the oldest only acquires
        // once the wounded holder actually releases.
        let lm = Arc::new(LockManager::new());
        let t_old = txn(5, IsolationLevel::RepeatableRead);
        let t_young = txn(10, IsolationLevel::RepeatableRead);
        let t_oldest = txn(2, IsolationLevel::RepeatableRead);
        let rid = Rid::new(0, 0);
        let oldest_granted = AtomicBool::new(false);

        assert!(lm.lock_exclusive(&t_old, rid));

        crossbeam::thread::scope(|s| {
            s.spawn(|_| {
                // Blocks behind the writer, then gets wounded and fails.
                assert!(!lm.lock_shared(&t_young, rid));
                assert_eq!(TransactionState::Aborted, t_young.state());
            });
            std::thread::sleep(Duration::from_millis(50));

            s.spawn(|_| {
                assert!(lm.lock_exclusive(&t_oldest, rid));
                oldest_granted.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_millis(50));

            // The wounded holder still owns the lock; the oldest must wait.
            assert_eq!(TransactionState::Aborted, t_old.state());
            assert!(!oldest_granted.load(Ordering::SeqCst));

            // Rollback of the wounded holder releases the record.
            assert!(lm.unlock(&t_old, rid));
        })
        .unwrap();

        assert!(oldest_granted.load(Ordering::SeqCst));
        assert!(t_oldest.is_exclusive_locked(&rid));
    }

    #[test]
    fn test_upgrade() {
        let lm = Arc::new(LockManager::new());
        let t1 = txn(1, IsolationLevel::RepeatableRead);
        let t2 = txn(2, IsolationLevel::RepeatableRead);
        let rid = Rid::new(0, 0);
        let reader_granted = AtomicBool::new(false);

        // Sole sharer upgrades in place.
        assert!(lm.lock_shared(&t1, rid));
        assert!(lm.lock_upgrade(&t1, rid));
        assert!(t1.is_exclusive_locked(&rid));
        assert!(!t1.is_shared_locked(&rid));

        crossbeam::thread::scope(|s| {
            s.spawn(|_| {
                // A reader arriving after the upgrade blocks on the writer.
                assert!(lm.lock_shared(&t2, rid));
                reader_granted.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_millis(50));
            assert!(!reader_granted.load(Ordering::SeqCst));
            assert!(lm.unlock(&t1, rid));
        })
        .unwrap();

        assert!(reader_granted.load(Ordering::SeqCst));
    }

    #[test]
    fn test_concurrent_upgrade_aborts_second() {
        let lm = LockManager::new();
        let t1 = txn(1, IsolationLevel::RepeatableRead);
        let t2 = txn(2, IsolationLevel::RepeatableRead);
        let rid = Rid::new(0, 0);

        assert!(lm.lock_shared(&t1, rid));
        assert!(lm.lock_shared(&t2, rid));

        // Mark an upgrade in flight by hand, as if t1 were parked in one.
        lm.latch.lock().lock_table.get_mut(&rid).unwrap().upgrading = true;

        assert!(!lm.lock_upgrade(&t2, rid));
        assert_eq!(TransactionState::Aborted, t2.state());
    }

    #[test]
    fn test_unlock_without_lock_fails() {
        let lm = LockManager::new();
        let t1 = txn(1, IsolationLevel::RepeatableRead);
        assert!(!lm.unlock(&t1, Rid::new(0, 0)));
    }

    #[test]
    fn test_wait_for_graph_hooks() {
        let lm = LockManager::new();
        lm.add_edge(1, 2);
        lm.add_edge(2, 3);
        assert_eq!(None, lm.has_cycle());

        lm.add_edge(3, 1);
        // Youngest member of the 1 -> 2 -> 3 -> 1 cycle.
        assert_eq!(Some(3), lm.has_cycle());

        lm.remove_edge(3, 1);
        assert_eq!(None, lm.has_cycle());

        let mut edges = lm.edge_list();
        edges.sort_unstable();
        assert_eq!(vec![(1, 2), (2, 3)], edges);
    }

    #[test]
    fn test_cycle_detection_pass_aborts_victim() {
        let lm = LockManager::new();
        let t3 = txn(3, IsolationLevel::RepeatableRead);
        lm.latch.lock().txn_table.insert(3, Arc::downgrade(&t3));

        lm.add_edge(1, 3);
        lm.add_edge(3, 1);
        lm.run_cycle_detection();

        assert_eq!(TransactionState::Aborted, t3.state());
        assert_eq!(None, lm.has_cycle());
    }
}
