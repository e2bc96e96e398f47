use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::config::{PageId, TableOid, INVALID_PAGE_ID};
use crate::common::rid::Rid;
use crate::concurrency::transaction::{TableWriteRecord, Transaction, WriteType};
use crate::storage::page::table_page::TablePage;
use crate::storage::table::table_iterator::TableIterator;
use crate::storage::table::tuple::Tuple;

/// A table heap: a singly linked chain of slotted tuple pages living in the
/// buffer pool. Tuple-level locking belongs to the executors; the heap's
/// own job is page-format bookkeeping, the pin discipline, and recording
/// undo information into the transaction.
pub struct TableHeap {
    bpm: Arc<dyn BufferPoolManager>,
    oid: TableOid,
    first_page_id: PageId,
    /// Serializes the walk-and-link path of inserts; readers go latch-free
    /// apart from page latches.
    insert_latch: Mutex<()>,
}

impl TableHeap {
    /// Create a heap with one empty page.
    pub fn new(bpm: Arc<dyn BufferPoolManager>, oid: TableOid) -> TableHeap {
        let page = bpm.new_page().expect("buffer pool exhausted creating table heap");
        let first_page_id = page.page_id().expect("fresh page has an id");
        TablePage::new(page).init();
        bpm.unpin_page(first_page_id, true);
        TableHeap {
            bpm,
            oid,
            first_page_id,
            insert_latch: Mutex::new(()),
        }
    }

    pub fn oid(&self) -> TableOid {
        self.oid
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Insert a tuple, returning the rid the heap assigned it, and log the
    /// insert in the transaction for rollback. Fails only if the tuple can
    /// never fit a page or the buffer pool is exhausted.
    pub fn insert_tuple(&self, tuple: &Tuple, txn: &Transaction) -> Option<Rid> {
        let _guard = self.insert_latch.lock();
        let mut page_id = self.first_page_id;
        loop {
            let page = TablePage::new(self.bpm.fetch_page(page_id)?);
            if let Some(slot) = page.insert_tuple(tuple.data()) {
                self.bpm.unpin_page(page_id, true);
                let rid = Rid::new(page_id, slot);
                txn.append_table_write(TableWriteRecord {
                    rid,
                    wtype: WriteType::Insert,
                    table_oid: self.oid,
                    old_tuple: None,
                });
                return Some(rid);
            }

            let next_page_id = page.next_page_id();
            if next_page_id != INVALID_PAGE_ID {
                self.bpm.unpin_page(page_id, false);
                page_id = next_page_id;
                continue;
            }

            // End of the chain: grow the heap by one page and link it in.
            let Some(new_page) = self.bpm.new_page() else {
                self.bpm.unpin_page(page_id, false);
                return None;
            };
            let new_page_id = new_page.page_id().expect("fresh page has an id");
            debug!("table heap {} grew page {}", self.oid, new_page_id);
            TablePage::new(new_page).init();
            page.set_next_page_id(new_page_id);
            self.bpm.unpin_page(page_id, true);
            page_id = new_page_id;
        }
    }

    /// Read a live tuple.
    pub fn get_tuple(&self, rid: Rid) -> Option<Tuple> {
        let page = TablePage::new(self.bpm.fetch_page(rid.page_id)?);
        let data = page.get_tuple(rid.slot_num);
        self.bpm.unpin_page(rid.page_id, false);
        let mut tuple = Tuple::from_bytes(data?);
        tuple.set_rid(rid);
        Some(tuple)
    }

    /// Set the delete mark on a tuple and log the delete for rollback. The
    /// mark becomes permanent only if the transaction commits.
    pub fn mark_delete(&self, rid: Rid, txn: &Transaction) -> bool {
        let Some(page) = self.bpm.fetch_page(rid.page_id) else {
            return false;
        };
        let page = TablePage::new(page);
        let marked = page.mark_delete(rid.slot_num);
        self.bpm.unpin_page(rid.page_id, marked);
        if marked {
            txn.append_table_write(TableWriteRecord {
                rid,
                wtype: WriteType::Delete,
                table_oid: self.oid,
                old_tuple: None,
            });
        }
        marked
    }

    /// Overwrite a tuple in place and log the old image for rollback.
    pub fn update_tuple(&self, tuple: &Tuple, rid: Rid, txn: &Transaction) -> bool {
        let Some(old_tuple) = self.get_tuple(rid) else {
            return false;
        };
        let Some(page) = self.bpm.fetch_page(rid.page_id) else {
            return false;
        };
        let page = TablePage::new(page);
        let updated = page.update_tuple(rid.slot_num, tuple.data());
        self.bpm.unpin_page(rid.page_id, updated);
        if updated {
            txn.append_table_write(TableWriteRecord {
                rid,
                wtype: WriteType::Update,
                table_oid: self.oid,
                old_tuple: Some(old_tuple),
            });
        }
        updated
    }

    /// Rollback path: clear a delete mark without logging.
    pub fn rollback_delete(&self, rid: Rid) {
        if let Some(page) = self.bpm.fetch_page(rid.page_id) {
            TablePage::new(page).rollback_delete(rid.slot_num);
            self.bpm.unpin_page(rid.page_id, true);
        }
    }

    /// Rollback path: mark an inserted tuple deleted without logging.
    pub fn apply_delete(&self, rid: Rid) {
        if let Some(page) = self.bpm.fetch_page(rid.page_id) {
            TablePage::new(page).mark_delete(rid.slot_num);
            self.bpm.unpin_page(rid.page_id, true);
        }
    }

    /// Rollback path: restore an updated tuple's old image without logging.
    pub fn restore_tuple(&self, rid: Rid, old_tuple: &Tuple) {
        if let Some(page) = self.bpm.fetch_page(rid.page_id) {
            TablePage::new(page).update_tuple(rid.slot_num, old_tuple.data());
            self.bpm.unpin_page(rid.page_id, true);
        }
    }

    pub fn iter(&self) -> TableIterator {
        TableIterator::new(self.bpm.clone(), self.first_page_id)
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::buffer::BufferPoolManagerInstance;
    use crate::catalog::column::{Column, DataType};
    use crate::catalog::schema::Schema;
    use crate::concurrency::transaction::IsolationLevel;
    use crate::dbtype::value::Value;
    use crate::storage::disk::DiskManager;

    fn setup(dir: &TempDir) -> (Arc<TableHeap>, Schema, Transaction) {
        let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        let bpm: Arc<dyn BufferPoolManager> =
            Arc::new(BufferPoolManagerInstance::new(20, disk_manager));
        let heap = Arc::new(TableHeap::new(bpm, 0));
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("v", DataType::Integer),
        ]);
        let txn = Transaction::new(0, IsolationLevel::RepeatableRead);
        (heap, schema, txn)
    }

    fn row(schema: &Schema, id: i32, v: i32) -> Tuple {
        Tuple::from_values(&[Value::Integer(id), Value::Integer(v)], schema)
    }

    #[test]
    fn test_insert_and_get() {
        let dir = TempDir::new("table_heap_test").unwrap();
        let (heap, schema, txn) = setup(&dir);

        let rid = heap.insert_tuple(&row(&schema, 1, 10), &txn).unwrap();
        let tuple = heap.get_tuple(rid).unwrap();
        assert_eq!(vec![Value::Integer(1), Value::Integer(10)], tuple.values(&schema));
        assert_eq!(rid, tuple.rid());
    }

    #[test]
    fn test_delete_and_update() {
        let dir = TempDir::new("table_heap_test").unwrap();
        let (heap, schema, txn) = setup(&dir);

        let rid = heap.insert_tuple(&row(&schema, 1, 10), &txn).unwrap();
        assert!(heap.update_tuple(&row(&schema, 1, 11), rid, &txn));
        assert_eq!(
            Value::Integer(11),
            heap.get_tuple(rid).unwrap().value(&schema, 1)
        );

        assert!(heap.mark_delete(rid, &txn));
        assert!(heap.get_tuple(rid).is_none());
        heap.rollback_delete(rid);
        assert!(heap.get_tuple(rid).is_some());
    }

    #[test]
    fn test_heap_spills_to_new_pages() {
        let dir = TempDir::new("table_heap_test").unwrap();
        let (heap, schema, txn) = setup(&dir);

        // Each row is 8 bytes + 8 slot bytes; a few thousand rows need
        // several pages.
        let n = 2000;
        let mut rids = Vec::new();
        for i in 0..n {
            rids.push(heap.insert_tuple(&row(&schema, i, i * 2), &txn).unwrap());
        }
        assert!(rids.iter().any(|r| r.page_id != heap.first_page_id()));

        let collected: Vec<(Rid, Tuple)> = heap.iter().collect();
        assert_eq!(n as usize, collected.len());
        for (i, (rid, tuple)) in collected.iter().enumerate() {
            assert_eq!(rids[i], *rid);
            assert_eq!(Value::Integer(i as i32), tuple.value(&schema, 0));
        }
    }
}
