use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::config::{PageId, INVALID_PAGE_ID};
use crate::common::rid::Rid;
use crate::storage::page::table_page::TablePage;
use crate::storage::table::tuple::Tuple;

/// Forward scan over every live tuple of a table heap. Pages are fetched
/// and unpinned per step, so an iterator never holds a pin between calls.
pub struct TableIterator {
    bpm: Arc<dyn BufferPoolManager>,
    page_id: PageId,
    slot_num: u32,
}

impl TableIterator {
    pub(crate) fn new(bpm: Arc<dyn BufferPoolManager>, first_page_id: PageId) -> TableIterator {
        TableIterator {
            bpm,
            page_id: first_page_id,
            slot_num: 0,
        }
    }
}

impl Iterator for TableIterator {
    type Item = (Rid, Tuple);

    fn next(&mut self) -> Option<(Rid, Tuple)> {
        while self.page_id != INVALID_PAGE_ID {
            let page = TablePage::new(self.bpm.fetch_page(self.page_id)?);
            let tuple_count = page.tuple_count();
            // Skip over deleted slots inside the current page.
            while self.slot_num < tuple_count {
                let slot_num = self.slot_num;
                self.slot_num += 1;
                if let Some(data) = page.get_tuple(slot_num) {
                    self.bpm.unpin_page(self.page_id, false);
                    let rid = Rid::new(self.page_id, slot_num);
                    let mut tuple = Tuple::from_bytes(data);
                    tuple.set_rid(rid);
                    return Some((rid, tuple));
                }
            }
            let next_page_id = page.next_page_id();
            self.bpm.unpin_page(self.page_id, false);
            self.page_id = next_page_id;
            self.slot_num = 0;
        }
        None
    }
}
