use std::fmt;

use crate::common::config::{PageId, INVALID_PAGE_ID};

/// Record identifier: the address of a tuple in the table heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_num: u32) -> Rid {
        Rid { page_id, slot_num }
    }

    pub fn invalid() -> Rid {
        Rid {
            page_id: INVALID_PAGE_ID,
            slot_num: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id != INVALID_PAGE_ID
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_num)
    }
}
