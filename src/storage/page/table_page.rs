use crate::common::config::{PageId, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::page::Page;

// Header: next page id (4), free space pointer (4), tuple count (4), then
// the slot array. Each slot is a (tuple offset, tuple size) pair of u32s;
// tuple data grows backwards from the end of the page. The high bit of the
// size word marks a deleted slot; slots are never reused, so rids stay
// stable for the page's lifetime.
const OFFSET_NEXT_PAGE_ID: usize = 0;
const OFFSET_FREE_SPACE_PTR: usize = 4;
const OFFSET_TUPLE_COUNT: usize = 8;
const SLOT_ARRAY_START: usize = 12;
const SLOT_SIZE: usize = 8;

const DELETED_MASK: u32 = 1 << 31;

/// Typed view over one slotted tuple page of a table heap. Multi-field
/// operations take the frame latch once for their whole read or write.
pub struct TablePage {
    page: Page,
}

impl TablePage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Format a freshly allocated page. A zeroed page is not valid: the
    /// free-space pointer starts at the page end and the next-page link at
    /// the invalid sentinel.
    pub fn init(&self) {
        let mut data = self.page.data_mut();
        data[OFFSET_NEXT_PAGE_ID..OFFSET_NEXT_PAGE_ID + 4]
            .copy_from_slice(&INVALID_PAGE_ID.to_ne_bytes());
        data[OFFSET_FREE_SPACE_PTR..OFFSET_FREE_SPACE_PTR + 4]
            .copy_from_slice(&(PAGE_SIZE as u32).to_ne_bytes());
        data[OFFSET_TUPLE_COUNT..OFFSET_TUPLE_COUNT + 4].copy_from_slice(&0u32.to_ne_bytes());
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id().expect("table page lost its id")
    }

    fn read_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_ne_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn write_u32(data: &mut [u8], offset: usize, value: u32) {
        data[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }

    pub fn next_page_id(&self) -> PageId {
        Self::read_u32(&*self.page.data(), OFFSET_NEXT_PAGE_ID)
    }

    pub fn set_next_page_id(&self, next: PageId) {
        Self::write_u32(&mut *self.page.data_mut(), OFFSET_NEXT_PAGE_ID, next);
    }

    pub fn tuple_count(&self) -> u32 {
        Self::read_u32(&*self.page.data(), OFFSET_TUPLE_COUNT)
    }

    /// Append a tuple, returning its slot number, or `None` if the page
    /// lacks room for the data plus a new slot.
    pub fn insert_tuple(&self, tuple_data: &[u8]) -> Option<u32> {
        let mut data = self.page.data_mut();
        let count = Self::read_u32(&*data, OFFSET_TUPLE_COUNT);
        let free_space_ptr = Self::read_u32(&*data, OFFSET_FREE_SPACE_PTR) as usize;
        let slot_array_end = SLOT_ARRAY_START + (count as usize + 1) * SLOT_SIZE;
        if free_space_ptr < slot_array_end + tuple_data.len() {
            return None;
        }

        let tuple_offset = free_space_ptr - tuple_data.len();
        data[tuple_offset..free_space_ptr].copy_from_slice(tuple_data);

        let slot_offset = SLOT_ARRAY_START + count as usize * SLOT_SIZE;
        Self::write_u32(&mut *data, slot_offset, tuple_offset as u32);
        Self::write_u32(&mut *data, slot_offset + 4, tuple_data.len() as u32);
        Self::write_u32(&mut *data, OFFSET_FREE_SPACE_PTR, tuple_offset as u32);
        Self::write_u32(&mut *data, OFFSET_TUPLE_COUNT, count + 1);
        Some(count)
    }

    fn slot(data: &[u8], slot_num: u32) -> (usize, u32) {
        let slot_offset = SLOT_ARRAY_START + slot_num as usize * SLOT_SIZE;
        (
            Self::read_u32(data, slot_offset) as usize,
            Self::read_u32(data, slot_offset + 4),
        )
    }

    /// Read a live tuple's bytes; `None` for deleted or out-of-range slots.
    pub fn get_tuple(&self, slot_num: u32) -> Option<Vec<u8>> {
        let data = self.page.data();
        if slot_num >= Self::read_u32(&*data, OFFSET_TUPLE_COUNT) {
            return None;
        }
        let (offset, size) = Self::slot(&*data, slot_num);
        if size & DELETED_MASK != 0 {
            return None;
        }
        Some(data[offset..offset + size as usize].to_vec())
    }

    /// Set the delete mark on a live slot.
    pub fn mark_delete(&self, slot_num: u32) -> bool {
        let mut data = self.page.data_mut();
        if slot_num >= Self::read_u32(&*data, OFFSET_TUPLE_COUNT) {
            return false;
        }
        let slot_offset = SLOT_ARRAY_START + slot_num as usize * SLOT_SIZE;
        let size = Self::read_u32(&*data, slot_offset + 4);
        if size & DELETED_MASK != 0 {
            return false;
        }
        Self::write_u32(&mut *data, slot_offset + 4, size | DELETED_MASK);
        true
    }

    /// Clear the delete mark (transaction rollback).
    pub fn rollback_delete(&self, slot_num: u32) {
        let mut data = self.page.data_mut();
        let slot_offset = SLOT_ARRAY_START + slot_num as usize * SLOT_SIZE;
        let size = Self::read_u32(&*data, slot_offset + 4);
        Self::write_u32(&mut *data, slot_offset + 4, size & !DELETED_MASK);
    }

    /// Overwrite a live tuple in place. Fixed-size schemas keep every
    /// rewrite the same length, so no slot shuffling is needed.
    pub fn update_tuple(&self, slot_num: u32, tuple_data: &[u8]) -> bool {
        let mut data = self.page.data_mut();
        if slot_num >= Self::read_u32(&*data, OFFSET_TUPLE_COUNT) {
            return false;
        }
        let (offset, size) = Self::slot(&*data, slot_num);
        if size & DELETED_MASK != 0 || size as usize != tuple_data.len() {
            return false;
        }
        data[offset..offset + tuple_data.len()].copy_from_slice(tuple_data);
        true
    }
}
