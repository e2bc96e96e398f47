use std::collections::HashMap;

use crate::common::config::{PageId, DIRECTORY_ARRAY_SIZE, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::page::Page;

// On-page layout: a 32-bit global depth, then DIRECTORY_ARRAY_SIZE bucket
// page ids (4 bytes each), then DIRECTORY_ARRAY_SIZE local depths (1 byte
// each). Host-native endianness, paired with a matching reader.
const OFFSET_GLOBAL_DEPTH: usize = 0;
const OFFSET_BUCKET_PAGE_IDS: usize = 4;
const OFFSET_LOCAL_DEPTHS: usize = OFFSET_BUCKET_PAGE_IDS + 4 * DIRECTORY_ARRAY_SIZE;

/// The maximum global depth the on-page arrays can address.
pub const MAX_GLOBAL_DEPTH: u32 = DIRECTORY_ARRAY_SIZE.trailing_zeros();

const _: () = assert!(OFFSET_LOCAL_DEPTHS + DIRECTORY_ARRAY_SIZE <= PAGE_SIZE);

/// Typed view over the extendible hash table's directory page: the global
/// depth and, for each of the `2^global_depth` live slots, a bucket page id
/// and a local depth.
///
/// Accessors take the underlying frame latch per call; the hash table's
/// table-wide latch is what keeps multi-field updates consistent.
pub struct HashTableDirectoryPage {
    page: Page,
}

impl HashTableDirectoryPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id().expect("directory page lost its id")
    }

    pub fn global_depth(&self) -> u32 {
        let data = self.page.data();
        u32::from_ne_bytes(
            data[OFFSET_GLOBAL_DEPTH..OFFSET_GLOBAL_DEPTH + 4]
                .try_into()
                .unwrap(),
        )
    }

    /// @return a mask of global_depth 1's and the rest 0's
    pub fn global_depth_mask(&self) -> u32 {
        (1 << self.global_depth()) - 1
    }

    /// @return the number of directory slots currently addressed, 2^D
    pub fn size(&self) -> usize {
        1 << self.global_depth()
    }

    pub fn bucket_page_id(&self, idx: usize) -> PageId {
        debug_assert!(idx < DIRECTORY_ARRAY_SIZE);
        let offset = OFFSET_BUCKET_PAGE_IDS + 4 * idx;
        let data = self.page.data();
        PageId::from_ne_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    pub fn set_bucket_page_id(&self, idx: usize, bucket_page_id: PageId) {
        debug_assert!(idx < DIRECTORY_ARRAY_SIZE);
        let offset = OFFSET_BUCKET_PAGE_IDS + 4 * idx;
        let mut data = self.page.data_mut();
        data[offset..offset + 4].copy_from_slice(&bucket_page_id.to_ne_bytes());
    }

    pub fn local_depth(&self, idx: usize) -> u32 {
        debug_assert!(idx < DIRECTORY_ARRAY_SIZE);
        self.page.data()[OFFSET_LOCAL_DEPTHS + idx] as u32
    }

    pub fn set_local_depth(&self, idx: usize, local_depth: u32) {
        debug_assert!(idx < DIRECTORY_ARRAY_SIZE);
        debug_assert!(local_depth <= MAX_GLOBAL_DEPTH);
        self.page.data_mut()[OFFSET_LOCAL_DEPTHS + idx] = local_depth as u8;
    }

    pub fn incr_local_depth(&self, idx: usize) {
        self.set_local_depth(idx, self.local_depth(idx) + 1);
    }

    pub fn decr_local_depth(&self, idx: usize) {
        self.set_local_depth(idx, self.local_depth(idx) - 1);
    }

    /// @return a mask of local_depth(idx) 1's and the rest 0's
    pub fn local_depth_mask(&self, idx: usize) -> u32 {
        (1 << self.local_depth(idx)) - 1
    }

    /// The directory index this slot pairs with across its highest local
    /// bit: the slot a bucket splits into, and the slot it merges with.
    pub fn split_image_index(&self, idx: usize) -> usize {
        let local_depth = self.local_depth(idx);
        debug_assert!(local_depth > 0);
        idx ^ (1 << (local_depth - 1))
    }

    /// Double the directory: bump the global depth and seed every slot in
    /// the new upper half from the slot it shadows in the lower half.
    pub fn incr_global_depth(&self) {
        let old_size = self.size();
        debug_assert!(old_size * 2 <= DIRECTORY_ARRAY_SIZE);
        for i in 0..old_size {
            let bucket_page_id = self.bucket_page_id(i);
            let local_depth = self.local_depth(i);
            self.set_bucket_page_id(old_size + i, bucket_page_id);
            self.set_local_depth(old_size + i, local_depth);
        }
        let depth = self.global_depth() + 1;
        let mut data = self.page.data_mut();
        data[OFFSET_GLOBAL_DEPTH..OFFSET_GLOBAL_DEPTH + 4]
            .copy_from_slice(&depth.to_ne_bytes());
    }

    pub fn decr_global_depth(&self) {
        let depth = self.global_depth() - 1;
        let mut data = self.page.data_mut();
        data[OFFSET_GLOBAL_DEPTH..OFFSET_GLOBAL_DEPTH + 4]
            .copy_from_slice(&depth.to_ne_bytes());
    }

    /// @return true if the directory can halve: every local depth is
    /// strictly below the global depth
    pub fn can_shrink(&self) -> bool {
        let global_depth = self.global_depth();
        if global_depth == 0 {
            return false;
        }
        (0..self.size()).all(|i| self.local_depth(i) < global_depth)
    }

    /// Panics unless the directory invariants hold:
    /// (1) all local depths are <= the global depth,
    /// (2) every slot pointing at a bucket agrees on that bucket's local
    ///     depth,
    /// (3) a bucket at local depth ld is pointed to by exactly
    ///     2^(global_depth - ld) slots.
    pub fn verify_integrity(&self) {
        let global_depth = self.global_depth();
        // bucket page id -> (local depth, slot count)
        let mut buckets: HashMap<PageId, (u32, usize)> = HashMap::new();

        for i in 0..self.size() {
            let bucket_page_id = self.bucket_page_id(i);
            let local_depth = self.local_depth(i);
            assert_ne!(bucket_page_id, INVALID_PAGE_ID, "unset slot {} in use", i);
            assert!(
                local_depth <= global_depth,
                "local depth {} above global depth {} at slot {}",
                local_depth,
                global_depth,
                i
            );
            let entry = buckets.entry(bucket_page_id).or_insert((local_depth, 0));
            assert_eq!(
                entry.0, local_depth,
                "slots disagree on the local depth of bucket page {}",
                bucket_page_id
            );
            entry.1 += 1;
        }

        for (bucket_page_id, (local_depth, count)) in buckets {
            assert_eq!(
                count,
                1 << (global_depth - local_depth),
                "bucket page {} at depth {} has the wrong number of slots",
                bucket_page_id,
                local_depth
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_directory() -> HashTableDirectoryPage {
        let page = Page::new();
        page.set_page_id(0);
        let dir = HashTableDirectoryPage::new(page);
        dir.set_bucket_page_id(0, 1);
        dir.set_local_depth(0, 0);
        dir
    }

    #[test]
    fn test_masks_and_size() {
        let dir = fresh_directory();
        assert_eq!(0, dir.global_depth());
        assert_eq!(0, dir.global_depth_mask());
        assert_eq!(1, dir.size());

        dir.incr_global_depth();
        dir.incr_global_depth();
        assert_eq!(2, dir.global_depth());
        assert_eq!(0b11, dir.global_depth_mask());
        assert_eq!(4, dir.size());

        dir.set_local_depth(0, 2);
        assert_eq!(0b11, dir.local_depth_mask(0));
    }

    #[test]
    fn test_grow_copies_lower_half() {
        let dir = fresh_directory();
        dir.incr_global_depth();
        dir.set_bucket_page_id(1, 2);
        dir.set_local_depth(0, 1);
        dir.set_local_depth(1, 1);

        dir.incr_global_depth();
        // Slots 2 and 3 shadow slots 0 and 1.
        assert_eq!(1, dir.bucket_page_id(2));
        assert_eq!(2, dir.bucket_page_id(3));
        assert_eq!(1, dir.local_depth(2));
        assert_eq!(1, dir.local_depth(3));
        dir.verify_integrity();
    }

    #[test]
    fn test_split_image_index() {
        let dir = fresh_directory();
        dir.incr_global_depth();
        dir.incr_global_depth();
        dir.incr_global_depth();

        dir.set_local_depth(5, 3); // 0b101
        assert_eq!(0b001, dir.split_image_index(5));
        dir.set_local_depth(5, 2);
        assert_eq!(0b111, dir.split_image_index(5));
        dir.set_local_depth(5, 1);
        assert_eq!(0b100, dir.split_image_index(5));
    }

    #[test]
    fn test_can_shrink() {
        let dir = fresh_directory();
        assert!(!dir.can_shrink()); // depth 0 can never shrink

        dir.incr_global_depth();
        dir.set_local_depth(0, 1);
        dir.set_local_depth(1, 1);
        dir.set_bucket_page_id(1, 2);
        assert!(!dir.can_shrink());

        dir.set_local_depth(0, 0);
        dir.set_local_depth(1, 0);
        dir.set_bucket_page_id(1, 1);
        assert!(dir.can_shrink());
    }
}
