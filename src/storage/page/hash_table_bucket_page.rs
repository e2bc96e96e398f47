use std::marker::PhantomData;

use crate::common::config::{PageId, PAGE_SIZE};
use crate::storage::index::Storable;
use crate::storage::page::Page;

/// Outcome of a bucket-level insert attempt. `Duplicate` and `Full` both
/// surface to callers as a failed insert, but only `Full` should trigger a
/// split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketInsert {
    Inserted,
    Duplicate,
    Full,
}

/// Typed view over one hash table bucket page.
///
/// Layout: an `occupied` bitmap (has this slot ever held an entry?), a
/// `readable` bitmap (does it hold a live one?), then the entry array.
/// Bit 7 of bitmap byte 0 is slot 0. `readable` is always a subset of
/// `occupied`; removal clears only the readable bit, so after splits the
/// readable bits may alternate with holes while occupied stays dense enough
/// for early exit.
///
/// Every multi-slot operation holds the frame latch for its whole scan, so
/// concurrent writers under the table's shared latch cannot interleave
/// half-finished slots.
pub struct HashTableBucketPage<K, V> {
    page: Page,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> HashTableBucketPage<K, V>
where
    K: Storable + Eq,
    V: Storable + Eq,
{
    pub fn new(page: Page) -> Self {
        Self {
            page,
            _marker: PhantomData,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id().expect("bucket page lost its id")
    }

    /// Number of entries a bucket page of this key/value shape holds.
    pub fn capacity() -> usize {
        4 * PAGE_SIZE / (4 * (K::SIZE + V::SIZE) + 1)
    }

    fn bitmap_bytes() -> usize {
        (Self::capacity() + 7) / 8
    }

    fn entry_offset(slot: usize) -> usize {
        2 * Self::bitmap_bytes() + slot * (K::SIZE + V::SIZE)
    }

    fn is_set(data: &[u8], bitmap_start: usize, slot: usize) -> bool {
        data[bitmap_start + slot / 8] & (0b1000_0000 >> (slot % 8)) != 0
    }

    fn set_bit(data: &mut [u8], bitmap_start: usize, slot: usize) {
        data[bitmap_start + slot / 8] |= 0b1000_0000 >> (slot % 8);
    }

    fn clear_bit(data: &mut [u8], bitmap_start: usize, slot: usize) {
        data[bitmap_start + slot / 8] &= !(0b1000_0000 >> (slot % 8));
    }

    fn is_occupied_raw(data: &[u8], slot: usize) -> bool {
        Self::is_set(data, 0, slot)
    }

    fn is_readable_raw(data: &[u8], slot: usize) -> bool {
        Self::is_set(data, Self::bitmap_bytes(), slot)
    }

    fn key_at_raw(data: &[u8], slot: usize) -> K {
        let offset = Self::entry_offset(slot);
        K::load(&data[offset..offset + K::SIZE])
    }

    fn value_at_raw(data: &[u8], slot: usize) -> V {
        let offset = Self::entry_offset(slot) + K::SIZE;
        V::load(&data[offset..offset + V::SIZE])
    }

    /// Collect every value stored under `key`.
    pub fn get_value(&self, key: &K) -> Vec<V> {
        let data = self.page.data();
        let mut result = Vec::new();
        for slot in 0..Self::capacity() {
            if Self::is_readable_raw(&*data, slot) {
                if Self::key_at_raw(&*data, slot) == *key {
                    result.push(Self::value_at_raw(&*data, slot));
                }
            } else if !Self::is_occupied_raw(&*data, slot) {
                // Nothing was ever stored at or past this slot.
                break;
            }
        }
        result
    }

    /// Insert a key/value pair. The whole array is scanned for a duplicate
    /// before anything is written, remembering the first hole on the way;
    /// readable bits are not contiguous after splits, so the first hole is
    /// not necessarily before the last live entry.
    pub fn insert(&self, key: &K, value: &V) -> BucketInsert {
        let mut data = self.page.data_mut();
        let capacity = Self::capacity();
        let mut insert_slot = capacity;
        for slot in 0..capacity {
            if Self::is_readable_raw(&*data, slot) {
                if Self::key_at_raw(&*data, slot) == *key
                    && Self::value_at_raw(&*data, slot) == *value
                {
                    return BucketInsert::Duplicate;
                }
            } else {
                if insert_slot == capacity {
                    insert_slot = slot;
                }
                if !Self::is_occupied_raw(&*data, slot) {
                    break;
                }
            }
        }

        if insert_slot == capacity {
            return BucketInsert::Full;
        }
        let offset = Self::entry_offset(insert_slot);
        key.store(&mut data[offset..offset + K::SIZE]);
        value.store(&mut data[offset + K::SIZE..offset + K::SIZE + V::SIZE]);
        Self::set_bit(&mut *data, 0, insert_slot);
        Self::set_bit(&mut *data, Self::bitmap_bytes(), insert_slot);
        BucketInsert::Inserted
    }

    /// Remove the slot holding exactly this key/value pair, reporting
    /// whether one existed.
    pub fn remove(&self, key: &K, value: &V) -> bool {
        let mut data = self.page.data_mut();
        for slot in 0..Self::capacity() {
            if Self::is_readable_raw(&*data, slot)
                && Self::key_at_raw(&*data, slot) == *key
                && Self::value_at_raw(&*data, slot) == *value
            {
                Self::clear_bit(&mut *data, Self::bitmap_bytes(), slot);
                return true;
            }
            if !Self::is_occupied_raw(&*data, slot) {
                break;
            }
        }
        false
    }

    /// Clear a slot by index (used when rehashing entries into a split
    /// image).
    pub fn remove_at(&self, slot: usize) {
        let mut data = self.page.data_mut();
        Self::clear_bit(&mut *data, Self::bitmap_bytes(), slot);
    }

    pub fn key_at(&self, slot: usize) -> Option<K> {
        let data = self.page.data();
        Self::is_readable_raw(&*data, slot).then(|| Self::key_at_raw(&*data, slot))
    }

    pub fn value_at(&self, slot: usize) -> Option<V> {
        let data = self.page.data();
        Self::is_readable_raw(&*data, slot).then(|| Self::value_at_raw(&*data, slot))
    }

    /// Snapshot of every live (slot, key, value) triple.
    pub fn all_entries(&self) -> Vec<(usize, K, V)> {
        let data = self.page.data();
        let mut entries = Vec::new();
        for slot in 0..Self::capacity() {
            if Self::is_readable_raw(&*data, slot) {
                entries.push((
                    slot,
                    Self::key_at_raw(&*data, slot),
                    Self::value_at_raw(&*data, slot),
                ));
            } else if !Self::is_occupied_raw(&*data, slot) {
                break;
            }
        }
        entries
    }

    pub fn is_full(&self) -> bool {
        self.num_readable() == Self::capacity()
    }

    pub fn is_empty(&self) -> bool {
        let data = self.page.data();
        data[Self::bitmap_bytes()..2 * Self::bitmap_bytes()]
            .iter()
            .all(|byte| *byte == 0)
    }

    pub fn num_readable(&self) -> usize {
        let data = self.page.data();
        data[Self::bitmap_bytes()..2 * Self::bitmap_bytes()]
            .iter()
            .map(|byte| byte.count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type IntBucket = HashTableBucketPage<u32, u32>;

    fn fresh_bucket() -> IntBucket {
        let page = Page::new();
        page.set_page_id(1);
        IntBucket::new(page)
    }

    #[test]
    fn test_capacity_fills_the_page() {
        // occupied + readable bitmaps plus the entry array must fit.
        let capacity = IntBucket::capacity();
        let bitmap = (capacity + 7) / 8;
        assert!(2 * bitmap + capacity * 8 <= PAGE_SIZE);
        assert_eq!(496, capacity);
    }

    #[test]
    fn test_insert_get_remove() {
        let bucket = fresh_bucket();
        assert!(bucket.is_empty());

        for i in 0..10u32 {
            assert_eq!(BucketInsert::Inserted, bucket.insert(&i, &(i * 10)));
        }
        assert_eq!(10, bucket.num_readable());
        assert_eq!(vec![50], bucket.get_value(&5));
        assert!(bucket.get_value(&11).is_empty());

        // The same key can hold several values, but not the same pair twice.
        assert_eq!(BucketInsert::Inserted, bucket.insert(&5, &51));
        assert_eq!(BucketInsert::Duplicate, bucket.insert(&5, &51));
        assert_eq!(vec![50, 51], bucket.get_value(&5));

        assert!(bucket.remove(&5, &50));
        assert!(!bucket.remove(&5, &50));
        assert_eq!(vec![51], bucket.get_value(&5));
    }

    #[test]
    fn test_insert_reuses_holes() {
        let bucket = fresh_bucket();
        for i in 0..20u32 {
            assert_eq!(BucketInsert::Inserted, bucket.insert(&i, &i));
        }
        // Punch holes in the middle; occupied bits stay set.
        assert!(bucket.remove(&3, &3));
        assert!(bucket.remove(&7, &7));

        // New entries land in the first holes, before the dense tail.
        assert_eq!(BucketInsert::Inserted, bucket.insert(&100, &100));
        assert_eq!(Some(100), bucket.key_at(3));
        assert_eq!(BucketInsert::Inserted, bucket.insert(&101, &101));
        assert_eq!(Some(101), bucket.key_at(7));
    }

    #[test]
    fn test_duplicate_check_scans_past_holes() {
        let bucket = fresh_bucket();
        for i in 0..10u32 {
            assert_eq!(BucketInsert::Inserted, bucket.insert(&i, &i));
        }
        assert!(bucket.remove(&0, &0));
        // 9 still lives past the hole at slot 0; the dup scan must find it
        // rather than stopping at the first free slot.
        assert_eq!(BucketInsert::Duplicate, bucket.insert(&9, &9));
        assert_eq!(vec![9], bucket.get_value(&9));
    }

    #[test]
    fn test_full_bucket_rejects() {
        let bucket = fresh_bucket();
        let capacity = IntBucket::capacity() as u32;
        for i in 0..capacity {
            assert_eq!(BucketInsert::Inserted, bucket.insert(&i, &i));
        }
        assert!(bucket.is_full());
        assert_eq!(BucketInsert::Full, bucket.insert(&capacity, &capacity));
        // A duplicate of a stored pair still reports Duplicate, not Full.
        assert_eq!(BucketInsert::Duplicate, bucket.insert(&0, &0));

        assert!(bucket.remove(&0, &0));
        assert!(!bucket.is_full());
        assert_eq!(BucketInsert::Inserted, bucket.insert(&capacity, &capacity));
    }
}
