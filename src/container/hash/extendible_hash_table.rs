use std::hash::Hash;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use super::hash_function::HashFunction;
use crate::buffer::BufferPoolManager;
use crate::common::config::PageId;
use crate::storage::index::Storable;
use crate::storage::page::hash_table_bucket_page::{BucketInsert, HashTableBucketPage};
use crate::storage::page::hash_table_directory_page::{HashTableDirectoryPage, MAX_GLOBAL_DEPTH};

/// A disk-resident extendible hash table: a directory page mapping the low
/// bits of a key's hash to bucket pages, growing and shrinking as buckets
/// split and merge. Both levels live in the buffer pool and are re-fetched
/// on demand; the table itself only remembers the directory's page id.
///
/// Concurrency: non-structural operations share the table latch while slot
/// access is guarded by the bucket page latches; structural operations
/// (split, merge, directory resize) take the table latch exclusively. A
/// bucket latch is never held across a buffer pool call, and never across
/// another bucket's latch: every bucket operation latches one page for
/// exactly its own scan.
pub struct ExtendibleHashTable<K, V>
where
    K: Storable + Eq + Hash,
    V: Storable + Eq,
{
    directory_page_id: PageId,
    bpm: Arc<dyn BufferPoolManager>,
    table_latch: RwLock<()>,
    hash_fn: HashFunction<K>,
    _value: std::marker::PhantomData<V>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Storable + Eq + Hash,
    V: Storable + Eq,
{
    /// Create the directory page and a single depth-zero bucket.
    pub fn new(bpm: Arc<dyn BufferPoolManager>, hash_fn: HashFunction<K>) -> Self {
        let directory = HashTableDirectoryPage::new(
            bpm.new_page().expect("buffer pool exhausted creating hash directory"),
        );
        let directory_page_id = directory.page_id();
        let bucket = bpm
            .new_page()
            .expect("buffer pool exhausted creating first hash bucket");
        let bucket_page_id = bucket.page_id().expect("fresh page has an id");

        directory.set_bucket_page_id(0, bucket_page_id);
        directory.set_local_depth(0, 0);
        bpm.unpin_page(directory_page_id, true);
        bpm.unpin_page(bucket_page_id, false);

        Self {
            directory_page_id,
            bpm,
            table_latch: RwLock::new(()),
            hash_fn,
            _value: std::marker::PhantomData,
        }
    }

    fn hash(&self, key: &K) -> u32 {
        self.hash_fn.hash(key)
    }

    fn fetch_directory(&self) -> HashTableDirectoryPage {
        HashTableDirectoryPage::new(
            self.bpm
                .fetch_page(self.directory_page_id)
                .expect("hash directory page must be fetchable"),
        )
    }

    fn fetch_bucket(&self, bucket_page_id: PageId) -> HashTableBucketPage<K, V> {
        HashTableBucketPage::new(
            self.bpm
                .fetch_page(bucket_page_id)
                .expect("hash bucket page must be fetchable"),
        )
    }

    fn directory_index(&self, key: &K, directory: &HashTableDirectoryPage) -> usize {
        (self.hash(key) & directory.global_depth_mask()) as usize
    }

    /// Collect every value stored under `key`.
    pub fn get_value(&self, key: &K) -> Vec<V> {
        let _table = self.table_latch.read();
        let directory = self.fetch_directory();
        let bucket_page_id = directory.bucket_page_id(self.directory_index(key, &directory));
        let bucket = self.fetch_bucket(bucket_page_id);

        let result = bucket.get_value(key);

        self.bpm.unpin_page(bucket_page_id, false);
        self.bpm.unpin_page(self.directory_page_id, false);
        result
    }

    /// Insert a key/value pair. Returns false if the exact pair is already
    /// present, or if a needed split cannot proceed (directory at maximum
    /// depth, or the buffer pool out of frames).
    pub fn insert(&self, key: &K, value: &V) -> bool {
        let outcome = {
            let _table = self.table_latch.read();
            let directory = self.fetch_directory();
            let bucket_page_id = directory.bucket_page_id(self.directory_index(key, &directory));
            let bucket = self.fetch_bucket(bucket_page_id);

            let outcome = bucket.insert(key, value);

            self.bpm
                .unpin_page(bucket_page_id, outcome == BucketInsert::Inserted);
            self.bpm.unpin_page(self.directory_page_id, false);
            outcome
            // The shared table latch drops here: split_insert needs it
            // exclusively.
        };

        match outcome {
            BucketInsert::Inserted => true,
            BucketInsert::Duplicate => false,
            BucketInsert::Full => self.split_insert(key, value),
        }
    }

    /// The structural path of `insert`: split the overflowing bucket (growing
    /// the directory when its local depth has caught up with the global
    /// depth), rehash, and retry until the pair lands or the directory is at
    /// its ceiling.
    fn split_insert(&self, key: &K, value: &V) -> bool {
        loop {
            let _table = self.table_latch.write();
            let directory = self.fetch_directory();
            let bucket_idx = self.directory_index(key, &directory);
            let bucket_page_id = directory.bucket_page_id(bucket_idx);
            let bucket = self.fetch_bucket(bucket_page_id);

            // Somebody else may have split this bucket while we waited for
            // the exclusive latch; re-check before doing anything structural.
            match bucket.insert(key, value) {
                BucketInsert::Inserted => {
                    self.bpm.unpin_page(bucket_page_id, true);
                    self.bpm.unpin_page(self.directory_page_id, false);
                    return true;
                }
                BucketInsert::Duplicate => {
                    self.bpm.unpin_page(bucket_page_id, false);
                    self.bpm.unpin_page(self.directory_page_id, false);
                    return false;
                }
                BucketInsert::Full => {}
            }

            let local_depth = directory.local_depth(bucket_idx);
            if local_depth == MAX_GLOBAL_DEPTH {
                warn!(
                    "hash bucket page {} full at maximum depth {}; insert rejected",
                    bucket_page_id, MAX_GLOBAL_DEPTH
                );
                self.bpm.unpin_page(bucket_page_id, false);
                self.bpm.unpin_page(self.directory_page_id, false);
                return false;
            }
            if local_depth == directory.global_depth() {
                directory.incr_global_depth();
            }

            let Some(image_page) = self.bpm.new_page() else {
                warn!("buffer pool exhausted splitting hash bucket {}", bucket_page_id);
                self.bpm.unpin_page(bucket_page_id, false);
                self.bpm.unpin_page(self.directory_page_id, true);
                return false;
            };
            let image_page_id = image_page.page_id().expect("fresh page has an id");
            let image = HashTableBucketPage::<K, V>::new(image_page);

            // Re-point every directory slot whose low bits now select the
            // image, and deepen both halves of the split.
            let new_depth = local_depth + 1;
            let new_mask = (1u32 << new_depth) - 1;
            let image_low_bits = (bucket_idx as u32 & new_mask) ^ (1 << local_depth);
            let bucket_low_bits = bucket_idx as u32 & new_mask;
            for idx in 0..directory.size() {
                let low_bits = idx as u32 & new_mask;
                if low_bits == image_low_bits {
                    directory.set_bucket_page_id(idx, image_page_id);
                    directory.set_local_depth(idx, new_depth);
                } else if low_bits == bucket_low_bits {
                    directory.set_local_depth(idx, new_depth);
                }
            }

            debug!(
                "split hash bucket {} -> {} at depth {}",
                bucket_page_id, image_page_id, new_depth
            );

            // Rehash: move every entry that now maps to the image. Each
            // bucket call takes its own frame latch, so nothing is held
            // across the pair.
            for (slot, entry_key, entry_value) in bucket.all_entries() {
                let target_idx = (self.hash(&entry_key) & directory.global_depth_mask()) as usize;
                if directory.bucket_page_id(target_idx) == image_page_id {
                    let moved = image.insert(&entry_key, &entry_value);
                    debug_assert_eq!(BucketInsert::Inserted, moved);
                    bucket.remove_at(slot);
                }
            }

            self.bpm.unpin_page(bucket_page_id, true);
            self.bpm.unpin_page(image_page_id, true);
            self.bpm.unpin_page(self.directory_page_id, true);

            // The split may not have made room on `key`'s side if most
            // entries shared the new bit; loop and try again.
        }
    }

    /// Remove a key/value pair. An emptied bucket triggers a merge pass and
    /// then a sweep for any other merge the shrink uncovered.
    pub fn remove(&self, key: &K, value: &V) -> bool {
        let (removed, emptied) = {
            let _table = self.table_latch.read();
            let directory = self.fetch_directory();
            let bucket_page_id = directory.bucket_page_id(self.directory_index(key, &directory));
            let bucket = self.fetch_bucket(bucket_page_id);

            let removed = bucket.remove(key, value);
            let emptied = removed && bucket.is_empty();

            self.bpm.unpin_page(bucket_page_id, removed);
            self.bpm.unpin_page(self.directory_page_id, false);
            (removed, emptied)
        };

        if emptied {
            self.merge(key);
            self.extra_merge();
        }
        removed
    }

    /// Fold `key`'s (now empty) bucket into its split image, provided the
    /// world has not changed since the latches were dropped: the two slots
    /// must still be distinct buckets of equal positive depth and the target
    /// must still be empty.
    fn merge(&self, key: &K) {
        let _table = self.table_latch.write();
        let directory = self.fetch_directory();
        let bucket_idx = self.directory_index(key, &directory);
        self.try_merge_at(&directory, bucket_idx);
        self.bpm.unpin_page(self.directory_page_id, true);
    }

    /// After a merge shrinks the directory, other empty buckets may have
    /// become mergeable (their split image changes with the depth). Sweep
    /// until a full pass finds nothing.
    fn extra_merge(&self) {
        let _table = self.table_latch.write();
        let directory = self.fetch_directory();
        loop {
            let mut merged_any = false;
            let mut idx = 0;
            while idx < directory.size() {
                if self.try_merge_at(&directory, idx) {
                    merged_any = true;
                    // The directory may have shrunk; restart the pass.
                    break;
                }
                idx += 1;
            }
            if !merged_any {
                break;
            }
        }
        self.bpm.unpin_page(self.directory_page_id, true);
    }

    /// Merge the bucket at `bucket_idx` into its split image if every
    /// precondition holds, then shrink the directory as far as it goes.
    /// Returns true if a merge happened. Caller holds the exclusive table
    /// latch and the directory pin.
    fn try_merge_at(&self, directory: &HashTableDirectoryPage, bucket_idx: usize) -> bool {
        let local_depth = directory.local_depth(bucket_idx);
        if local_depth == 0 {
            return false;
        }
        let image_idx = directory.split_image_index(bucket_idx);
        if directory.local_depth(image_idx) != local_depth {
            return false;
        }
        let bucket_page_id = directory.bucket_page_id(bucket_idx);
        let image_page_id = directory.bucket_page_id(image_idx);
        if bucket_page_id == image_page_id {
            return false;
        }

        // A concurrent insert may have refilled the bucket after the remove
        // dropped its latches.
        let bucket = self.fetch_bucket(bucket_page_id);
        let still_empty = bucket.is_empty();
        self.bpm.unpin_page(bucket_page_id, false);
        if !still_empty {
            return false;
        }

        debug!(
            "merging empty hash bucket {} into {} at depth {}",
            bucket_page_id, image_page_id, local_depth
        );
        self.bpm.delete_page(bucket_page_id);
        for idx in 0..directory.size() {
            let page_id = directory.bucket_page_id(idx);
            if page_id == bucket_page_id {
                directory.set_bucket_page_id(idx, image_page_id);
                directory.decr_local_depth(idx);
            } else if page_id == image_page_id {
                directory.decr_local_depth(idx);
            }
        }

        while directory.can_shrink() {
            directory.decr_global_depth();
        }
        true
    }

    /// @return the directory's current global depth
    pub fn global_depth(&self) -> u32 {
        let _table = self.table_latch.read();
        let directory = self.fetch_directory();
        let depth = directory.global_depth();
        self.bpm.unpin_page(self.directory_page_id, false);
        depth
    }

    /// Panics unless the directory invariants hold. See
    /// [`HashTableDirectoryPage::verify_integrity`].
    pub fn verify_integrity(&self) {
        let _table = self.table_latch.read();
        let directory = self.fetch_directory();
        directory.verify_integrity();
        self.bpm.unpin_page(self.directory_page_id, false);
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use tempdir::TempDir;

    use super::*;
    use crate::buffer::BufferPoolManagerInstance;
    use crate::storage::disk::DiskManager;

    fn make_bpm(dir: &TempDir, pool_size: usize) -> Arc<dyn BufferPoolManager> {
        let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        Arc::new(BufferPoolManagerInstance::new(pool_size, disk_manager))
    }

    #[test]
    fn test_insert_get_remove() {
        let dir = TempDir::new("hash_table_test").unwrap();
        let bpm = make_bpm(&dir, 50);
        let table: ExtendibleHashTable<u32, u32> =
            ExtendibleHashTable::new(bpm, HashFunction::new());

        for i in 0..5u32 {
            assert!(table.insert(&i, &i));
        }
        for i in 0..5u32 {
            assert_eq!(vec![i], table.get_value(&i));
        }

        // Same key, several values; exact duplicates rejected.
        assert!(table.insert(&1, &100));
        assert!(!table.insert(&1, &100));
        assert_eq!(vec![1, 100], table.get_value(&1).into_iter().sorted().collect_vec());

        assert!(table.remove(&1, &100));
        assert!(!table.remove(&1, &100));
        assert_eq!(vec![1], table.get_value(&1));

        assert!(table.get_value(&99).is_empty());
        table.verify_integrity();
    }

    /// A key padded out to 320 bytes. With an 8-byte value the entry is 328
    /// bytes, which forces the bucket capacity down to
    /// 4 * 4096 / (4 * 328 + 1) = 12 so splits and merges trigger quickly.
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    struct WideKey(u32);

    impl Storable for WideKey {
        const SIZE: usize = 320;

        fn store(&self, buf: &mut [u8]) {
            buf.fill(0);
            buf[..4].copy_from_slice(&self.0.to_ne_bytes());
        }

        fn load(buf: &[u8]) -> Self {
            WideKey(u32::from_ne_bytes(buf[..4].try_into().unwrap()))
        }
    }

    /// Groups of eight consecutive keys share a hash value, so directory
    /// indices follow the key's upper bits and range deletes empty whole
    /// buckets.
    fn block_hash(key: &WideKey) -> u32 {
        key.0 >> 3
    }

    fn wide_table(bpm: Arc<dyn BufferPoolManager>) -> ExtendibleHashTable<WideKey, u64> {
        ExtendibleHashTable::new(bpm, HashFunction::with(block_hash))
    }

    #[test]
    fn test_grow_on_inserts() {
        assert_eq!(12, HashTableBucketPage::<WideKey, u64>::capacity());

        let dir = TempDir::new("hash_table_test").unwrap();
        let bpm = make_bpm(&dir, 200);
        let table = wide_table(bpm);

        for i in 0..1024u32 {
            assert!(table.insert(&WideKey(i), &(i as u64)), "insert {} failed", i);
        }
        for i in 0..1024u32 {
            assert_eq!(vec![i as u64], table.get_value(&WideKey(i)));
        }
        // Eight entries per hash group and capacity 12 forces one group per
        // bucket: depth 7 is the smallest D with 2^D * 12 >= 1024.
        assert_eq!(7, table.global_depth());
        table.verify_integrity();
    }

    #[test]
    fn test_remove_merges_and_shrinks() {
        let dir = TempDir::new("hash_table_test").unwrap();
        let bpm = make_bpm(&dir, 200);
        let table = wide_table(bpm);

        for i in 0..1024u32 {
            assert!(table.insert(&WideKey(i), &(i as u64)));
        }
        assert_eq!(7, table.global_depth());

        // Deleting the upper half empties every bucket whose hash has bit 6
        // set; the merges cascade and the directory halves.
        for i in 512..1024u32 {
            assert!(table.remove(&WideKey(i), &(i as u64)), "remove {} failed", i);
        }
        assert_eq!(6, table.global_depth());
        table.verify_integrity();

        for i in 0..512u32 {
            assert_eq!(vec![i as u64], table.get_value(&WideKey(i)));
        }
        for i in 512..1024u32 {
            assert!(table.get_value(&WideKey(i)).is_empty());
        }
    }

    #[test]
    fn test_remove_everything_shrinks_to_zero() {
        let dir = TempDir::new("hash_table_test").unwrap();
        let bpm = make_bpm(&dir, 200);
        let table = wide_table(bpm);

        for i in 0..256u32 {
            assert!(table.insert(&WideKey(i), &(i as u64)));
        }
        assert!(table.global_depth() > 0);
        for i in 0..256u32 {
            assert!(table.remove(&WideKey(i), &(i as u64)));
        }
        assert_eq!(0, table.global_depth());
        table.verify_integrity();
    }

    #[test]
    fn test_concurrent_inserts() {
        let dir = TempDir::new("hash_table_test").unwrap();
        let bpm = make_bpm(&dir, 200);
        let table: Arc<ExtendibleHashTable<WideKey, u64>> = Arc::new(ExtendibleHashTable::new(
            bpm,
            HashFunction::with(block_hash),
        ));

        crossbeam::thread::scope(|s| {
            for t in 0..8u32 {
                let table = Arc::clone(&table);
                s.spawn(move |_| {
                    for i in (t * 128)..((t + 1) * 128) {
                        assert!(table.insert(&WideKey(i), &(i as u64)));
                    }
                });
            }
        })
        .unwrap();

        for i in 0..1024u32 {
            assert_eq!(vec![i as u64], table.get_value(&WideKey(i)));
        }
        table.verify_integrity();
    }

    #[test]
    fn test_concurrent_mixed_workload() {
        let dir = TempDir::new("hash_table_test").unwrap();
        let bpm = make_bpm(&dir, 200);
        let table: Arc<ExtendibleHashTable<WideKey, u64>> = Arc::new(ExtendibleHashTable::new(
            bpm,
            HashFunction::with(block_hash),
        ));

        for i in 0..512u32 {
            assert!(table.insert(&WideKey(i), &(i as u64)));
        }

        crossbeam::thread::scope(|s| {
            // Half the threads remove the preloaded lower range while the
            // other half inserts a fresh upper range.
            for t in 0..4u32 {
                let table = Arc::clone(&table);
                s.spawn(move |_| {
                    for i in (t * 128)..((t + 1) * 128) {
                        assert!(table.remove(&WideKey(i), &(i as u64)));
                    }
                });
            }
            for t in 0..4u32 {
                let table = Arc::clone(&table);
                s.spawn(move |_| {
                    for i in (512 + t * 128)..(512 + (t + 1) * 128) {
                        assert!(table.insert(&WideKey(i), &(i as u64)));
                    }
                });
            }
        })
        .unwrap();

        for i in 0..512u32 {
            assert!(table.get_value(&WideKey(i)).is_empty());
        }
        for i in 512..1024u32 {
            assert_eq!(vec![i as u64], table.get_value(&WideKey(i)));
        }
        table.verify_integrity();
    }
}
