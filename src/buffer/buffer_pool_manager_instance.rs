use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::buffer_pool_manager::BufferPoolManager;
use super::lru_replacer::LruReplacer;
use crate::common::config::{FrameId, PageId};
use crate::storage::disk::DiskManager;
use crate::storage::page::Page;

/// BufferPoolManagerInstance caches disk pages in a fixed set of in-memory
/// frames. It can stand alone or serve as one shard of a
/// ParallelBufferPoolManager, in which case the page ids it allocates are
/// strided so that `page_id % num_instances == instance_index`.
pub struct BufferPoolManagerInstance {
    /// Number of frames in this instance.
    pool_size: usize,
    num_instances: u32,
    instance_index: u32,

    /// The frames themselves. Fixed at construction; contents turn over.
    pages: Vec<Page>,
    disk_manager: Arc<DiskManager>,
    /// Victim selection over unpinned frames; internally synchronized.
    replacer: LruReplacer,
    /// The single coarse latch over all pool metadata.
    latch: Mutex<PoolState>,
}

struct PoolState {
    /// Page table for keeping track of resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// Frames that have never held a page, available without eviction.
    free_list: VecDeque<FrameId>,
    /// The next page id this instance will allocate.
    next_page_id: PageId,
}

impl BufferPoolManagerInstance {
    /// Creates a standalone buffer pool (a "pool" of one instance).
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self::new_multi(pool_size, 1, 0, disk_manager)
    }

    /// Creates one shard of a parallel buffer pool.
    pub fn new_multi(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        assert!(num_instances > 0);
        assert!(
            instance_index < num_instances,
            "instance index must fall inside the pool"
        );
        Self {
            pool_size,
            num_instances,
            instance_index,
            pages: (0..pool_size).map(|_| Page::new()).collect(),
            disk_manager,
            replacer: LruReplacer::new(pool_size),
            latch: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list: (0..pool_size).collect(),
                next_page_id: instance_index,
            }),
        }
    }

    /// Hand out a fresh page id. Successive allocations by instance k of an
    /// N-way pool produce k, k+N, k+2N, ...
    fn allocate_page(&self, state: &mut PoolState) -> PageId {
        let page_id = state.next_page_id;
        state.next_page_id += self.num_instances;
        debug_assert_eq!(page_id % self.num_instances, self.instance_index);
        page_id
    }

    /// Find a frame to place a page in: the free list first, otherwise evict
    /// the replacer's victim, writing it back if dirty and erasing it from
    /// the page table. Returns `None` when every frame is pinned. Must be
    /// called with the pool latch held.
    fn find_free_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }
        let frame_id = self.replacer.victim()?;
        let victim = &self.pages[frame_id];
        let victim_page_id = victim
            .page_id()
            .expect("frame in the replacer holds no page");
        if victim.is_dirty() {
            debug!("evicting dirty page {}", victim_page_id);
            self.disk_manager.write_page(victim_page_id, &*victim.data());
        }
        state.page_table.remove(&victim_page_id);
        Some(frame_id)
    }
}

impl BufferPoolManager for BufferPoolManagerInstance {
    fn fetch_page(&self, page_id: PageId) -> Option<Page> {
        let mut state = self.latch.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let page = &self.pages[frame_id];
            page.pin();
            self.replacer.pin(frame_id);
            return Some(page.clone());
        }

        let frame_id = self.find_free_frame(&mut state)?;
        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();
        self.disk_manager.read_page(page_id, &mut *page.data_mut());
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Some(page.clone())
    }

    fn new_page(&self) -> Option<Page> {
        let mut state = self.latch.lock();
        let frame_id = self.find_free_frame(&mut state)?;
        let page_id = self.allocate_page(&mut state);

        let page = &self.pages[frame_id];
        page.reset();
        page.set_page_id(page_id);
        page.pin();
        // Write the zero page out so the allocated id is durable on disk.
        self.disk_manager.write_page(page_id, &*page.data());
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Some(page.clone())
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        if page.pin_count() <= 0 {
            return false;
        }
        if is_dirty {
            // Only ever set the flag here: another holder may have written
            // this page, and a clean unpin must not erase that fact.
            page.set_dirty(true);
        }
        page.unpin();
        if page.pin_count() == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    fn flush_page(&self, page_id: PageId) -> bool {
        let state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        self.disk_manager.write_page(page_id, &*page.data());
        page.set_dirty(false);
        true
    }

    fn flush_all_pages(&self) {
        let state = self.latch.lock();
        for (&page_id, &frame_id) in state.page_table.iter() {
            let page = &self.pages[frame_id];
            self.disk_manager.write_page(page_id, &*page.data());
            page.set_dirty(false);
        }
    }

    fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.latch.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            // Deleting a page that is not resident is a success.
            return true;
        };
        let page = &self.pages[frame_id];
        if page.pin_count() > 0 {
            return false;
        }
        if page.is_dirty() {
            self.disk_manager.write_page(page_id, &*page.data());
        }
        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        page.reset();
        state.free_list.push_back(frame_id);
        true
    }

    fn pool_size(&self) -> usize {
        self.pool_size
    }
}

#[cfg(test)]
mod tests {
    use rand::distributions::{Distribution, Uniform};
    use tempdir::TempDir;

    use super::*;
    use crate::common::config::PAGE_SIZE;

    fn make_bpm(dir: &TempDir, pool_size: usize) -> BufferPoolManagerInstance {
        let db_name = dir.path().join("test.db");
        let disk_manager = Arc::new(DiskManager::new(&db_name).unwrap());
        BufferPoolManagerInstance::new(pool_size, disk_manager)
    }

    #[test]
    fn test_binary_data() {
        let dir = TempDir::new("bpm_test").unwrap();
        let buffer_pool_size = 10;
        let bpm = make_bpm(&dir, buffer_pool_size);

        let mut rng = rand::thread_rng();
        let uniform_dist = Uniform::from(std::u8::MIN..=std::u8::MAX);

        // Scenario: The buffer pool is empty. We should be able to create a
        // new page.
        let page0 = bpm.new_page();
        assert!(page0.is_some());
        let page0 = page0.unwrap();
        assert_eq!(Some(0), page0.page_id());

        let mut random_binary_data: Vec<u8> =
            (0..PAGE_SIZE).map(|_| uniform_dist.sample(&mut rng)).collect();
        // Insert terminal characters both in the middle and at end.
        random_binary_data[PAGE_SIZE / 2] = 0;
        random_binary_data[PAGE_SIZE - 1] = 0;

        // Scenario: Once we have a page, we should be able to read and write
        // content.
        page0.data_mut().copy_from_slice(&random_binary_data);
        assert_eq!(&*page0.data(), random_binary_data.as_slice());

        // Scenario: We should be able to create new pages until we fill up
        // the buffer pool.
        for _i in 1..buffer_pool_size {
            assert!(bpm.new_page().is_some());
        }

        // Scenario: Once the buffer pool is full, we should not be able to
        // create any new pages.
        for _i in buffer_pool_size..buffer_pool_size * 2 {
            assert!(bpm.new_page().is_none());
        }

        // Scenario: After unpinning pages {0, 1, 2, 3, 4}, we should be able
        // to create 5 new pages.
        for i in 0..5 {
            assert!(bpm.unpin_page(i, true));
            bpm.flush_page(i);
        }
        for _i in 0..5 {
            let page = bpm.new_page();
            assert!(page.is_some());
            // Unpin the page here to allow future fetching.
            bpm.unpin_page(page.unwrap().page_id().unwrap(), false);
        }

        // Scenario: We should be able to fetch the data we wrote a while ago.
        let page0 = bpm.fetch_page(0).unwrap();
        assert_eq!(&*page0.data(), random_binary_data.as_slice());
        assert!(bpm.unpin_page(0, true));
    }

    #[test]
    fn test_sample() {
        let dir = TempDir::new("bpm_test").unwrap();
        let buffer_pool_size = 10;
        let bpm = make_bpm(&dir, buffer_pool_size);

        // Scenario: The buffer pool is empty. We should be able to create a
        // new page.
        let page0 = bpm.new_page();
        assert!(page0.is_some());
        let page0 = page0.unwrap();
        assert_eq!(Some(0), page0.page_id());

        // Scenario: Once we have a page, we should be able to read and write
        // content.
        let data = b"Hello";
        page0.data_mut()[..data.len()].copy_from_slice(data);
        assert_eq!(data, &page0.data()[..data.len()]);

        // Scenario: We should be able to create new pages until we fill up
        // the buffer pool.
        for _i in 1..buffer_pool_size {
            assert!(bpm.new_page().is_some());
        }

        // Scenario: Once the buffer pool is full, we should not be able to
        // create any new pages.
        for _i in buffer_pool_size..buffer_pool_size * 2 {
            assert!(bpm.new_page().is_none());
        }

        // Scenario: After unpinning pages {0, 1, 2, 3, 4} and pinning another
        // 4 new pages, there would still be one buffer page left for reading
        // page 0.
        for i in 0..5 {
            assert!(bpm.unpin_page(i, true));
        }
        for _i in 0..4 {
            assert!(bpm.new_page().is_some());
        }

        // Scenario: We should be able to fetch the data we wrote a while ago.
        let page0 = bpm.fetch_page(0).unwrap();
        assert_eq!(data, &page0.data()[..data.len()]);

        // Scenario: If we unpin page 0 and then make a new page, all the
        // buffer pages should now be pinned. Fetching page 0 again should
        // fail.
        assert!(bpm.unpin_page(0, true));
        assert!(bpm.new_page().is_some());
        assert!(bpm.fetch_page(0).is_none());
    }

    #[test]
    fn test_unpin_edge_cases() {
        let dir = TempDir::new("bpm_test").unwrap();
        let bpm = make_bpm(&dir, 2);

        // Unpinning a page that is not resident fails.
        assert!(!bpm.unpin_page(42, false));

        let page0 = bpm.new_page().unwrap();
        let pid = page0.page_id().unwrap();
        assert!(bpm.unpin_page(pid, false));
        // Pin count is already zero.
        assert!(!bpm.unpin_page(pid, false));
    }

    #[test]
    fn test_dirty_flag_is_monotonic() {
        let dir = TempDir::new("bpm_test").unwrap();
        let bpm = make_bpm(&dir, 2);

        let page0 = bpm.new_page().unwrap();
        let pid = page0.page_id().unwrap();
        // Two holders; the writer unpins dirty, the reader unpins clean.
        bpm.fetch_page(pid).unwrap();
        assert!(bpm.unpin_page(pid, true));
        assert!(bpm.unpin_page(pid, false));
        // The clean unpin must not have erased the writer's truth.
        assert!(page0.is_dirty());

        // Only an explicit flush clears the flag.
        assert!(bpm.flush_page(pid));
        assert!(!page0.is_dirty());
    }

    #[test]
    fn test_delete_page() {
        let dir = TempDir::new("bpm_test").unwrap();
        let bpm = make_bpm(&dir, 2);

        let page0 = bpm.new_page().unwrap();
        let pid = page0.page_id().unwrap();

        // Deleting while pinned fails; deleting an absent page succeeds.
        assert!(!bpm.delete_page(pid));
        assert!(bpm.delete_page(12345));

        assert!(bpm.unpin_page(pid, true));
        assert!(bpm.delete_page(pid));

        // The frame went back to the free list: with a pool of 2 we can now
        // hold two new pinned pages again.
        assert!(bpm.new_page().is_some());
        assert!(bpm.new_page().is_some());
        assert!(bpm.new_page().is_none());
    }

    #[test]
    fn test_victims_follow_unpin_order() {
        let dir = TempDir::new("bpm_test").unwrap();
        let bpm = make_bpm(&dir, 3);

        let mut pids = Vec::new();
        for _ in 0..3 {
            pids.push(bpm.new_page().unwrap().page_id().unwrap());
        }
        // Unpin in order 0, 1, 2; eviction then replaces them in that order.
        for &pid in &pids {
            assert!(bpm.unpin_page(pid, false));
        }
        for &expected_gone in &pids {
            assert!(bpm.new_page().is_some());
            // The page unpinned earliest is no longer fetchable once all
            // frames are pinned again... fetch brings it back from disk, so
            // instead check it got evicted: its frame now holds another page.
            assert!(!bpm
                .pages
                .iter()
                .any(|p| p.page_id() == Some(expected_gone)));
        }
    }
}
