use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::buffer_pool_manager::BufferPoolManager;
use super::buffer_pool_manager_instance::BufferPoolManagerInstance;
use crate::common::config::PageId;
use crate::storage::disk::DiskManager;
use crate::storage::page::Page;

/// ParallelBufferPoolManager shards pages across `num_instances` independent
/// buffer pool instances by `page_id % num_instances`, cutting latch
/// contention without changing the interface.
pub struct ParallelBufferPoolManager {
    instances: Vec<BufferPoolManagerInstance>,
    /// Where the next `new_page` starts probing; advances by one per call so
    /// allocations spread over the instances.
    start_index: AtomicUsize,
}

impl ParallelBufferPoolManager {
    pub fn new(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        let instances = (0..num_instances)
            .map(|i| {
                BufferPoolManagerInstance::new_multi(
                    pool_size,
                    num_instances as u32,
                    i as u32,
                    disk_manager.clone(),
                )
            })
            .collect();
        Self {
            instances,
            start_index: AtomicUsize::new(0),
        }
    }

    /// The instance responsible for a given page id.
    fn instance_for(&self, page_id: PageId) -> &BufferPoolManagerInstance {
        &self.instances[page_id as usize % self.instances.len()]
    }
}

impl BufferPoolManager for ParallelBufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Option<Page> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    fn new_page(&self) -> Option<Page> {
        // Round-robin: probe each instance once, starting one further along
        // than the previous call did.
        let num_instances = self.instances.len();
        let start = self.start_index.fetch_add(1, Ordering::Relaxed);
        for offset in 0..num_instances {
            let instance = &self.instances[(start + offset) % num_instances];
            if let Some(page) = instance.new_page() {
                return Some(page);
            }
        }
        None
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> bool {
        self.instance_for(page_id).flush_page(page_id)
    }

    fn flush_all_pages(&self) {
        for instance in &self.instances {
            instance.flush_all_pages();
        }
    }

    fn delete_page(&self, page_id: PageId) -> bool {
        self.instance_for(page_id).delete_page(page_id)
    }

    fn pool_size(&self) -> usize {
        self.instances.len() * self.instances[0].pool_size()
    }
}
