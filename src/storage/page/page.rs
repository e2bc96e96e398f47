use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::config::{PageId, PAGE_SIZE};

/// Page is the basic unit of storage within the database system. Page provides
/// a wrapper for actual data pages being held in main memory. Page also
/// contains book-keeping information that is used by the buffer pool manager,
/// e.g. pin count, dirty flag, page id, etc.
///
/// The data region sits behind its own reader/writer lock — this is the
/// per-frame latch that index and table pages take while interpreting page
/// bytes. Book-keeping lives under a separate mutex so that pinning a frame
/// never has to wait behind a reader holding the data latch.
#[derive(Debug, Clone)]
pub struct Page(Arc<PageInner>);

#[derive(Debug)]
struct PageInner {
    data: RwLock<[u8; PAGE_SIZE]>,
    meta: Mutex<PageMeta>,
}

#[derive(Debug)]
struct PageMeta {
    // The ID of this page, none while the frame holds no page.
    page_id: Option<PageId>,

    // The pin count of this page.
    pin_count: i32,

    // True if the page is dirty, i.e. it is different from its corresponding
    // page on disk.
    is_dirty: bool,
}

/// Read guard over the raw page bytes; holding it is holding the frame's
/// read latch.
pub type ReadPageData<'a> = RwLockReadGuard<'a, [u8; PAGE_SIZE]>;
/// Write guard over the raw page bytes; holding it is holding the frame's
/// write latch.
pub type WritePageData<'a> = RwLockWriteGuard<'a, [u8; PAGE_SIZE]>;

impl Page {
    /// Constructor. Zeros out the page data.
    pub fn new() -> Page {
        Page(Arc::new(PageInner {
            data: RwLock::new([0; PAGE_SIZE]),
            meta: Mutex::new(PageMeta {
                page_id: None,
                pin_count: 0,
                is_dirty: false,
            }),
        }))
    }

    pub fn reset(&self) {
        self.0.data.write().fill(0);
        let mut meta = self.0.meta.lock();
        meta.page_id = None;
        meta.pin_count = 0;
        meta.is_dirty = false;
    }

    /// @return the actual data contained within this page, under the frame's
    /// read latch
    pub fn data(&self) -> ReadPageData<'_> {
        self.0.data.read()
    }

    /// @return the actual data contained within this page, under the frame's
    /// write latch
    pub fn data_mut(&self) -> WritePageData<'_> {
        self.0.data.write()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.0.meta.lock().page_id = Some(page_id);
    }

    /// @return the page id of this page
    pub fn page_id(&self) -> Option<PageId> {
        self.0.meta.lock().page_id
    }

    /// @return the pin count of this page
    pub fn pin_count(&self) -> i32 {
        self.0.meta.lock().pin_count
    }

    pub fn pin(&self) {
        self.0.meta.lock().pin_count += 1;
    }

    pub fn unpin(&self) {
        self.0.meta.lock().pin_count -= 1;
    }

    /// @return true if the page in memory has been modified from the page on
    /// disk, false otherwise
    pub fn is_dirty(&self) -> bool {
        self.0.meta.lock().is_dirty
    }

    pub fn set_dirty(&self, is_dirty: bool) {
        self.0.meta.lock().is_dirty = is_dirty;
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}
