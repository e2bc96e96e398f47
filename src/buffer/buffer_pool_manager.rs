use crate::common::config::PageId;
use crate::storage::page::Page;

/// The interface every buffer pool flavor exposes to the storage layer.
///
/// Consumers (table heap, hash index) hold `Arc<dyn BufferPoolManager>` and
/// never care whether a single instance or a sharded pool sits behind it.
/// The pin discipline is global: every successful `fetch_page`/`new_page`
/// must be paired with exactly one `unpin_page`, including on error paths.
pub trait BufferPoolManager: Send + Sync {
    /// Fetch the requested page from the buffer pool, pinning it. Returns
    /// `None` if the page is not resident and every frame is pinned.
    fn fetch_page(&self, page_id: PageId) -> Option<Page>;

    /// Create a new page in the buffer pool, pinned. The fresh page is
    /// written out immediately so its id is durable. Returns `None` if
    /// every frame is pinned.
    fn new_page(&self) -> Option<Page>;

    /// Decrement the pin count of a page. `is_dirty` ORs into the frame's
    /// dirty flag; it can never clear it. Returns false if the page is not
    /// resident or was not pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool;

    /// Write the page to disk regardless of its dirty flag and clear the
    /// flag. Returns false if the page is not resident.
    fn flush_page(&self, page_id: PageId) -> bool;

    /// Flush every resident page.
    fn flush_all_pages(&self);

    /// Drop a page from the pool, writing it back first if dirty. Deleting
    /// an absent page succeeds; deleting a pinned page fails.
    fn delete_page(&self, page_id: PageId) -> bool;

    /// @return the total number of frames this pool manages
    fn pool_size(&self) -> usize;
}
