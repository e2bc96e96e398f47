// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;
pub const INVALID_PAGE_ID: PageId = std::u32::MAX;

// Number of directory slots a hash index directory page carries. Bounds the
// global depth at 9.
pub const DIRECTORY_ARRAY_SIZE: usize = 512;

pub type PageId = u32;
pub type FrameId = usize;
pub type TxnId = u32;
pub type TableOid = u32;
pub type IndexOid = u32;
