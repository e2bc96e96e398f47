pub mod hash_table_bucket_page;
pub mod hash_table_directory_page;
pub mod page;
pub mod table_page;

pub use page::{Page, ReadPageData, WritePageData};
