pub mod catalog;
pub mod column;
pub mod schema;

pub use catalog::{Catalog, IndexInfo, TableInfo};
pub use column::{Column, DataType};
pub use schema::Schema;
