pub mod extendible_hash_table;
pub mod hash_function;

pub use extendible_hash_table::ExtendibleHashTable;
pub use hash_function::HashFunction;
