pub mod buffer_pool_manager;
pub mod buffer_pool_manager_instance;
pub mod lru_replacer;
pub mod parallel_buffer_pool_manager;

pub use buffer_pool_manager::BufferPoolManager;
pub use buffer_pool_manager_instance::BufferPoolManagerInstance;
pub use lru_replacer::LruReplacer;
pub use parallel_buffer_pool_manager::ParallelBufferPoolManager;
