pub mod table_heap;
pub mod table_iterator;
pub mod tuple;

pub use table_heap::TableHeap;
pub use table_iterator::TableIterator;
pub use tuple::Tuple;
