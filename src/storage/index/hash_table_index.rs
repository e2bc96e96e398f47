use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::catalog::schema::Schema;
use crate::common::config::IndexOid;
use crate::common::rid::Rid;
use crate::container::hash::{ExtendibleHashTable, HashFunction};
use crate::storage::table::tuple::Tuple;

/// A secondary index over a table heap, backed by the extendible hash
/// table. Keys are a single integer-typed column projected out of the base
/// tuple; values are the rids the keys live at.
pub struct HashTableIndex {
    oid: IndexOid,
    name: String,
    key_schema: Schema,
    key_attrs: Vec<usize>,
    container: ExtendibleHashTable<i64, Rid>,
}

impl HashTableIndex {
    pub fn new(
        oid: IndexOid,
        name: impl Into<String>,
        key_schema: Schema,
        key_attrs: Vec<usize>,
        bpm: Arc<dyn BufferPoolManager>,
    ) -> HashTableIndex {
        assert_eq!(
            1,
            key_attrs.len(),
            "hash indexes key on exactly one column"
        );
        HashTableIndex {
            oid,
            name: name.into(),
            key_schema,
            key_attrs,
            container: ExtendibleHashTable::new(bpm, HashFunction::new()),
        }
    }

    pub fn oid(&self) -> IndexOid {
        self.oid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    pub fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    fn key_of(&self, key_tuple: &Tuple) -> i64 {
        key_tuple.value(&self.key_schema, 0).as_i64()
    }

    pub fn insert_entry(&self, key_tuple: &Tuple, rid: Rid) -> bool {
        self.container.insert(&self.key_of(key_tuple), &rid)
    }

    pub fn delete_entry(&self, key_tuple: &Tuple, rid: Rid) -> bool {
        self.container.remove(&self.key_of(key_tuple), &rid)
    }

    pub fn scan_key(&self, key_tuple: &Tuple) -> Vec<Rid> {
        self.container.get_value(&self.key_of(key_tuple))
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::buffer::BufferPoolManagerInstance;
    use crate::catalog::column::{Column, DataType};
    use crate::dbtype::value::Value;
    use crate::storage::disk::DiskManager;

    #[test]
    fn test_index_round_trip() {
        let dir = TempDir::new("hash_index_test").unwrap();
        let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
        let bpm: Arc<dyn BufferPoolManager> =
            Arc::new(BufferPoolManagerInstance::new(50, disk_manager));

        let key_schema = Schema::new(vec![Column::new("id", DataType::Integer)]);
        let index = HashTableIndex::new(0, "idx_id", key_schema.clone(), vec![0], bpm);

        let key = |id: i32| Tuple::from_values(&[Value::Integer(id)], &key_schema);
        for i in 0..100 {
            assert!(index.insert_entry(&key(i), Rid::new(1, i as u32)));
        }
        assert_eq!(vec![Rid::new(1, 42)], index.scan_key(&key(42)));

        assert!(index.delete_entry(&key(42), Rid::new(1, 42)));
        assert!(index.scan_key(&key(42)).is_empty());
        // Deleting an entry that is not there reports failure.
        assert!(!index.delete_entry(&key(42), Rid::new(1, 42)));
    }
}
