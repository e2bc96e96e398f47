use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::catalog::schema::Schema;
use crate::common::config::{IndexOid, TableOid};
use crate::storage::index::HashTableIndex;
use crate::storage::table::table_heap::TableHeap;

/// Everything the executors need to know about one table.
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: Schema,
    pub table: Arc<TableHeap>,
}

/// Everything the executors need to know about one index.
pub struct IndexInfo {
    pub oid: IndexOid,
    pub name: String,
    pub table_name: String,
    pub index: Arc<HashTableIndex>,
}

/// The minimal bookkeeping layer between plans and storage: name/oid
/// registries for tables and their indexes.
pub struct Catalog {
    bpm: Arc<dyn BufferPoolManager>,
    inner: Mutex<CatalogInner>,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<TableOid, Arc<TableInfo>>,
    table_names: HashMap<String, TableOid>,
    indexes: HashMap<IndexOid, Arc<IndexInfo>>,
    index_names: HashMap<String, Vec<IndexOid>>,
    next_table_oid: TableOid,
    next_index_oid: IndexOid,
}

impl Catalog {
    pub fn new(bpm: Arc<dyn BufferPoolManager>) -> Catalog {
        Catalog {
            bpm,
            inner: Mutex::new(CatalogInner::default()),
        }
    }

    pub fn create_table(&self, name: impl Into<String>, schema: Schema) -> Arc<TableInfo> {
        let name = name.into();
        let mut inner = self.inner.lock();
        assert!(
            !inner.table_names.contains_key(&name),
            "table {} already exists",
            name
        );
        let oid = inner.next_table_oid;
        inner.next_table_oid += 1;
        let info = Arc::new(TableInfo {
            oid,
            name: name.clone(),
            schema,
            table: Arc::new(TableHeap::new(self.bpm.clone(), oid)),
        });
        inner.tables.insert(oid, info.clone());
        inner.table_names.insert(name, oid);
        info
    }

    pub fn table(&self, name: &str) -> Option<Arc<TableInfo>> {
        let inner = self.inner.lock();
        let oid = inner.table_names.get(name)?;
        inner.tables.get(oid).cloned()
    }

    pub fn table_by_oid(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.inner.lock().tables.get(&oid).cloned()
    }

    /// Register an index keyed on `key_attrs` of an existing table. The
    /// index starts empty; it is not backfilled from the heap.
    pub fn create_index(
        &self,
        index_name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Arc<IndexInfo> {
        let index_name = index_name.into();
        let table_info = self.table(table_name).expect("indexing a missing table");
        let key_schema = table_info.schema.project(&key_attrs);

        let mut inner = self.inner.lock();
        let oid = inner.next_index_oid;
        inner.next_index_oid += 1;
        let info = Arc::new(IndexInfo {
            oid,
            name: index_name.clone(),
            table_name: table_name.to_string(),
            index: Arc::new(HashTableIndex::new(
                oid,
                index_name,
                key_schema,
                key_attrs,
                self.bpm.clone(),
            )),
        });
        inner.indexes.insert(oid, info.clone());
        inner
            .index_names
            .entry(table_name.to_string())
            .or_default()
            .push(oid);
        info
    }

    pub fn index_by_oid(&self, oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.inner.lock().indexes.get(&oid).cloned()
    }

    /// Every index declared over `table_name`.
    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let inner = self.inner.lock();
        inner
            .index_names
            .get(table_name)
            .map(|oids| {
                oids.iter()
                    .filter_map(|oid| inner.indexes.get(oid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
