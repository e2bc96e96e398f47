use std::sync::Arc;

use crate::catalog::{DataType, IndexInfo, Schema, TableInfo};
use crate::common::rid::Rid;
use crate::concurrency::transaction::{IndexWriteRecord, IsolationLevel, WriteType};
use crate::dbtype::value::Value;
use crate::execution::executor::{ExecutionError, ExecutionResult, Executor};
use crate::execution::executor_context::ExecutorContext;
use crate::execution::plans::{UpdatePlanNode, UpdateType};
use crate::storage::table::tuple::Tuple;

/// Rewrites every row the child produces according to the plan's attribute
/// map, with the same locking discipline as delete: upgrade the child's
/// shared lock under RepeatableRead, take the exclusive lock directly
/// otherwise. Indexes are maintained by delete-then-insert of the key.
pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    plan: UpdatePlanNode,
    child: Box<dyn Executor>,
}

impl UpdateExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: UpdatePlanNode,
        child: Box<dyn Executor>,
    ) -> UpdateExecutor {
        let table_info = ctx
            .catalog
            .table_by_oid(plan.table_oid)
            .expect("update of an unknown table");
        let indexes = ctx.catalog.table_indexes(&table_info.name);
        UpdateExecutor {
            ctx,
            table_info,
            indexes,
            plan,
            child,
        }
    }

    /// Regenerate a full row: untouched columns copy through, `Set`
    /// replaces, `Add` adds an integer delta.
    fn generate_updated_tuple(&self, src: &Tuple) -> Tuple {
        let schema = &self.table_info.schema;
        let mut values = Vec::with_capacity(schema.column_count());
        for idx in 0..schema.column_count() {
            let old = src.value(schema, idx);
            match self.plan.update_attrs.get(&idx) {
                None => values.push(old),
                Some(info) => match info.update_type {
                    UpdateType::Add => values.push(old.add(&Value::Integer(info.update_value))),
                    UpdateType::Set => {
                        values.push(match schema.column(idx).data_type {
                            DataType::Integer => Value::Integer(info.update_value),
                            DataType::SmallInt => Value::SmallInt(info.update_value as i16),
                            DataType::TinyInt => Value::TinyInt(info.update_value as i8),
                            DataType::Boolean => Value::Boolean(info.update_value != 0),
                        });
                    }
                },
            }
        }
        Tuple::from_values(&values, schema)
    }
}

impl Executor for UpdateExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some((old_tuple, rid)) = self.child.next()? else {
            return Ok(None);
        };

        let txn = &self.ctx.transaction;
        let locked = if txn.isolation_level() == IsolationLevel::RepeatableRead {
            self.ctx.lock_manager.lock_upgrade(txn, rid)
        } else {
            self.ctx.lock_manager.lock_exclusive(txn, rid)
        };
        if !locked {
            return Err(ExecutionError::TransactionAborted);
        }

        let mut new_tuple = self.generate_updated_tuple(&old_tuple);
        if !self.table_info.table.update_tuple(&new_tuple, rid, txn) {
            return Err(ExecutionError::Internal(format!(
                "in-place update failed for rid {}",
                rid
            )));
        }
        new_tuple.set_rid(rid);

        for index_info in &self.indexes {
            let index = &index_info.index;
            let old_key = old_tuple.key_from_tuple(
                &self.table_info.schema,
                index.key_schema(),
                index.key_attrs(),
            );
            let new_key = new_tuple.key_from_tuple(
                &self.table_info.schema,
                index.key_schema(),
                index.key_attrs(),
            );
            index.delete_entry(&old_key, rid);
            index.insert_entry(&new_key, rid);
            txn.append_index_write(IndexWriteRecord {
                rid,
                wtype: WriteType::Update,
                index_oid: index_info.oid,
                key_tuple: new_key,
                old_key_tuple: Some(old_key),
            });
        }

        Ok(Some((new_tuple, rid)))
    }

    fn output_schema(&self) -> &Schema {
        &self.table_info.schema
    }
}
