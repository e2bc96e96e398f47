use std::sync::Arc;

use crate::catalog::{IndexInfo, Schema, TableInfo};
use crate::common::rid::Rid;
use crate::concurrency::transaction::{IndexWriteRecord, IsolationLevel, WriteType};
use crate::execution::executor::{ExecutionError, ExecutionResult, Executor};
use crate::execution::executor_context::ExecutorContext;
use crate::execution::plans::DeletePlanNode;
use crate::storage::table::tuple::Tuple;

/// Mark-deletes every row the child produces. Under RepeatableRead the
/// child's scan already holds a shared lock on the victim, so the delete
/// upgrades it; other levels take the exclusive lock directly.
pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    child: Box<dyn Executor>,
}

impl DeleteExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: DeletePlanNode,
        child: Box<dyn Executor>,
    ) -> DeleteExecutor {
        let table_info = ctx
            .catalog
            .table_by_oid(plan.table_oid)
            .expect("delete from an unknown table");
        let indexes = ctx.catalog.table_indexes(&table_info.name);
        DeleteExecutor {
            ctx,
            table_info,
            indexes,
            child,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some((tuple, rid)) = self.child.next()? else {
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

        if !self.table_info.table.mark_delete(rid, txn) {
            return Err(ExecutionError::Internal(format!(
                "mark-delete failed for rid {}",
                rid
            )));
        }

        for index_info in &self.indexes {
            let index = &index_info.index;
            let key = tuple.key_from_tuple(
                &self.table_info.schema,
                index.key_schema(),
                index.key_attrs(),
            );
            index.delete_entry(&key, rid);
            txn.append_index_write(IndexWriteRecord {
                rid,
                wtype: WriteType::Delete,
                index_oid: index_info.oid,
                key_tuple: key,
                old_key_tuple: None,
            });
        }

        Ok(Some((tuple, rid)))
    }

    fn output_schema(&self) -> &Schema {
        &self.table_info.schema
    }
}
