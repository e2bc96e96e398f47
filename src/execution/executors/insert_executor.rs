use std::sync::Arc;

use crate::catalog::{IndexInfo, Schema, TableInfo};
use crate::common::rid::Rid;
use crate::concurrency::transaction::{IndexWriteRecord, WriteType};
use crate::execution::executor::{ExecutionError, ExecutionResult, Executor};
use crate::execution::executor_context::ExecutorContext;
use crate::execution::plans::InsertPlanNode;
use crate::storage::table::tuple::Tuple;

/// Inserts rows into a table heap — either a literal list carried by the
/// plan (a "raw" insert) or whatever a child executor produces — and keeps
/// every index on the table in sync.
pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    plan: InsertPlanNode,
    child: Option<Box<dyn Executor>>,
    raw_cursor: usize,
}

impl InsertExecutor {
    pub fn new(
        ctx: Arc<ExecutorContext>,
        plan: InsertPlanNode,
        child: Option<Box<dyn Executor>>,
    ) -> InsertExecutor {
        let table_info = ctx
            .catalog
            .table_by_oid(plan.table_oid)
            .expect("insert into an unknown table");
        let indexes = ctx.catalog.table_indexes(&table_info.name);
        InsertExecutor {
            ctx,
            table_info,
            indexes,
            plan,
            child,
            raw_cursor: 0,
        }
    }

    fn next_source_tuple(&mut self) -> ExecutionResult<Option<Tuple>> {
        if let Some(child) = self.child.as_mut() {
            return Ok(child.next()?.map(|(tuple, _)| tuple));
        }
        let Some(values) = self.plan.raw_values.get(self.raw_cursor) else {
            return Ok(None);
        };
        self.raw_cursor += 1;
        Ok(Some(Tuple::from_values(values, &self.table_info.schema)))
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        if let Some(child) = self.child.as_mut() {
            child.init()?;
        }
        self.raw_cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let Some(mut tuple) = self.next_source_tuple()? else {
            return Ok(None);
        };

        let txn = &self.ctx.transaction;
        let Some(rid) = self.table_info.table.insert_tuple(&tuple, txn) else {
            return Err(ExecutionError::Internal(format!(
                "table {} rejected an insert",
                self.table_info.name
            )));
        };
        tuple.set_rid(rid);

        for index_info in &self.indexes {
            let index = &index_info.index;
            let key = tuple.key_from_tuple(
                &self.table_info.schema,
                index.key_schema(),
                index.key_attrs(),
            );
            index.insert_entry(&key, rid);
            txn.append_index_write(IndexWriteRecord {
                rid,
                wtype: WriteType::Insert,
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
