use std::sync::Arc;

use crate::catalog::{Schema, TableInfo};
use crate::common::rid::Rid;
use crate::concurrency::transaction::IsolationLevel;
use crate::dbtype::value::Value;
use crate::execution::executor::{ExecutionError, ExecutionResult, Executor};
use crate::execution::executor_context::ExecutorContext;
use crate::execution::plans::SeqScanPlanNode;
use crate::storage::table::table_iterator::TableIterator;
use crate::storage::table::tuple::Tuple;

/// Full scan over a table heap with an optional predicate, taking shared
/// tuple locks as the isolation level demands: none under ReadUncommitted,
/// held-to-commit under RepeatableRead, and released as soon as the tuple
/// has been read (or rejected) under ReadCommitted.
pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    plan: SeqScanPlanNode,
    table_info: Arc<TableInfo>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: SeqScanPlanNode) -> SeqScanExecutor {
        let table_info = ctx
            .catalog
            .table_by_oid(plan.table_oid)
            .expect("seq scan over an unknown table");
        SeqScanExecutor {
            ctx,
            plan,
            table_info,
            iter: None,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> ExecutionResult<()> {
        self.iter = Some(self.table_info.table.iter());
        Ok(())
    }

    fn next(&mut self) -> ExecutionResult<Option<(Tuple, Rid)>> {
        let iter = self.iter.as_mut().expect("next before init");
        let txn = &self.ctx.transaction;
        let isolation = txn.isolation_level();

        for (rid, tuple) in iter.by_ref() {
            if isolation != IsolationLevel::ReadUncommitted
                && !self.ctx.lock_manager.lock_shared(txn, rid)
            {
                return Err(ExecutionError::TransactionAborted);
            }

            let passes = match &self.plan.predicate {
                Some(predicate) => predicate
                    .evaluate(&tuple, &self.table_info.schema)
                    .as_bool(),
                None => true,
            };
            if !passes {
                // The tuple is out of the result; ReadCommitted lets the
                // lock go right away.
                if isolation == IsolationLevel::ReadCommitted {
                    self.ctx.lock_manager.unlock(txn, rid);
                }
                continue;
            }

            let values: Vec<Value> = self
                .plan
                .output_exprs
                .iter()
                .map(|e| e.evaluate(&tuple, &self.table_info.schema))
                .collect();
            let mut out = Tuple::from_values(&values, &self.plan.output_schema);
            out.set_rid(rid);

            if isolation == IsolationLevel::ReadCommitted {
                self.ctx.lock_manager.unlock(txn, rid);
            }
            return Ok(Some((out, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
