//! Action result storage.
//!
//! Keyed `run_id/seq`, mirroring the action store's composite layout.

use std::sync::Arc;

use anyhow::Result;
use redb::{Database, ReadableTable, TableDefinition};

use retrace_core::ActionResult;

use crate::composite_key;

const RESULTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("action_results");

pub struct ResultStore {
    db: Arc<Database>,
}

impl ResultStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(RESULTS_TABLE)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    pub fn put(&self, result: &ActionResult) -> Result<()> {
        let bytes = serde_json::to_vec(result)?;
        let key = composite_key(&result.run_id, result.sequence_id);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RESULTS_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Results of one run in sequence order.
    pub fn list_for_run(&self, run_id: &str) -> Result<Vec<ActionResult>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RESULTS_TABLE)?;

        let prefix = format!("{}/", run_id);
        let mut results = Vec::new();
        for item in table.range(prefix.as_str()..)? {
            let (key, value) = item?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            results.push(serde_json::from_slice::<ActionResult>(value.value())?);
        }
        Ok(results)
    }

    pub fn delete_for_run(&self, run_id: &str) -> Result<usize> {
        let keys = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(RESULTS_TABLE)?;
            let prefix = format!("{}/", run_id);
            let mut keys = Vec::new();
            for item in table.range(prefix.as_str()..)? {
                let (key, _) = item?;
                if !key.value().starts_with(&prefix) {
                    break;
                }
                keys.push(key.value().to_string());
            }
            keys
        };

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RESULTS_TABLE)?;
            for key in &keys {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(keys.len())
    }
}
