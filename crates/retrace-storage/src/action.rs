//! Semantic action storage.
//!
//! Keyed `workflow_id/seq` so the rows of one workflow are contiguous and
//! sequence-ordered under redb's lexicographic iteration.

use std::sync::Arc;

use anyhow::Result;
use redb::{Database, ReadableTable, TableDefinition};

use retrace_core::SemanticAction;

use crate::composite_key;

const ACTIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("semantic_actions");

pub struct ActionStore {
    db: Arc<Database>,
}

impl ActionStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(ACTIONS_TABLE)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Insert or replace one action row. The transient extraction context is
    /// not persisted.
    pub fn put(&self, action: &SemanticAction) -> Result<()> {
        let mut stored = action.clone();
        stored.context.clear();
        let bytes = serde_json::to_vec(&stored)?;

        let key = composite_key(&action.workflow_id, action.sequence_id);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn put_all(&self, actions: &[SemanticAction]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            for action in actions {
                let mut stored = action.clone();
                stored.context.clear();
                let bytes = serde_json::to_vec(&stored)?;
                let key = composite_key(&action.workflow_id, action.sequence_id);
                table.insert(key.as_str(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All actions of one workflow in sequence order.
    pub fn list_for_workflow(&self, workflow_id: &str) -> Result<Vec<SemanticAction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACTIONS_TABLE)?;

        let prefix = format!("{}/", workflow_id);
        let mut actions = Vec::new();
        for item in table.range(prefix.as_str()..)? {
            let (key, value) = item?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            actions.push(serde_json::from_slice::<SemanticAction>(value.value())?);
        }
        Ok(actions)
    }

    pub fn delete_for_workflow(&self, workflow_id: &str) -> Result<usize> {
        let keys = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(ACTIONS_TABLE)?;
            let prefix = format!("{}/", workflow_id);
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
            let mut table = write_txn.open_table(ACTIONS_TABLE)?;
            for key in &keys {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(keys.len())
    }
}
