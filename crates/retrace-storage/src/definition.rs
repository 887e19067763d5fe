//! Workflow definition storage.

use std::sync::Arc;

use anyhow::Result;
use redb::{Database, ReadableTable, TableDefinition};

use retrace_core::WorkflowDefinition;

const DEFINITIONS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("workflow_definitions");

pub struct DefinitionStore {
    db: Arc<Database>,
}

impl DefinitionStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(DEFINITIONS_TABLE)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Insert or replace a definition. The stored row excludes the computed
    /// action/parameter vectors only if callers strip them; definitions are
    /// small enough to store whole.
    pub fn put(&self, definition: &WorkflowDefinition) -> Result<()> {
        let bytes = serde_json::to_vec(definition)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DEFINITIONS_TABLE)?;
            table.insert(definition.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<WorkflowDefinition>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEFINITIONS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All definitions, newest first.
    pub fn list(&self) -> Result<Vec<WorkflowDefinition>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEFINITIONS_TABLE)?;

        let mut definitions = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            definitions.push(serde_json::from_slice::<WorkflowDefinition>(value.value())?);
        }
        definitions.sort_by_key(|definition| std::cmp::Reverse(definition.created_at));
        Ok(definitions)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(DEFINITIONS_TABLE)?;
            table.remove(id)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }
}
