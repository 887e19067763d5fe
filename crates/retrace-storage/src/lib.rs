//! Retrace storage - embedded persistence layer
//!
//! redb-backed stores for the four relations: workflow definitions, semantic
//! actions, workflow runs, and action results. Values are JSON-encoded;
//! composite keys (`parent_id/seq`) keep per-parent rows contiguous and
//! ordered. Deletes cascade: a definition owns its actions and runs, a run
//! owns its results.

mod action;
mod definition;
mod result;
mod run;

pub use action::ActionStore;
pub use definition::DefinitionStore;
pub use result::ResultStore;
pub use run::RunStore;

use std::sync::Arc;

use anyhow::Result;
use redb::Database;

/// Central storage manager that initializes all stores.
pub struct Storage {
    db: Arc<Database>,
    pub definitions: DefinitionStore,
    pub actions: ActionStore,
    pub runs: RunStore,
    pub results: ResultStore,
}

impl Storage {
    /// Open (or create) the database file and initialize every table.
    pub fn new(path: &str) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);

        let definitions = DefinitionStore::new(db.clone())?;
        let actions = ActionStore::new(db.clone())?;
        let runs = RunStore::new(db.clone())?;
        let results = ResultStore::new(db.clone())?;

        Ok(Self {
            db,
            definitions,
            actions,
            runs,
            results,
        })
    }

    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Delete a definition and everything it owns: its actions, its runs,
    /// and each run's results.
    pub fn delete_definition_cascade(&self, workflow_id: &str) -> Result<()> {
        for run in self.runs.list_for_workflow(workflow_id)? {
            self.results.delete_for_run(&run.id)?;
        }
        self.runs.delete_for_workflow(workflow_id)?;
        self.actions.delete_for_workflow(workflow_id)?;
        self.definitions.delete(workflow_id)?;
        Ok(())
    }

    /// Delete a run and its results.
    pub fn delete_run_cascade(&self, run_id: &str) -> Result<()> {
        self.results.delete_for_run(run_id)?;
        self.runs.delete(run_id)?;
        Ok(())
    }
}

/// Zero-padded composite key so redb's lexicographic ordering matches
/// sequence order within one parent.
pub(crate) fn composite_key(parent_id: &str, sequence_id: u32) -> String {
    format!("{}/{:08}", parent_id, sequence_id)
}
