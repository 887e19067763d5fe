//! Workflow run storage.

use std::sync::Arc;

use anyhow::Result;
use redb::{Database, ReadableTable, TableDefinition};

use retrace_core::{RunStatus, WorkflowRun, now_ms};

const RUNS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("workflow_runs");

pub struct RunStore {
    db: Arc<Database>,
}

impl RunStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(RUNS_TABLE)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    pub fn put(&self, run: &WorkflowRun) -> Result<()> {
        // Results are owned by the results store.
        let mut stored = run.clone();
        stored.action_results.clear();
        let bytes = serde_json::to_vec(&stored)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RUNS_TABLE)?;
            table.insert(run.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<WorkflowRun>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RUNS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Advance a run's status. Timestamps follow the status transitions:
    /// `started_at` on leaving pending, `completed_at` on reaching a
    /// terminal status.
    pub fn update_status(&self, id: &str, status: RunStatus, error_message: &str) -> Result<()> {
        let Some(mut run) = self.get(id)? else {
            anyhow::bail!("workflow run {} not found", id);
        };

        run.status = status;
        if status != RunStatus::Pending && run.started_at.is_none() {
            run.started_at = Some(now_ms());
        }
        if status.is_terminal() && run.completed_at.is_none() {
            run.completed_at = Some(now_ms());
        }
        if !error_message.is_empty() {
            run.error_message = error_message.to_string();
        }

        self.put(&run)
    }

    /// Runs of one definition, newest first.
    pub fn list_for_workflow(&self, workflow_id: &str) -> Result<Vec<WorkflowRun>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RUNS_TABLE)?;

        let mut runs = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            let run: WorkflowRun = serde_json::from_slice(value.value())?;
            if run.workflow_id == workflow_id {
                runs.push(run);
            }
        }
        runs.sort_by_key(|run| std::cmp::Reverse(run.started_at.unwrap_or(0)));
        Ok(runs)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(RUNS_TABLE)?;
            table.remove(id)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    pub fn delete_for_workflow(&self, workflow_id: &str) -> Result<usize> {
        let ids: Vec<String> = self
            .list_for_workflow(workflow_id)?
            .into_iter()
            .map(|run| run.id)
            .collect();

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RUNS_TABLE)?;
            for id in &ids {
                table.remove(id.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(ids.len())
    }
}
