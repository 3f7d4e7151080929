//! Loading externally authored procedures and seeding positions
//!
//! Procedure definitions are YAML documents describing the ordered
//! phase/step/task hierarchy. They are stored as-is; no structural checks are
//! performed beyond what the schema enforces.

use chrono::Utc;
use rusqlite::{ErrorCode, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::model::PositionStatus;
use crate::store::ProcStore;

/// A complete procedure template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureDef {
    pub title: String,
    /// Legal grounds the procedure rests on
    #[serde(default)]
    pub basis: Option<String>,
    pub phases: Vec<PhaseDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDef {
    pub title: String,
    pub order: i64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub title: String,
    pub order: i64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, alias = "responsible")]
    pub responsible_role: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    pub description: String,
    pub order: i64,
    #[serde(default)]
    pub required_documents: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl ProcedureDef {
    /// Parse a procedure definition from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Total number of tasks across all phases and steps
    pub fn task_count(&self) -> usize {
        self.phases
            .iter()
            .flat_map(|phase| phase.steps.iter())
            .map(|step| step.tasks.len())
            .sum()
    }
}

/// Input for seeding a committee together with its position
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub position_title: String,
    pub department: Option<String>,
    pub kenziffer: String,
    pub procedure_id: i64,
    pub created_by: Option<i64>,
    pub ba_name: String,
    pub member_ids: Vec<i64>,
    pub head_id: Option<i64>,
}

/// Ids created by [`ProcStore::create_position`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedPosition {
    pub position_id: i64,
    pub ba_id: i64,
}

impl ProcStore {
    /// Store a procedure template and return its id
    pub fn import_procedure(&mut self, def: &ProcedureDef) -> Result<i64> {
        debug!(title = %def.title, phases = def.phases.len(), "import_procedure: called");
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO procedures (procedure_title, grundlage) VALUES (?1, ?2)",
            params![def.title, def.basis],
        )?;
        let procedure_id = tx.last_insert_rowid();

        for phase in &def.phases {
            tx.execute(
                "INSERT INTO procedure_phases (procedure_id, phase_title, phase_order, link_url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![procedure_id, phase.title, phase.order, phase.link],
            )?;
            let phase_id = tx.last_insert_rowid();

            for step in &phase.steps {
                tx.execute(
                    "INSERT INTO procedure_steps (phase_id, step_title, step_order, responsible_user_type, link_url)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![phase_id, step.title, step.order, step.responsible_role, step.link],
                )?;
                let step_id = tx.last_insert_rowid();

                for task in &step.tasks {
                    tx.execute(
                        "INSERT INTO step_tasks (step_id, task_description, task_order, required_documents, link_url)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![step_id, task.description, task.order, task.required_documents, task.link],
                    )?;
                }
            }
        }

        tx.commit()?;
        info!(%procedure_id, task_count = def.task_count(), "Imported procedure '{}'", def.title);
        Ok(procedure_id)
    }

    /// Register a user and return the id
    pub fn add_user(&self, username: &str, email: Option<&str>, user_type: &str) -> Result<i64> {
        debug!(%username, %user_type, "add_user: called");
        self.conn.execute(
            "INSERT INTO users (username, email, user_type) VALUES (?1, ?2, ?3)",
            params![username, email, user_type],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Look up a user id by username
    pub fn user_id(&self, username: &str) -> Result<Option<i64>> {
        debug!(%username, "user_id: called");
        Ok(self
            .conn
            .query_row("SELECT user_id FROM users WHERE username = ?1", params![username], |row| row.get(0))
            .optional()?)
    }

    /// Create a committee, its members and the position it owns in one transaction
    pub fn create_position(&mut self, new: &NewPosition) -> Result<CreatedPosition> {
        debug!(title = %new.position_title, kenziffer = %new.kenziffer, "create_position: called");
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO berufungsausschuss (ba_name, created_by, created_at) VALUES (?1, ?2, ?3)",
            params![new.ba_name, new.created_by, Utc::now()],
        )?;
        let ba_id = tx.last_insert_rowid();

        for member_id in &new.member_ids {
            let is_head = new.head_id == Some(*member_id);
            tx.execute(
                "INSERT INTO ba_members (ba_id, user_id, is_head) VALUES (?1, ?2, ?3)",
                params![ba_id, member_id, is_head],
            )?;
        }

        let inserted = tx.execute(
            "INSERT INTO job_positions
                 (position_title, department, kenziffer, procedure_id, created_by, ba_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.position_title,
                new.department,
                new.kenziffer,
                new.procedure_id,
                new.created_by,
                ba_id,
                PositionStatus::Created,
                Utc::now()
            ],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err) && err.to_string().contains("kenziffer") {
                return Err(StoreError::DuplicateKenziffer(new.kenziffer.clone()));
            }
            return Err(err.into());
        }
        let position_id = tx.last_insert_rowid();

        tx.commit()?;
        info!(%position_id, %ba_id, "Created position '{}'", new.position_title);
        Ok(CreatedPosition { position_id, ba_id })
    }

    /// Move a position to another lifecycle state
    pub fn set_position_status(&self, position_id: i64, status: PositionStatus) -> Result<()> {
        debug!(%position_id, %status, "set_position_status: called");
        let affected = self.conn.execute(
            "UPDATE job_positions SET status = ?1 WHERE position_id = ?2",
            params![status, position_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("position {}", position_id)));
        }
        Ok(())
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}
