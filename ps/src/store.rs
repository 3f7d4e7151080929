//! Core ProcStore implementation
//!
//! Reads flat task rows for a position and applies status changes to the
//! committee-wide (`ba_progress`) and per-user (`user_progress`) tables.

use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::model::{
    ChatMessage, JobPosition, PositionProgress, PositionStatistics, PositionSummary, QueryOutput, Scope, SenderType,
    TaskRow, TaskStatus,
};
use crate::schema;

const SELECT_TASK_COLUMNS: &str = r#"
    SELECT
        p.procedure_title,
        p.grundlage,
        ph.phase_id,
        ph.phase_title,
        ph.phase_order,
        ph.link_url AS phase_link,
        ps.step_id,
        ps.step_title,
        ps.step_order,
        ps.responsible_user_type,
        ps.link_url AS step_link,
        st.task_id,
        st.task_description,
        st.task_order,
        st.required_documents,
        st.link_url AS task_link,
"#;

const FROM_HIERARCHY: &str = r#"
    FROM job_positions jp
    JOIN procedures p ON jp.procedure_id = p.procedure_id
    JOIN procedure_phases ph ON p.procedure_id = ph.procedure_id
    JOIN procedure_steps ps ON ph.phase_id = ps.phase_id
    JOIN step_tasks st ON ps.step_id = st.step_id
"#;

const ORDER_BY_HIERARCHY: &str = "ORDER BY ph.phase_order, ps.step_order, st.task_order";

/// The procedure store
pub struct ProcStore {
    pub(crate) conn: Connection,
}

impl ProcStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::bootstrap(&conn)?;
        info!(path = %path.display(), "Opened procedure store");
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::bootstrap(&conn)?;
        debug!("in_memory: opened");
        Ok(Self { conn })
    }

    // === Progress reads ===

    /// Fetch the flat task rows for a position in the given scope
    pub fn fetch_rows(&mut self, position_id: i64, scope: Scope) -> Result<Vec<TaskRow>> {
        debug!(%position_id, %scope, "fetch_rows: called");
        match scope {
            Scope::Personal { user_id } => self.fetch_personal(user_id, position_id),
            Scope::Shared => self.fetch_shared(position_id),
        }
    }

    /// Rows joined against the acting user's personal status records
    pub fn fetch_personal(&self, user_id: i64, position_id: i64) -> Result<Vec<TaskRow>> {
        debug!(%user_id, %position_id, "fetch_personal: called");
        let sql = format!(
            "{SELECT_TASK_COLUMNS}
                COALESCE(up.status, 'not_started') AS task_status,
                up.completed_at,
                up.notes,
                CASE WHEN up.status = 'completed' THEN up.user_id END AS completed_by
            {FROM_HIERARCHY}
            LEFT JOIN user_progress up ON st.task_id = up.task_id
                AND up.position_id = jp.position_id
                AND up.user_id = ?1
            WHERE jp.position_id = ?2
            {ORDER_BY_HIERARCHY}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, position_id], map_task_row)?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(row_count = rows.len(), "fetch_personal: done");
        Ok(rows)
    }

    /// Rows joined against the committee-wide status records
    ///
    /// Initializes the shared records first so a position opened for the
    /// first time is never missing rows.
    pub fn fetch_shared(&mut self, position_id: i64) -> Result<Vec<TaskRow>> {
        debug!(%position_id, "fetch_shared: called");
        if !self.ensure_shared_initialized(position_id)? {
            warn!(%position_id, "fetch_shared: shared status could not be initialized");
        }

        let sql = format!(
            "{SELECT_TASK_COLUMNS}
                COALESCE(bp.status, 'not_started') AS task_status,
                bp.completed_at,
                bp.notes,
                bp.completed_by
            {FROM_HIERARCHY}
            LEFT JOIN ba_progress bp ON st.task_id = bp.task_id
                AND bp.position_id = jp.position_id
            WHERE jp.position_id = ?1
            {ORDER_BY_HIERARCHY}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![position_id], map_task_row)?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(row_count = rows.len(), "fetch_shared: done");
        Ok(rows)
    }

    /// Number of committee-wide status rows stored for a position
    pub fn shared_row_count(&self, position_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ba_progress WHERE position_id = ?1",
            params![position_id],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::InvalidData(format!("negative row count {}", count)))
    }

    // === Shared status updates ===

    /// Make sure every task of the position has a shared row
    ///
    /// Missing rows are created as `not_started`; existing rows are left
    /// alone. Returns false when the position, its committee or its tasks
    /// cannot be resolved; nothing is written in that case.
    pub fn ensure_shared_initialized(&mut self, position_id: i64) -> Result<bool> {
        debug!(%position_id, "ensure_shared_initialized: called");
        let tx = self.conn.transaction()?;

        let Some(ba_id) = committee_for_position(&tx, position_id)? else {
            debug!(%position_id, "ensure_shared_initialized: no committee for position");
            return Ok(false);
        };

        let task_ids = procedure_task_ids(&tx, position_id)?;
        if task_ids.is_empty() {
            warn!(%position_id, "ensure_shared_initialized: position has no tasks");
            return Ok(false);
        }

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM ba_progress WHERE position_id = ?1",
            params![position_id],
            |row| row.get(0),
        )?;
        if usize::try_from(existing).is_ok_and(|n| n >= task_ids.len()) {
            debug!(%position_id, existing, "ensure_shared_initialized: already initialized");
            return Ok(true);
        }

        let mut inserted = 0;
        {
            let mut insert = tx.prepare(
                "INSERT INTO ba_progress (ba_id, position_id, task_id, status)
                 VALUES (?1, ?2, ?3, 'not_started')
                 ON CONFLICT(position_id, task_id) DO NOTHING",
            )?;
            for task_id in &task_ids {
                inserted += insert.execute(params![ba_id, position_id, task_id])?;
            }
        }
        tx.commit()?;

        info!(%position_id, %ba_id, inserted, "Initialized shared task status");
        Ok(true)
    }

    /// Apply a status change to the shared record and the actor's personal record
    ///
    /// Both upserts run in one transaction: either both rows change or neither
    /// does. Returns false for an unknown position, a task outside the
    /// position's procedure, or an upsert that touched no row.
    pub fn update_shared(
        &mut self,
        position_id: i64,
        task_id: i64,
        status: TaskStatus,
        acting_user_id: i64,
        notes: Option<&str>,
    ) -> Result<bool> {
        debug!(%position_id, %task_id, %status, %acting_user_id, "update_shared: called");
        let tx = self.conn.transaction()?;

        let Some(ba_id) = committee_for_position(&tx, position_id)? else {
            debug!(%position_id, "update_shared: position or committee not found");
            return Ok(false);
        };

        if !task_belongs_to_position(&tx, position_id, task_id)? {
            warn!(%position_id, %task_id, "update_shared: task is not part of the position's procedure");
            return Ok(false);
        }

        let completed_at = completion_time(status);
        let completed_by = status.is_completed().then_some(acting_user_id);

        let shared = tx.execute(
            "INSERT INTO ba_progress (ba_id, position_id, task_id, status, completed_at, notes, completed_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(position_id, task_id) DO UPDATE SET
                 ba_id = excluded.ba_id,
                 status = excluded.status,
                 completed_at = excluded.completed_at,
                 notes = COALESCE(excluded.notes, ba_progress.notes),
                 completed_by = excluded.completed_by",
            params![ba_id, position_id, task_id, status, completed_at, notes, completed_by],
        )?;

        let personal = upsert_personal(&tx, acting_user_id, position_id, task_id, status, completed_at, notes)?;

        if shared == 0 || personal == 0 {
            warn!(shared, personal, "update_shared: upsert affected no rows, rolling back");
            tx.rollback()?;
            return Ok(false);
        }

        tx.commit()?;
        info!(%position_id, %task_id, %status, %acting_user_id, "Updated shared task status");
        Ok(true)
    }

    /// Apply a status change to a single user's personal record only
    pub fn update_personal(
        &mut self,
        user_id: i64,
        position_id: i64,
        task_id: i64,
        status: TaskStatus,
        notes: Option<&str>,
    ) -> Result<bool> {
        debug!(%user_id, %position_id, %task_id, %status, "update_personal: called");
        let tx = self.conn.transaction()?;

        if !task_belongs_to_position(&tx, position_id, task_id)? {
            debug!(%position_id, %task_id, "update_personal: task is not part of the position's procedure");
            return Ok(false);
        }

        let affected = upsert_personal(&tx, user_id, position_id, task_id, status, completion_time(status), notes)?;
        if affected == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    // === Positions ===

    /// Look up a position by id
    pub fn position(&self, position_id: i64) -> Result<Option<JobPosition>> {
        debug!(%position_id, "position: called");
        let position = self
            .conn
            .query_row(
                "SELECT position_id, position_title, department, kenziffer, procedure_id, ba_id, status
                 FROM job_positions WHERE position_id = ?1",
                params![position_id],
                |row| {
                    Ok(JobPosition {
                        position_id: row.get(0)?,
                        position_title: row.get(1)?,
                        department: row.get(2)?,
                        kenziffer: row.get(3)?,
                        procedure_id: row.get(4)?,
                        ba_id: row.get(5)?,
                        status: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(position)
    }

    /// Active positions visible to a user
    ///
    /// `None` lists every active position (HR view); `Some(user_id)` lists the
    /// positions owned by committees the user belongs to.
    pub fn active_positions(&self, user_id: Option<i64>) -> Result<Vec<PositionSummary>> {
        debug!(?user_id, "active_positions: called");
        let map = |row: &Row<'_>| -> rusqlite::Result<PositionSummary> {
            Ok(PositionSummary {
                position_id: row.get(0)?,
                position_title: row.get(1)?,
                kenziffer: row.get(2)?,
                department: row.get(3)?,
                ba_name: row.get(4)?,
                is_head: row.get(5)?,
                status: row.get(6)?,
            })
        };

        let positions = match user_id {
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT jp.position_id, jp.position_title, jp.kenziffer, jp.department,
                            ba.ba_name, NULL AS is_head, jp.status
                     FROM job_positions jp
                     LEFT JOIN berufungsausschuss ba ON jp.ba_id = ba.ba_id
                     WHERE jp.status IN ('created', 'in_progress')
                     ORDER BY jp.position_id DESC",
                )?;
                stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?
            }
            Some(user_id) => {
                let mut stmt = self.conn.prepare(
                    "SELECT jp.position_id, jp.position_title, jp.kenziffer, jp.department,
                            ba.ba_name, bm.is_head, jp.status
                     FROM job_positions jp
                     JOIN ba_members bm ON jp.ba_id = bm.ba_id
                     JOIN berufungsausschuss ba ON jp.ba_id = ba.ba_id
                     WHERE bm.user_id = ?1 AND jp.status IN ('created', 'in_progress')
                     ORDER BY jp.position_id DESC",
                )?;
                stmt.query_map(params![user_id], map)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(positions)
    }

    /// Active positions with committee-wide progress counts
    pub fn position_overview(&self) -> Result<Vec<PositionProgress>> {
        debug!("position_overview: called");
        let mut stmt = self.conn.prepare(
            "SELECT jp.position_id, jp.position_title, jp.kenziffer, jp.department, jp.status,
                    ba.ba_id, ba.ba_name,
                    COUNT(DISTINCT st.task_id) AS total_tasks,
                    COUNT(DISTINCT CASE WHEN bp.status = 'completed' THEN bp.task_id END) AS completed_tasks
             FROM job_positions jp
             LEFT JOIN berufungsausschuss ba ON jp.ba_id = ba.ba_id
             LEFT JOIN procedure_phases ph ON ph.procedure_id = jp.procedure_id
             LEFT JOIN procedure_steps ps ON ph.phase_id = ps.phase_id
             LEFT JOIN step_tasks st ON ps.step_id = st.step_id
             LEFT JOIN ba_progress bp ON st.task_id = bp.task_id AND bp.position_id = jp.position_id
             WHERE jp.status IN ('created', 'in_progress')
             GROUP BY jp.position_id
             ORDER BY jp.position_id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let total: i64 = row.get(7)?;
            let completed: i64 = row.get(8)?;
            Ok(PositionProgress {
                position_id: row.get(0)?,
                position_title: row.get(1)?,
                kenziffer: row.get(2)?,
                department: row.get(3)?,
                status: row.get(4)?,
                ba_id: row.get(5)?,
                ba_name: row.get(6)?,
                total_tasks: total.max(0) as u64,
                completed_tasks: completed.max(0) as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Position counts plus the mean committee progress of active positions
    pub fn position_statistics(&self) -> Result<PositionStatistics> {
        debug!("position_statistics: called");
        let (total, assigned, unassigned, completed): (i64, i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*),
                    COUNT(CASE WHEN ba_id IS NOT NULL THEN 1 END),
                    COUNT(CASE WHEN ba_id IS NULL THEN 1 END),
                    COUNT(CASE WHEN status = 'completed' THEN 1 END)
             FROM job_positions
             WHERE status IN ('created', 'in_progress', 'completed')",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        // AVG over no rows is NULL
        let average: Option<f64> = self.conn.query_row(
            "SELECT AVG(pct) FROM (
                 SELECT CASE WHEN COUNT(DISTINCT st.task_id) = 0 THEN 0.0
                             ELSE COUNT(DISTINCT CASE WHEN bp.status = 'completed' THEN bp.task_id END) * 100.0
                                  / COUNT(DISTINCT st.task_id)
                        END AS pct
                 FROM job_positions jp
                 LEFT JOIN procedure_phases ph ON ph.procedure_id = jp.procedure_id
                 LEFT JOIN procedure_steps ps ON ph.phase_id = ps.phase_id
                 LEFT JOIN step_tasks st ON ps.step_id = st.step_id
                 LEFT JOIN ba_progress bp ON st.task_id = bp.task_id AND bp.position_id = jp.position_id
                 WHERE jp.status IN ('created', 'in_progress')
                 GROUP BY jp.position_id
             )",
            [],
            |row| row.get(0),
        )?;

        Ok(PositionStatistics {
            total_positions: total.max(0) as u64,
            assigned_positions: assigned.max(0) as u64,
            unassigned_positions: unassigned.max(0) as u64,
            completed_positions: completed.max(0) as u64,
            average_progress: average.unwrap_or(0.0),
        })
    }

    // === Chat log ===

    /// Start a chat session and return its id
    pub fn create_chat_session(&self, user_id: i64, position_id: i64) -> Result<i64> {
        debug!(%user_id, %position_id, "create_chat_session: called");
        self.conn.execute(
            "INSERT INTO chat_sessions (user_id, position_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, position_id, Utc::now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Append a message to a session
    pub fn save_chat_message(&self, session_id: i64, sender: SenderType, text: &str) -> Result<()> {
        debug!(%session_id, sender = sender.as_str(), "save_chat_message: called");
        self.conn.execute(
            "INSERT INTO chat_messages (session_id, sender_type, message_text, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, sender, text, Utc::now()],
        )?;
        Ok(())
    }

    /// Most recent messages for a user and position, newest first
    pub fn chat_history(&self, user_id: i64, position_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        debug!(%user_id, %position_id, %limit, "chat_history: called");
        let mut stmt = self.conn.prepare(
            "SELECT cm.sender_type, cm.message_text, cm.created_at
             FROM chat_sessions cs
             JOIN chat_messages cm ON cs.session_id = cm.session_id
             WHERE cs.user_id = ?1 AND cs.position_id = ?2
             ORDER BY cm.created_at DESC, cm.message_id DESC
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![user_id, position_id, limit], |row| {
            Ok(ChatMessage {
                sender_type: row.get(0)?,
                message_text: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // === Ad-hoc queries ===

    /// `CREATE` statements for the given tables/views
    pub fn schema_info(&self, objects: &[&str]) -> Result<String> {
        debug!(?objects, "schema_info: called");
        let mut stmt = self
            .conn
            .prepare("SELECT sql FROM sqlite_master WHERE name = ?1 AND sql IS NOT NULL")?;
        let mut parts = Vec::new();
        for name in objects {
            if let Some(sql) = stmt.query_row(params![name], |row| row.get::<_, String>(0)).optional()? {
                parts.push(sql.trim().to_string());
            }
        }
        Ok(parts.join("\n\n"))
    }

    /// Run a single read-only statement and render its cells as text
    ///
    /// Statements that could modify the database are rejected.
    pub fn run_readonly_query(&self, sql: &str, max_rows: usize) -> Result<QueryOutput> {
        debug!(sql_len = sql.len(), %max_rows, "run_readonly_query: called");
        let mut stmt = self.conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(StoreError::InvalidData("only read-only queries are allowed".to_string()));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();
        let mut output = QueryOutput {
            columns,
            ..QueryOutput::default()
        };

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if output.rows.len() >= max_rows {
                output.truncated = true;
                break;
            }
            let mut cells = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                cells.push(render_value(row.get_ref(idx)?));
            }
            output.rows.push(cells);
        }
        Ok(output)
    }
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        procedure_title: row.get(0)?,
        basis: row.get(1)?,
        phase_id: row.get(2)?,
        phase_title: row.get(3)?,
        phase_order: row.get(4)?,
        phase_link: row.get(5)?,
        step_id: row.get(6)?,
        step_title: row.get(7)?,
        step_order: row.get(8)?,
        responsible_role: row.get(9)?,
        step_link: row.get(10)?,
        task_id: row.get(11)?,
        task_description: row.get(12)?,
        task_order: row.get(13)?,
        required_documents: row.get(14)?,
        task_link: row.get(15)?,
        task_status: row.get(16)?,
        completed_at: row.get(17)?,
        notes: row.get(18)?,
        completed_by: row.get(19)?,
    })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

fn completion_time(status: TaskStatus) -> Option<DateTime<Utc>> {
    status.is_completed().then(Utc::now)
}

fn committee_for_position(tx: &Transaction<'_>, position_id: i64) -> Result<Option<i64>> {
    let ba_id: Option<Option<i64>> = tx
        .query_row(
            "SELECT ba_id FROM job_positions WHERE position_id = ?1",
            params![position_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(ba_id.flatten())
}

fn procedure_task_ids(tx: &Transaction<'_>, position_id: i64) -> Result<Vec<i64>> {
    let mut stmt = tx.prepare(
        "SELECT st.task_id
         FROM job_positions jp
         JOIN procedure_phases ph ON ph.procedure_id = jp.procedure_id
         JOIN procedure_steps ps ON ps.phase_id = ph.phase_id
         JOIN step_tasks st ON st.step_id = ps.step_id
         WHERE jp.position_id = ?1
         ORDER BY ph.phase_order, ps.step_order, st.task_order",
    )?;
    let ids = stmt
        .query_map(params![position_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

fn task_belongs_to_position(tx: &Transaction<'_>, position_id: i64, task_id: i64) -> Result<bool> {
    let found: Option<i64> = tx
        .query_row(
            "SELECT st.task_id
             FROM job_positions jp
             JOIN procedure_phases ph ON ph.procedure_id = jp.procedure_id
             JOIN procedure_steps ps ON ps.phase_id = ph.phase_id
             JOIN step_tasks st ON st.step_id = ps.step_id
             WHERE jp.position_id = ?1 AND st.task_id = ?2",
            params![position_id, task_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn upsert_personal(
    tx: &Transaction<'_>,
    user_id: i64,
    position_id: i64,
    task_id: i64,
    status: TaskStatus,
    completed_at: Option<DateTime<Utc>>,
    notes: Option<&str>,
) -> Result<usize> {
    let affected = tx.execute(
        "INSERT INTO user_progress (user_id, position_id, task_id, status, completed_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, position_id, task_id) DO UPDATE SET
             status = excluded.status,
             completed_at = excluded.completed_at,
             notes = COALESCE(excluded.notes, user_progress.notes)",
        params![user_id, position_id, task_id, status, completed_at, notes],
    )?;
    Ok(affected)
}
