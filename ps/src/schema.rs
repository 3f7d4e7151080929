//! SQLite schema
//!
//! Table and column names match the databases the chat assistant and the
//! checklist pages already read (`phase_order`, `step_order`, `task_order`,
//! status strings), so they must not be renamed.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS procedures (
    procedure_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    procedure_title  TEXT NOT NULL,
    grundlage        TEXT
);

CREATE TABLE IF NOT EXISTS procedure_phases (
    phase_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    procedure_id  INTEGER NOT NULL REFERENCES procedures(procedure_id),
    phase_title   TEXT NOT NULL,
    phase_order   INTEGER NOT NULL,
    link_url      TEXT
);

CREATE TABLE IF NOT EXISTS procedure_steps (
    step_id                INTEGER PRIMARY KEY AUTOINCREMENT,
    phase_id               INTEGER NOT NULL REFERENCES procedure_phases(phase_id),
    step_title             TEXT NOT NULL,
    step_order             INTEGER NOT NULL,
    responsible_user_type  TEXT,
    link_url               TEXT
);

CREATE TABLE IF NOT EXISTS step_tasks (
    task_id             INTEGER PRIMARY KEY AUTOINCREMENT,
    step_id             INTEGER NOT NULL REFERENCES procedure_steps(step_id),
    task_description    TEXT NOT NULL,
    task_order          INTEGER NOT NULL,
    required_documents  TEXT,
    link_url            TEXT
);

CREATE TABLE IF NOT EXISTS users (
    user_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT NOT NULL UNIQUE,
    email      TEXT,
    user_type  TEXT NOT NULL DEFAULT 'User'
);

CREATE TABLE IF NOT EXISTS berufungsausschuss (
    ba_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    ba_name     TEXT NOT NULL,
    created_by  INTEGER REFERENCES users(user_id),
    created_at  TEXT
);

CREATE TABLE IF NOT EXISTS ba_members (
    ba_id    INTEGER NOT NULL REFERENCES berufungsausschuss(ba_id),
    user_id  INTEGER NOT NULL REFERENCES users(user_id),
    is_head  INTEGER NOT NULL DEFAULT 0,
    UNIQUE (ba_id, user_id)
);

CREATE TABLE IF NOT EXISTS job_positions (
    position_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    position_title  TEXT NOT NULL,
    department      TEXT,
    kenziffer       TEXT NOT NULL UNIQUE,
    procedure_id    INTEGER NOT NULL REFERENCES procedures(procedure_id),
    ba_id           INTEGER REFERENCES berufungsausschuss(ba_id),
    status          TEXT NOT NULL DEFAULT 'created',
    created_by      INTEGER REFERENCES users(user_id),
    created_at      TEXT
);

CREATE TABLE IF NOT EXISTS user_progress (
    user_id       INTEGER NOT NULL,
    position_id   INTEGER NOT NULL REFERENCES job_positions(position_id),
    task_id       INTEGER NOT NULL REFERENCES step_tasks(task_id),
    status        TEXT NOT NULL DEFAULT 'not_started',
    completed_at  TEXT,
    notes         TEXT,
    UNIQUE (user_id, position_id, task_id)
);

CREATE TABLE IF NOT EXISTS ba_progress (
    ba_id         INTEGER NOT NULL REFERENCES berufungsausschuss(ba_id),
    position_id   INTEGER NOT NULL REFERENCES job_positions(position_id),
    task_id       INTEGER NOT NULL REFERENCES step_tasks(task_id),
    status        TEXT NOT NULL DEFAULT 'not_started',
    completed_at  TEXT,
    notes         TEXT,
    completed_by  INTEGER,
    UNIQUE (position_id, task_id)
);

CREATE TABLE IF NOT EXISTS chat_sessions (
    session_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL,
    position_id  INTEGER NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    message_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id    INTEGER NOT NULL REFERENCES chat_sessions(session_id),
    sender_type   TEXT NOT NULL,
    message_text  TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ba_progress_position ON ba_progress(position_id);
CREATE INDEX IF NOT EXISTS idx_user_progress_position ON user_progress(position_id, user_id);
CREATE INDEX IF NOT EXISTS idx_chat_sessions_user ON chat_sessions(user_id, position_id);

CREATE VIEW IF NOT EXISTS full_procedure_view AS
SELECT
    jp.position_id,
    jp.position_title,
    jp.kenziffer,
    jp.status AS position_status,
    p.procedure_title,
    p.grundlage,
    ph.phase_title,
    ph.phase_order,
    ps.step_title,
    ps.step_order,
    ps.responsible_user_type,
    st.task_id,
    st.task_description,
    st.task_order,
    st.required_documents,
    COALESCE(bp.status, 'not_started') AS task_status,
    bp.completed_at
FROM job_positions jp
JOIN procedures p ON jp.procedure_id = p.procedure_id
JOIN procedure_phases ph ON p.procedure_id = ph.procedure_id
JOIN procedure_steps ps ON ph.phase_id = ps.phase_id
JOIN step_tasks st ON ps.step_id = st.step_id
LEFT JOIN ba_progress bp ON st.task_id = bp.task_id AND bp.position_id = jp.position_id;
"#;

/// Tables and views described to the SQL-writing prompt
pub const QUERYABLE_OBJECTS: &[&str] = &["job_positions", "full_procedure_view"];

/// Create all tables, indexes and views if they do not exist yet
pub fn bootstrap(conn: &Connection) -> Result<()> {
    debug!("bootstrap: called");
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
