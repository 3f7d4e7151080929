//! Typed records read from and written to the procedure store
//!
//! Status values are stored as the lowercase snake_case strings used by
//! existing databases (`not_started`, `in_progress`, `completed`, ...).

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// Completion state of a single task
///
/// `InProgress` is never produced by the update path but still appears in
/// older data, so it must be readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        *self == Self::Completed
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(StoreError::InvalidData(format!("unknown task status '{}'", other))),
        }
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Lifecycle state of a job position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    #[default]
    Created,
    InProgress,
    Completed,
    Cancelled,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Only created and in-progress positions are surfaced to users
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Created | Self::InProgress)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(StoreError::InvalidData(format!("unknown position status '{}'", other))),
        }
    }
}

impl ToSql for PositionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PositionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Which TaskStatus table a read or write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope")]
pub enum Scope {
    /// Per-user history rows in `user_progress`
    Personal { user_id: i64 },
    /// Committee-wide rows in `ba_progress`, one per task per position
    Shared,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personal { user_id } => write!(f, "personal(user {})", user_id),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// One task joined across procedure, phase, step and its status row
///
/// Rows without a status record come back as `NotStarted` with empty
/// completion fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub procedure_title: String,
    /// Legal grounds of the procedure (`grundlage`)
    pub basis: Option<String>,

    pub phase_id: i64,
    pub phase_title: String,
    pub phase_order: i64,
    pub phase_link: Option<String>,

    pub step_id: i64,
    pub step_title: String,
    pub step_order: i64,
    pub responsible_role: Option<String>,
    pub step_link: Option<String>,

    pub task_id: i64,
    pub task_description: String,
    pub task_order: i64,
    pub required_documents: Option<String>,
    pub task_link: Option<String>,

    pub task_status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub completed_by: Option<i64>,
}

/// A job position record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosition {
    pub position_id: i64,
    pub position_title: String,
    pub department: Option<String>,
    pub kenziffer: String,
    pub procedure_id: i64,
    /// Committee owning the position
    pub ba_id: Option<i64>,
    pub status: PositionStatus,
}

/// Active position as listed for selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub position_id: i64,
    pub position_title: String,
    pub kenziffer: String,
    pub department: Option<String>,
    pub ba_name: Option<String>,
    /// Whether the listing user heads the committee (None for HR listings)
    pub is_head: Option<bool>,
    pub status: PositionStatus,
}

impl PositionSummary {
    /// Label used in selection menus
    pub fn label(&self) -> String {
        format!("{} (Kennziffer: {})", self.position_title, self.kenziffer)
    }
}

/// Active position with committee-wide progress counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionProgress {
    pub position_id: i64,
    pub position_title: String,
    pub kenziffer: String,
    pub department: Option<String>,
    pub status: PositionStatus,
    pub ba_id: Option<i64>,
    pub ba_name: Option<String>,
    pub total_tasks: u64,
    pub completed_tasks: u64,
}

/// Position counts across created, in-progress and completed positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStatistics {
    pub total_positions: u64,
    pub assigned_positions: u64,
    pub unassigned_positions: u64,
    pub completed_positions: u64,
    /// Mean committee progress of the active positions, 0.0 when there are none
    pub average_progress: f64,
}

/// Origin of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Bot,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl ToSql for SenderType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SenderType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            other => Err(FromSqlError::Other(
                format!("unknown sender type '{}'", other).into(),
            )),
        }
    }
}

/// A persisted chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_type: SenderType,
    pub message_text: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a read-only ad-hoc query, rendered as text cells
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// More rows were available than returned
    pub truncated: bool,
}

impl QueryOutput {
    /// Render as a compact pipe-separated table
    pub fn to_text(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }
        let mut out = self.columns.join(" | ");
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.join(" | "));
        }
        if self.truncated {
            out.push_str("\n...");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_parse() {
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(" Not_Started ".parse::<TaskStatus>().unwrap(), TaskStatus::NotStarted);
        assert!("finished".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_status_display_matches_stored_value() {
        assert_eq!(TaskStatus::NotStarted.to_string(), "not_started");
        assert_eq!(TaskStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn test_position_status_active() {
        assert!(PositionStatus::Created.is_active());
        assert!(PositionStatus::InProgress.is_active());
        assert!(!PositionStatus::Completed.is_active());
        assert!(!PositionStatus::Cancelled.is_active());
    }

    #[test]
    fn test_query_output_text() {
        let output = QueryOutput {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string(), "x".to_string()]],
            truncated: true,
        };
        assert_eq!(output.to_text(), "a | b\n1 | x\n...");
        assert_eq!(QueryOutput::default().to_text(), "(no rows)");
    }

    #[test]
    fn test_position_label() {
        let summary = PositionSummary {
            position_id: 1,
            position_title: "W2 Professorship Robotics".to_string(),
            kenziffer: "W2-17".to_string(),
            department: None,
            ba_name: None,
            is_head: None,
            status: PositionStatus::Created,
        };
        assert_eq!(summary.label(), "W2 Professorship Robotics (Kennziffer: W2-17)");
    }
}
