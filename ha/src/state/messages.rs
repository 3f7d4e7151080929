//! State manager messages
//!
//! Commands and responses for the actor pattern.

use procstore::{
    ChatMessage, CreatedPosition, JobPosition, NewPosition, PositionProgress, PositionStatistics, PositionStatus,
    PositionSummary, ProcedureDef, QueryOutput, Scope, SenderType, StoreError, TaskRow, TaskStatus,
};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => StateError::NotFound(what),
            other => StateError::StoreError(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Checklist operations
    FetchRows {
        position_id: i64,
        scope: Scope,
        reply: oneshot::Sender<StateResponse<Vec<TaskRow>>>,
    },
    EnsureSharedInitialized {
        position_id: i64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    UpdateShared {
        position_id: i64,
        task_id: i64,
        status: TaskStatus,
        acting_user_id: i64,
        notes: Option<String>,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    UpdatePersonal {
        user_id: i64,
        position_id: i64,
        task_id: i64,
        status: TaskStatus,
        notes: Option<String>,
        reply: oneshot::Sender<StateResponse<bool>>,
    },

    // Position operations
    GetPosition {
        position_id: i64,
        reply: oneshot::Sender<StateResponse<Option<JobPosition>>>,
    },
    ActivePositions {
        user_id: Option<i64>,
        reply: oneshot::Sender<StateResponse<Vec<PositionSummary>>>,
    },
    PositionOverview {
        reply: oneshot::Sender<StateResponse<Vec<PositionProgress>>>,
    },
    PositionStatistics {
        reply: oneshot::Sender<StateResponse<PositionStatistics>>,
    },
    SetPositionStatus {
        position_id: i64,
        status: PositionStatus,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Seeding operations
    ImportProcedure {
        def: Box<ProcedureDef>,
        reply: oneshot::Sender<StateResponse<i64>>,
    },
    AddUser {
        username: String,
        email: Option<String>,
        user_type: String,
        reply: oneshot::Sender<StateResponse<i64>>,
    },
    FindUser {
        username: String,
        reply: oneshot::Sender<StateResponse<Option<i64>>>,
    },
    CreatePosition {
        new: Box<NewPosition>,
        reply: oneshot::Sender<StateResponse<CreatedPosition>>,
    },

    // Chat log operations
    CreateChatSession {
        user_id: i64,
        position_id: i64,
        reply: oneshot::Sender<StateResponse<i64>>,
    },
    SaveChatMessage {
        session_id: i64,
        sender: SenderType,
        text: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ChatHistory {
        user_id: i64,
        position_id: i64,
        limit: usize,
        reply: oneshot::Sender<StateResponse<Vec<ChatMessage>>>,
    },

    // Ad-hoc query operations
    SchemaInfo {
        objects: Vec<String>,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    RunReadonlyQuery {
        sql: String,
        max_rows: usize,
        reply: oneshot::Sender<StateResponse<QueryOutput>>,
    },

    // Shutdown
    Shutdown,
}
