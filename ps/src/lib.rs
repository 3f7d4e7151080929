//! ProcStore - SQLite persistence for hiring procedures
//!
//! Holds the externally authored procedure hierarchy
//! (procedure → phase → step → task), the job positions instantiated from it,
//! the committees owning those positions, and two kinds of task status:
//!
//! - **shared** (`ba_progress`): one row per task per position, seen by every
//!   committee member
//! - **personal** (`user_progress`): a per-user mirror kept for history
//!
//! # Example
//!
//! ```ignore
//! use procstore::{ProcStore, Scope, TaskStatus};
//!
//! let mut store = ProcStore::open("hireassist.db")?;
//! let rows = store.fetch_rows(position_id, Scope::Shared)?;
//! store.update_shared(position_id, task_id, TaskStatus::Completed, user_id, None)?;
//! ```

mod error;
mod import;
mod model;
pub mod schema;
mod store;

pub use error::{Result, StoreError};
pub use import::{CreatedPosition, NewPosition, PhaseDef, ProcedureDef, StepDef, TaskDef};
pub use model::{
    ChatMessage, JobPosition, PositionProgress, PositionStatistics, PositionStatus, PositionSummary, QueryOutput, Scope,
    SenderType, TaskRow, TaskStatus,
};
pub use store::ProcStore;

/// Default number of chat messages replayed from history
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
