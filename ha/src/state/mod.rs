//! State management with actor pattern
//!
//! StateManager owns the ProcStore connection and processes messages via
//! channels, so every caller shares one serialised view of the database.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
