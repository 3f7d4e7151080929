//! HireAssist - hiring procedure assistant
//!
//! Tracks a committee's progress through an externally authored appointment
//! procedure (procedure → phase → step → task) and answers chat questions
//! about it.
//!
//! # Modules
//!
//! - [`progress`] - Turns flat task rows into the ordered checklist view
//! - [`intent`] - Keyword classification of chat messages
//! - [`respond`] - Reply text, with completion-backed help and document hints
//! - [`assistant`] - Facade composing state, aggregation and replies
//! - [`state`] - Actor owning the SQLite store
//! - [`llm`] - Completion client trait and OpenAI-compatible implementation
//! - [`prompts`] - Handlebars prompt templates
//! - [`repl`] - Interactive chat
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod assistant;
pub mod cli;
pub mod config;
pub mod intent;
pub mod llm;
pub mod progress;
pub mod prompts;
pub mod repl;
pub mod respond;
pub mod state;

pub use assistant::Assistant;
pub use config::Config;
pub use intent::{Intent, TaskFocus, classify};
pub use progress::{AggregatedProgress, aggregate};
pub use state::{StateError, StateManager};
