//! Prompt Template System
//!
//! Prompts sent to the completion service are Handlebars templates.
//!
//! Template loading chain:
//! 1. `{prompts-dir}/{name}.pmt` (user override from config)
//! 2. Embedded fallback in code

pub mod embedded;
mod loader;

pub use loader::{PromptContext, PromptLoader};
