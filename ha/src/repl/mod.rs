//! Interactive chat for one committee member and one position
//!
//! Every exchange is written to the chat log, and the most recent messages
//! are replayed when a session starts.

mod command;
mod session;

pub use command::SlashCommand;
pub use session::ChatSession;
