//! Slash command parsing

/// Commands available inside the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Quit,
    Status,
    Checklist,
    History,
    /// Mark a task completed
    Done(i64),
    /// Reopen a completed task
    Undo(i64),
    /// Known command with a missing or malformed argument
    Usage(&'static str),
    Unknown(String),
}

impl SlashCommand {
    /// Parse a line starting with `/`
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next();

        match cmd {
            "/help" | "/h" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            "/status" | "/s" => Self::Status,
            "/checklist" | "/c" => Self::Checklist,
            "/history" => Self::History,
            "/done" => match arg.and_then(|a| a.trim_start_matches('#').parse().ok()) {
                Some(task_id) => Self::Done(task_id),
                None => Self::Usage("/done <task-id>"),
            },
            "/undo" => match arg.and_then(|a| a.trim_start_matches('#').parse().ok()) {
                Some(task_id) => Self::Undo(task_id),
                None => Self::Usage("/undo <task-id>"),
            },
            other => Self::Unknown(other.to_string()),
        }
    }
}
