//! Intent routing for chat messages
//!
//! Classification is literal phrase membership over a lowercased message.
//! Detectors are independent and can overlap; the order of `DETECTORS`
//! decides which one wins.

mod phrases;

use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Which task a current-task question is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFocus {
    Current,
    Next,
}

/// What the user is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "intent", content = "focus")]
pub enum Intent {
    /// "what is my current task", "what's next"
    CurrentTask(TaskFocus),
    /// Explain or simplify the open task
    TaskHelp,
    /// Which documents the open task needs
    DocumentSuggestion,
    /// Progress summary
    StatusQuestion,
    /// Anything else; answered from the database
    General,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentTask(TaskFocus::Current) => write!(f, "current_task"),
            Self::CurrentTask(TaskFocus::Next) => write!(f, "next_task"),
            Self::TaskHelp => write!(f, "task_help"),
            Self::DocumentSuggestion => write!(f, "document_suggestion"),
            Self::StatusQuestion => write!(f, "status_question"),
            Self::General => write!(f, "general"),
        }
    }
}

type Detector = (fn(&str) -> bool, fn(&str) -> Intent);

/// Detectors in precedence order; the first match wins
const DETECTORS: &[Detector] = &[
    (is_current_task_question, current_task),
    (is_task_help_request, task_help),
    (is_document_request, document_suggestion),
    (is_status_question, status_question),
];

fn current_task(input: &str) -> Intent {
    Intent::CurrentTask(task_focus(input))
}

fn task_help(_: &str) -> Intent {
    Intent::TaskHelp
}

fn document_suggestion(_: &str) -> Intent {
    Intent::DocumentSuggestion
}

fn status_question(_: &str) -> Intent {
    Intent::StatusQuestion
}

/// Classify a chat message
pub fn classify(input: &str) -> Intent {
    let normalized = normalize(input);
    let intent = DETECTORS
        .iter()
        .find(|(matches, _)| matches(&normalized))
        .map(|(_, intent)| intent(&normalized))
        .unwrap_or(Intent::General);
    debug!(%intent, "classify: called");
    intent
}

/// Lowercase and replace typographic apostrophes
fn normalize(input: &str) -> String {
    input.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

fn contains_any(input: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| input.contains(phrase))
}

pub fn is_current_task_question(input: &str) -> bool {
    contains_any(&normalize(input), phrases::CURRENT_TASK)
}

pub fn is_task_help_request(input: &str) -> bool {
    contains_any(&normalize(input), phrases::TASK_HELP)
}

pub fn is_document_request(input: &str) -> bool {
    contains_any(&normalize(input), phrases::DOCUMENTS)
}

/// Deliberately broad: any status-related word triggers it
pub fn is_status_question(input: &str) -> bool {
    contains_any(&normalize(input), phrases::STATUS)
}

/// Next when the message mentions "next" or "after"
pub fn task_focus(input: &str) -> TaskFocus {
    let input = normalize(input);
    if input.contains("next") || input.contains("after") {
        TaskFocus::Next
    } else {
        TaskFocus::Current
    }
}
