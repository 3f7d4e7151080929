//! Reply text for chat messages
//!
//! Status, current-task and next-task replies are rendered from the
//! aggregated view alone. Task help and document suggestions go through the
//! completion service; any failure there becomes a fixed apology.

mod completer;
mod text;

pub use completer::Completer;
pub use text::{checklist, current_task, next_task, status};

use tracing::{debug, warn};

use crate::intent::{Intent, TaskFocus};
use crate::progress::{AggregatedProgress, StepView};
use crate::prompts::PromptContext;

/// Reply when a position has no rows or no current step
pub const NO_DATA: &str = "I couldn't find any procedure data for this job position.";

/// Reply when help is requested but nothing is left open
pub const ALL_DONE: &str = "All tasks of this procedure are completed. There is nothing left to work on.";

/// Reply when the completion service fails
pub const APOLOGY: &str = "Sorry, I ran into an error while preparing an answer. Please try again in a moment.";

/// Replies that can be produced from the aggregated view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Status,
    CurrentTask,
    NextTask,
    TaskHelp,
    DocumentSuggestion,
}

impl ResponseKind {
    /// The reply kind for an intent; None for general questions
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::CurrentTask(TaskFocus::Current) => Some(Self::CurrentTask),
            Intent::CurrentTask(TaskFocus::Next) => Some(Self::NextTask),
            Intent::TaskHelp => Some(Self::TaskHelp),
            Intent::DocumentSuggestion => Some(Self::DocumentSuggestion),
            Intent::StatusQuestion => Some(Self::Status),
            Intent::General => None,
        }
    }
}

/// Render the reply of the given kind
pub async fn generate(
    aggregated: Option<&AggregatedProgress>,
    kind: ResponseKind,
    input: &str,
    completer: &Completer,
) -> String {
    debug!(?kind, "generate: called");
    match kind {
        ResponseKind::Status => status(aggregated),
        ResponseKind::CurrentTask => current_task(aggregated),
        ResponseKind::NextTask => next_task(aggregated),
        ResponseKind::TaskHelp => task_help(aggregated, input, completer).await,
        ResponseKind::DocumentSuggestion => document_suggestion(aggregated, input, completer).await,
    }
}

/// Explain the first open task through the completion service
pub async fn task_help(aggregated: Option<&AggregatedProgress>, input: &str, completer: &Completer) -> String {
    debug!("task_help: called");
    ask_about_open_task(aggregated, input, completer, "task-help").await
}

/// Suggest documents for the first open task through the completion service
pub async fn document_suggestion(
    aggregated: Option<&AggregatedProgress>,
    input: &str,
    completer: &Completer,
) -> String {
    debug!("document_suggestion: called");
    ask_about_open_task(aggregated, input, completer, "document-suggestion").await
}

async fn ask_about_open_task(
    aggregated: Option<&AggregatedProgress>,
    input: &str,
    completer: &Completer,
    template: &str,
) -> String {
    let Some(agg) = aggregated else {
        return NO_DATA.to_string();
    };
    let Some(step) = agg.current_step() else {
        return NO_DATA.to_string();
    };
    let Some(task) = step.first_open_task() else {
        debug!(%template, "ask_about_open_task: nothing open, skipping completion");
        return ALL_DONE.to_string();
    };

    let context = PromptContext {
        question: input.to_string(),
        procedure_title: Some(agg.procedure_info.procedure_title.clone()),
        task_description: Some(task.task_description.clone()),
        required_documents: task.required_documents.clone(),
        ..step_context(step)
    };

    match completer.complete(template, &context, &[]).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(%template, error = %e, "ask_about_open_task: completion failed");
            APOLOGY.to_string()
        }
    }
}

fn step_context(step: &StepView) -> PromptContext {
    PromptContext {
        phase_title: Some(step.phase_title.clone()),
        step_title: Some(step.step_title.clone()),
        responsible_role: step.responsible_role.clone(),
        ..PromptContext::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::MockLlmClient;
    use crate::progress::aggregate;
    use crate::progress::tests_support::two_phase_rows;
    use crate::prompts::PromptLoader;
    use procstore::TaskStatus;
    use std::sync::Arc;

    fn completer(mock: Arc<MockLlmClient>) -> Completer {
        Completer::new(mock, PromptLoader::embedded_only(), 512)
    }

    #[tokio::test]
    async fn test_task_help_passes_reply_through() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(
            "  First, write to the dean.  ",
        )]));
        let agg = aggregate(&two_phase_rows()).unwrap();

        let reply = task_help(Some(&agg), "help me with this", &completer(mock.clone())).await;

        assert_eq!(reply, "First, write to the dean.");
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("Task 101"));
        assert!(prompt.contains("Step 10"));
        assert!(prompt.contains("help me with this"));
    }

    #[tokio::test]
    async fn test_task_help_all_done_skips_service() {
        let mock = Arc::new(MockLlmClient::failing());
        let rows: Vec<_> = two_phase_rows()
            .into_iter()
            .map(|mut r| {
                r.task_status = TaskStatus::Completed;
                r
            })
            .collect();
        let agg = aggregate(&rows).unwrap();

        let reply = task_help(Some(&agg), "explain", &completer(mock.clone())).await;

        assert_eq!(reply, ALL_DONE);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_task_help_failure_apologizes() {
        let mock = Arc::new(MockLlmClient::failing());
        let agg = aggregate(&two_phase_rows()).unwrap();

        let reply = task_help(Some(&agg), "explain", &completer(mock)).await;
        assert_eq!(reply, APOLOGY);
    }

    #[tokio::test]
    async fn test_document_suggestion_uses_required_documents() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("Bring the form.")]));
        let mut rows = two_phase_rows();
        rows[1].required_documents = Some("Release request form".to_string());
        let agg = aggregate(&rows).unwrap();

        let reply = document_suggestion(Some(&agg), "which documents", &completer(mock.clone())).await;

        assert_eq!(reply, "Bring the form.");
        assert!(mock.requests()[0].messages[0].content.contains("Release request form"));
    }

    #[tokio::test]
    async fn test_generate_without_data() {
        let mock = Arc::new(MockLlmClient::failing());
        let completer = completer(mock.clone());
        for kind in [
            ResponseKind::Status,
            ResponseKind::CurrentTask,
            ResponseKind::NextTask,
            ResponseKind::TaskHelp,
            ResponseKind::DocumentSuggestion,
        ] {
            assert_eq!(generate(None, kind, "hi", &completer).await, NO_DATA);
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_kind_for_intent() {
        assert_eq!(
            ResponseKind::for_intent(Intent::CurrentTask(TaskFocus::Next)),
            Some(ResponseKind::NextTask)
        );
        assert_eq!(ResponseKind::for_intent(Intent::StatusQuestion), Some(ResponseKind::Status));
        assert_eq!(ResponseKind::for_intent(Intent::General), None);
    }
}
