//! Integration tests for HireAssist
//!
//! These tests drive the assistant facade against an on-disk store, with a
//! scripted completion client standing in for the language model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hireassist::assistant::Assistant;
use hireassist::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use hireassist::prompts::PromptLoader;
use hireassist::respond::{APOLOGY, Completer, NO_DATA};
use hireassist::state::StateManager;
use procstore::{NewPosition, PositionStatus, ProcedureDef, Scope, SenderType, TaskStatus};
use tempfile::TempDir;

const PROCEDURE: &str = r#"
title: W2/W3 Appointment Procedure
basis: Higher Education Act, section 48
phases:
  - title: Preparation
    order: 1
    steps:
      - title: Release of the position
        order: 1
        responsible: HR
        tasks:
          - description: Request release from the dean's office
            order: 1
            required_documents: Release request form
          - description: Confirm budget line
            order: 2
  - title: Advertisement
    order: 2
    steps:
      - title: Publish advertisement
        order: 1
        tasks:
          - description: Publish on the university job portal
            order: 1
"#;

/// Completion client replaying scripted replies and recording requests
#[derive(Default)]
struct ScriptedLlm {
    replies: Mutex<VecDeque<Option<String>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    fn replying(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| Some(r.to_string())).collect()),
            seen: Mutex::default(),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([None, None, None])),
            seen: Mutex::default(),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.seen.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Some(text)) => Ok(CompletionResponse::text(text)),
            _ => Err(LlmError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            }),
        }
    }
}

struct Fixture {
    _dir: TempDir,
    state: StateManager,
    position_id: i64,
    alice: i64,
    bob: i64,
}

async fn seeded() -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let state = StateManager::spawn(dir.path().join("hireassist.db")).expect("Failed to spawn StateManager");

    let def = ProcedureDef::from_yaml_str(PROCEDURE).unwrap();
    let procedure_id = state.import_procedure(def).await.unwrap();
    let alice = state.add_user("alice", Some("alice@example.org"), "User").await.unwrap();
    let bob = state.add_user("bob", None, "User").await.unwrap();
    let created = state
        .create_position(NewPosition {
            position_title: "Professorship Robotics".to_string(),
            department: Some("Engineering".to_string()),
            kenziffer: "W2-001".to_string(),
            procedure_id,
            created_by: None,
            ba_name: "Committee Robotics".to_string(),
            member_ids: vec![alice, bob],
            head_id: Some(alice),
        })
        .await
        .unwrap();

    Fixture {
        _dir: dir,
        state,
        position_id: created.position_id,
        alice,
        bob,
    }
}

fn assistant_with(state: &StateManager, llm: Arc<ScriptedLlm>) -> Assistant {
    Assistant::new(state.clone(), Completer::new(llm, PromptLoader::embedded_only(), 256))
}

/// Task id for a description in the shared view
async fn task_id(assistant: &Assistant, position_id: i64, description: &str) -> i64 {
    let agg = assistant
        .get_aggregated_progress(position_id, Scope::Shared)
        .await
        .expect("position should have progress");
    agg.all_steps
        .iter()
        .flat_map(|step| step.tasks.iter())
        .find(|task| task.task_description == description)
        .map(|task| task.task_id)
        .expect("task should exist")
}

// =============================================================================
// Checklist Tests
// =============================================================================

#[tokio::test]
async fn test_new_position_starts_at_first_step() {
    let fx = seeded().await;
    let assistant = assistant_with(&fx.state, ScriptedLlm::replying(&[]));

    let agg = assistant
        .get_aggregated_progress(fx.position_id, Scope::Shared)
        .await
        .unwrap();

    assert_eq!(agg.progress.total_tasks, 3);
    assert_eq!(agg.progress.completed_tasks, 0);
    assert_eq!(agg.current_step().unwrap().step_title, "Release of the position");
    assert_eq!(agg.phases.len(), 2);
}

#[tokio::test]
async fn test_concurrent_toggles_from_two_members() {
    let fx = seeded().await;
    let assistant = assistant_with(&fx.state, ScriptedLlm::replying(&[]));
    let release = task_id(&assistant, fx.position_id, "Request release from the dean's office").await;
    let budget = task_id(&assistant, fx.position_id, "Confirm budget line").await;

    let (a, b) = tokio::join!(
        assistant.update_task_status(fx.position_id, release, TaskStatus::Completed, fx.alice, None, Scope::Shared),
        assistant.update_task_status(fx.position_id, budget, TaskStatus::Completed, fx.bob, None, Scope::Shared),
    );
    assert!(a && b);

    let agg = assistant
        .get_aggregated_progress(fx.position_id, Scope::Shared)
        .await
        .unwrap();
    assert_eq!(agg.progress.completed_tasks, 2);
    assert_eq!(agg.current_step().unwrap().step_title, "Publish advertisement");
    assert_eq!(agg.task(release).unwrap().completed_by, Some(fx.alice));
    assert_eq!(agg.task(budget).unwrap().completed_by, Some(fx.bob));
}

#[tokio::test]
async fn test_shared_toggle_mirrors_into_actor_record_only() {
    let fx = seeded().await;
    let assistant = assistant_with(&fx.state, ScriptedLlm::replying(&[]));
    let release = task_id(&assistant, fx.position_id, "Request release from the dean's office").await;

    assert!(
        assistant
            .update_task_status(fx.position_id, release, TaskStatus::Completed, fx.alice, None, Scope::Shared)
            .await
    );

    let alice_view = assistant
        .get_aggregated_progress(fx.position_id, Scope::Personal { user_id: fx.alice })
        .await
        .unwrap();
    let bob_view = assistant
        .get_aggregated_progress(fx.position_id, Scope::Personal { user_id: fx.bob })
        .await
        .unwrap();
    assert_eq!(alice_view.progress.completed_tasks, 1);
    assert_eq!(bob_view.progress.completed_tasks, 0);
}

#[tokio::test]
async fn test_undo_clears_completion_fields() {
    let fx = seeded().await;
    let assistant = assistant_with(&fx.state, ScriptedLlm::replying(&[]));
    let release = task_id(&assistant, fx.position_id, "Request release from the dean's office").await;

    assert!(
        assistant
            .update_task_status(
                fx.position_id,
                release,
                TaskStatus::Completed,
                fx.alice,
                Some("sent by mail".to_string()),
                Scope::Shared
            )
            .await
    );
    assert!(
        assistant
            .update_task_status(fx.position_id, release, TaskStatus::NotStarted, fx.bob, None, Scope::Shared)
            .await
    );

    let agg = assistant
        .get_aggregated_progress(fx.position_id, Scope::Shared)
        .await
        .unwrap();
    let task = agg.task(release).unwrap();
    assert_eq!(task.task_status, TaskStatus::NotStarted);
    assert!(task.completed_at.is_none());
    assert!(task.completed_by.is_none());
    assert_eq!(task.notes.as_deref(), Some("sent by mail"));
}

#[tokio::test]
async fn test_task_outside_procedure_is_rejected() {
    let fx = seeded().await;
    let assistant = assistant_with(&fx.state, ScriptedLlm::replying(&[]));

    assert!(
        !assistant
            .update_task_status(fx.position_id, 9999, TaskStatus::Completed, fx.alice, None, Scope::Shared)
            .await
    );
    assert!(
        !assistant
            .update_task_status(4242, 1, TaskStatus::Completed, fx.alice, None, Scope::Shared)
            .await
    );
}

#[tokio::test]
async fn test_unknown_position_yields_no_data() {
    let fx = seeded().await;
    let assistant = assistant_with(&fx.state, ScriptedLlm::replying(&[]));

    let agg = assistant.get_aggregated_progress(4242, Scope::Shared).await;
    assert!(agg.is_none());
    assert_eq!(assistant.classify_and_respond("what is my current task?", None).await, NO_DATA);
}

// =============================================================================
// Chat Tests
// =============================================================================

#[tokio::test]
async fn test_current_task_answered_without_completion() {
    let fx = seeded().await;
    let llm = ScriptedLlm::replying(&[]);
    let assistant = assistant_with(&fx.state, llm.clone());
    let agg = assistant.get_aggregated_progress(fx.position_id, Scope::Shared).await;

    let reply = assistant
        .classify_and_respond("What is my current task?", agg.as_ref())
        .await;
    assert!(reply.contains("Request release from the dean's office"));

    let status = assistant.classify_and_respond("How is our progress?", agg.as_ref()).await;
    assert!(status.contains("Overall: 0/3 tasks (0.0%)"));
    assert!(llm.requests().is_empty());
}

#[tokio::test]
async fn test_task_help_uses_completion() {
    let fx = seeded().await;
    let llm = ScriptedLlm::replying(&["Ask the dean's office for the release form first."]);
    let assistant = assistant_with(&fx.state, llm.clone());
    let agg = assistant.get_aggregated_progress(fx.position_id, Scope::Shared).await;

    let reply = assistant
        .classify_and_respond("Can you help me understand this?", agg.as_ref())
        .await;
    assert_eq!(reply, "Ask the dean's office for the release form first.");

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(
        requests[0]
            .messages
            .iter()
            .any(|m| m.content.contains("Request release from the dean's office"))
    );
}

#[tokio::test]
async fn test_completion_failure_becomes_apology() {
    let fx = seeded().await;
    let assistant = assistant_with(&fx.state, ScriptedLlm::failing());
    let agg = assistant.get_aggregated_progress(fx.position_id, Scope::Shared).await;

    let reply = assistant
        .classify_and_respond("Which documents do I need?", agg.as_ref())
        .await;
    assert_eq!(reply, APOLOGY);
}

#[tokio::test]
async fn test_general_question_runs_sql_chain() {
    let fx = seeded().await;
    let llm = ScriptedLlm::replying(&[
        "```sql\nSELECT position_title, kenziffer FROM job_positions\n```",
        "There is one open position: Professorship Robotics.",
    ]);
    let assistant = assistant_with(&fx.state, llm.clone());

    let reply = assistant
        .classify_and_respond("Which professorships are advertised in Engineering?", None)
        .await;
    assert_eq!(reply, "There is one open position: Professorship Robotics.");

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].stop, vec!["\nSQL Result:".to_string()]);
    assert!(requests[1].messages.iter().any(|m| m.content.contains("W2-001")));
}

// =============================================================================
// Position and Chat Log Tests
// =============================================================================

#[tokio::test]
async fn test_active_positions_follow_status() {
    let fx = seeded().await;

    let for_alice = fx.state.active_positions(Some(fx.alice)).await.unwrap();
    assert_eq!(for_alice.len(), 1);
    assert_eq!(for_alice[0].is_head, Some(true));
    let for_bob = fx.state.active_positions(Some(fx.bob)).await.unwrap();
    assert_eq!(for_bob[0].is_head, Some(false));

    fx.state
        .set_position_status(fx.position_id, PositionStatus::Cancelled)
        .await
        .unwrap();
    assert!(fx.state.active_positions(None).await.unwrap().is_empty());
    assert!(fx.state.position_overview().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_history_newest_first() {
    let fx = seeded().await;

    let session = fx.state.create_chat_session(fx.alice, fx.position_id).await.unwrap();
    fx.state
        .save_chat_message(session, SenderType::User, "what's next?")
        .await
        .unwrap();
    fx.state
        .save_chat_message(session, SenderType::Bot, "Publish the advertisement.")
        .await
        .unwrap();

    let history = fx.state.chat_history(fx.alice, fx.position_id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender_type, SenderType::Bot);
    assert_eq!(history[1].message_text, "what's next?");

    assert!(fx.state.chat_history(fx.bob, fx.position_id, 10).await.unwrap().is_empty());
}
