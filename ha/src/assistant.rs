//! Assistant facade
//!
//! Composes the state actor, the aggregator, intent routing and the reply
//! generators. Nothing below this boundary leaks a low-level error to the
//! user: persistence failures become `None`/`false`, completion failures
//! become an apology.

use std::fmt;

use procstore::{PositionProgress, Scope, TaskStatus, schema::QUERYABLE_OBJECTS};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::intent::{self, Intent};
use crate::progress::{AggregatedProgress, aggregate};
use crate::prompts::PromptContext;
use crate::respond::{self, APOLOGY, Completer, ResponseKind};
use crate::state::StateManager;

/// Rows returned to the answer prompt at most
pub const MAX_QUERY_ROWS: usize = 50;

/// Stop sequence for the SQL-writing call
const SQL_STOP: &str = "\nSQL Result:";

/// Where a position stands in its procedure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PositionStage {
    /// No committee works on the position
    Unassigned,
    NotStarted,
    InStep { phase_title: String, step_title: String },
    Completed,
}

impl fmt::Display for PositionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => write!(f, "No committee assigned"),
            Self::NotStarted => write!(f, "Not started"),
            Self::InStep {
                phase_title,
                step_title,
            } => write!(f, "{} / {}", phase_title, step_title),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

pub struct Assistant {
    state: StateManager,
    completer: Completer,
}

impl Assistant {
    pub fn new(state: StateManager, completer: Completer) -> Self {
        Self { state, completer }
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Aggregated view of a position, or None when there is nothing to show
    pub async fn get_aggregated_progress(&self, position_id: i64, scope: Scope) -> Option<AggregatedProgress> {
        debug!(%position_id, %scope, "get_aggregated_progress: called");
        match self.state.fetch_rows(position_id, scope).await {
            Ok(rows) => aggregate(&rows),
            Err(e) => {
                warn!(%position_id, %scope, error = %e, "get_aggregated_progress: failed to fetch rows");
                None
            }
        }
    }

    /// Current phase and step of a position from the committee record
    pub async fn position_stage(&self, position: &PositionProgress) -> PositionStage {
        debug!(position_id = %position.position_id, "position_stage: called");
        if position.ba_id.is_none() {
            return PositionStage::Unassigned;
        }
        let Some(agg) = self.get_aggregated_progress(position.position_id, Scope::Shared).await else {
            return PositionStage::NotStarted;
        };
        if agg.is_complete() {
            return PositionStage::Completed;
        }
        match agg.current_step() {
            Some(step) => PositionStage::InStep {
                phase_title: step.phase_title.clone(),
                step_title: step.step_title.clone(),
            },
            None => PositionStage::NotStarted,
        }
    }

    /// Change a task's status
    ///
    /// Shared scope updates the committee record and mirrors the change into
    /// the actor's personal record; personal scope only touches the personal
    /// record of the scoped user.
    pub async fn update_task_status(
        &self,
        position_id: i64,
        task_id: i64,
        status: TaskStatus,
        actor: i64,
        notes: Option<String>,
        scope: Scope,
    ) -> bool {
        debug!(%position_id, %task_id, %status, %actor, %scope, "update_task_status: called");
        let result = match scope {
            Scope::Shared => {
                self.state
                    .update_shared(position_id, task_id, status, actor, notes)
                    .await
            }
            Scope::Personal { user_id } => {
                self.state
                    .update_personal(user_id, position_id, task_id, status, notes)
                    .await
            }
        };

        match result {
            Ok(updated) => {
                if !updated {
                    debug!(%position_id, %task_id, "update_task_status: nothing updated");
                }
                updated
            }
            Err(e) => {
                warn!(%position_id, %task_id, error = %e, "update_task_status: failed");
                false
            }
        }
    }

    /// Classify a chat message and produce the reply text
    pub async fn classify_and_respond(&self, input: &str, aggregated: Option<&AggregatedProgress>) -> String {
        let intent = intent::classify(input);
        debug!(%intent, "classify_and_respond: called");

        match ResponseKind::for_intent(intent) {
            Some(kind) => respond::generate(aggregated, kind, input, &self.completer).await,
            None => {
                debug_assert_eq!(intent, Intent::General);
                self.answer_general(input).await
            }
        }
    }

    /// Answer a free-form question from the database
    ///
    /// Writes SQL with one completion, runs it read-only, then phrases the
    /// result with a second completion.
    pub async fn answer_general(&self, question: &str) -> String {
        debug!("answer_general: called");
        let schema = match self.state.schema_info(QUERYABLE_OBJECTS).await {
            Ok(schema) => schema,
            Err(e) => {
                warn!(error = %e, "answer_general: failed to read schema");
                return APOLOGY.to_string();
            }
        };

        let mut context = PromptContext {
            schema: Some(schema),
            ..PromptContext::question(question)
        };

        let query = match self.completer.complete("sql-query", &context, &[SQL_STOP]).await {
            Ok(raw) => strip_sql_fences(&raw),
            Err(e) => {
                warn!(error = %e, "answer_general: failed to generate SQL");
                return APOLOGY.to_string();
            }
        };
        info!(%query, "Generated SQL for general question");

        let sql_response = match self.state.run_readonly_query(&query, MAX_QUERY_ROWS).await {
            Ok(output) => output.to_text(),
            Err(e) => {
                debug!(error = %e, "answer_general: query failed");
                format!("SQL Execution Failed:\nQuery: {}\nError: {}", query, e)
            }
        };

        context.query = Some(query);
        context.sql_response = Some(sql_response);

        match self.completer.complete("sql-answer", &context, &[]).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "answer_general: failed to phrase answer");
                APOLOGY.to_string()
            }
        }
    }
}

/// Remove markdown code fences and a leading `sql` language tag
pub fn strip_sql_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.strip_prefix("sql").or_else(|| rest.strip_prefix("SQL")).unwrap_or(rest);
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim().to_string()
}
