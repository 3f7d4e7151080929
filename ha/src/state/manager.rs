//! StateManager - actor that owns the ProcStore
//!
//! Processes commands via channels for thread-safe access to the database.
//! Each command is applied to fresh data; nothing is cached between commands.

use std::path::Path;

use procstore::{
    ChatMessage, CreatedPosition, JobPosition, NewPosition, PositionProgress, PositionStatistics, PositionStatus,
    PositionSummary, ProcStore, ProcedureDef, QueryOutput, Scope, SenderType, TaskRow, TaskStatus,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::messages::{StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Open the database at `store_path` and spawn the actor
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = ProcStore::open(store_path.as_ref())?;
        Ok(Self::spawn_with(store))
    }

    /// Spawn the actor around an already opened store
    pub fn spawn_with(store: ProcStore) -> Self {
        debug!("spawn_with: called");
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(actor_loop(store, rx));

        info!("StateManager spawned");
        Self { tx }
    }

    /// Send a command and wait for its reply
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === Checklist operations ===

    /// Flat task rows for a position in the given scope
    ///
    /// Shared reads initialize the committee rows first.
    pub async fn fetch_rows(&self, position_id: i64, scope: Scope) -> StateResponse<Vec<TaskRow>> {
        debug!(%position_id, %scope, "fetch_rows: called");
        self.request(|reply| StateCommand::FetchRows {
            position_id,
            scope,
            reply,
        })
        .await
    }

    pub async fn ensure_shared_initialized(&self, position_id: i64) -> StateResponse<bool> {
        debug!(%position_id, "ensure_shared_initialized: called");
        self.request(|reply| StateCommand::EnsureSharedInitialized { position_id, reply })
            .await
    }

    /// Update the shared record and the actor's personal record together
    pub async fn update_shared(
        &self,
        position_id: i64,
        task_id: i64,
        status: TaskStatus,
        acting_user_id: i64,
        notes: Option<String>,
    ) -> StateResponse<bool> {
        debug!(%position_id, %task_id, %status, %acting_user_id, "update_shared: called");
        self.request(|reply| StateCommand::UpdateShared {
            position_id,
            task_id,
            status,
            acting_user_id,
            notes,
            reply,
        })
        .await
    }

    pub async fn update_personal(
        &self,
        user_id: i64,
        position_id: i64,
        task_id: i64,
        status: TaskStatus,
        notes: Option<String>,
    ) -> StateResponse<bool> {
        debug!(%user_id, %position_id, %task_id, %status, "update_personal: called");
        self.request(|reply| StateCommand::UpdatePersonal {
            user_id,
            position_id,
            task_id,
            status,
            notes,
            reply,
        })
        .await
    }

    // === Position operations ===

    pub async fn get_position(&self, position_id: i64) -> StateResponse<Option<JobPosition>> {
        debug!(%position_id, "get_position: called");
        self.request(|reply| StateCommand::GetPosition { position_id, reply })
            .await
    }

    /// Get a position, returning error if not found
    pub async fn get_position_required(&self, position_id: i64) -> StateResponse<JobPosition> {
        debug!(%position_id, "get_position_required: called");
        self.get_position(position_id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("position {}", position_id)))
    }

    /// Active positions; `None` lists all of them (HR view)
    pub async fn active_positions(&self, user_id: Option<i64>) -> StateResponse<Vec<PositionSummary>> {
        debug!(?user_id, "active_positions: called");
        self.request(|reply| StateCommand::ActivePositions { user_id, reply })
            .await
    }

    pub async fn position_overview(&self) -> StateResponse<Vec<PositionProgress>> {
        debug!("position_overview: called");
        self.request(|reply| StateCommand::PositionOverview { reply }).await
    }

    pub async fn position_statistics(&self) -> StateResponse<PositionStatistics> {
        debug!("position_statistics: called");
        self.request(|reply| StateCommand::PositionStatistics { reply }).await
    }

    pub async fn set_position_status(&self, position_id: i64, status: PositionStatus) -> StateResponse<()> {
        debug!(%position_id, %status, "set_position_status: called");
        self.request(|reply| StateCommand::SetPositionStatus {
            position_id,
            status,
            reply,
        })
        .await
    }

    // === Seeding operations ===

    pub async fn import_procedure(&self, def: ProcedureDef) -> StateResponse<i64> {
        debug!(title = %def.title, "import_procedure: called");
        self.request(|reply| StateCommand::ImportProcedure {
            def: Box::new(def),
            reply,
        })
        .await
    }

    pub async fn add_user(&self, username: &str, email: Option<&str>, user_type: &str) -> StateResponse<i64> {
        debug!(%username, %user_type, "add_user: called");
        self.request(|reply| StateCommand::AddUser {
            username: username.to_string(),
            email: email.map(str::to_string),
            user_type: user_type.to_string(),
            reply,
        })
        .await
    }

    pub async fn find_user(&self, username: &str) -> StateResponse<Option<i64>> {
        debug!(%username, "find_user: called");
        self.request(|reply| StateCommand::FindUser {
            username: username.to_string(),
            reply,
        })
        .await
    }

    pub async fn create_position(&self, new: NewPosition) -> StateResponse<CreatedPosition> {
        debug!(kenziffer = %new.kenziffer, "create_position: called");
        self.request(|reply| StateCommand::CreatePosition {
            new: Box::new(new),
            reply,
        })
        .await
    }

    // === Chat log operations ===

    pub async fn create_chat_session(&self, user_id: i64, position_id: i64) -> StateResponse<i64> {
        debug!(%user_id, %position_id, "create_chat_session: called");
        self.request(|reply| StateCommand::CreateChatSession {
            user_id,
            position_id,
            reply,
        })
        .await
    }

    pub async fn save_chat_message(&self, session_id: i64, sender: SenderType, text: &str) -> StateResponse<()> {
        debug!(%session_id, sender = %sender.as_str(), "save_chat_message: called");
        self.request(|reply| StateCommand::SaveChatMessage {
            session_id,
            sender,
            text: text.to_string(),
            reply,
        })
        .await
    }

    /// Most recent messages, newest first
    pub async fn chat_history(&self, user_id: i64, position_id: i64, limit: usize) -> StateResponse<Vec<ChatMessage>> {
        debug!(%user_id, %position_id, %limit, "chat_history: called");
        self.request(|reply| StateCommand::ChatHistory {
            user_id,
            position_id,
            limit,
            reply,
        })
        .await
    }

    // === Ad-hoc query operations ===

    pub async fn schema_info(&self, objects: &[&str]) -> StateResponse<String> {
        debug!(?objects, "schema_info: called");
        self.request(|reply| StateCommand::SchemaInfo {
            objects: objects.iter().map(|o| o.to_string()).collect(),
            reply,
        })
        .await
    }

    pub async fn run_readonly_query(&self, sql: &str, max_rows: usize) -> StateResponse<QueryOutput> {
        debug!(sql_len = sql.len(), %max_rows, "run_readonly_query: called");
        self.request(|reply| StateCommand::RunReadonlyQuery {
            sql: sql.to_string(),
            max_rows,
            reply,
        })
        .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

/// The actor loop that processes commands
async fn actor_loop(mut store: ProcStore, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::FetchRows {
                position_id,
                scope,
                reply,
            } => {
                debug!(%position_id, %scope, "actor_loop: FetchRows command");
                let _ = reply.send(store.fetch_rows(position_id, scope).map_err(StateError::from));
            }

            StateCommand::EnsureSharedInitialized { position_id, reply } => {
                debug!(%position_id, "actor_loop: EnsureSharedInitialized command");
                let _ = reply.send(store.ensure_shared_initialized(position_id).map_err(StateError::from));
            }

            StateCommand::UpdateShared {
                position_id,
                task_id,
                status,
                acting_user_id,
                notes,
                reply,
            } => {
                debug!(%position_id, %task_id, "actor_loop: UpdateShared command");
                let result = store
                    .update_shared(position_id, task_id, status, acting_user_id, notes.as_deref())
                    .map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::UpdatePersonal {
                user_id,
                position_id,
                task_id,
                status,
                notes,
                reply,
            } => {
                debug!(%user_id, %position_id, %task_id, "actor_loop: UpdatePersonal command");
                let result = store
                    .update_personal(user_id, position_id, task_id, status, notes.as_deref())
                    .map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::GetPosition { position_id, reply } => {
                debug!(%position_id, "actor_loop: GetPosition command");
                let _ = reply.send(store.position(position_id).map_err(StateError::from));
            }

            StateCommand::ActivePositions { user_id, reply } => {
                debug!(?user_id, "actor_loop: ActivePositions command");
                let _ = reply.send(store.active_positions(user_id).map_err(StateError::from));
            }

            StateCommand::PositionOverview { reply } => {
                debug!("actor_loop: PositionOverview command");
                let _ = reply.send(store.position_overview().map_err(StateError::from));
            }

            StateCommand::PositionStatistics { reply } => {
                debug!("actor_loop: PositionStatistics command");
                let _ = reply.send(store.position_statistics().map_err(StateError::from));
            }

            StateCommand::SetPositionStatus {
                position_id,
                status,
                reply,
            } => {
                debug!(%position_id, %status, "actor_loop: SetPositionStatus command");
                let _ = reply.send(store.set_position_status(position_id, status).map_err(StateError::from));
            }

            StateCommand::ImportProcedure { def, reply } => {
                debug!(title = %def.title, "actor_loop: ImportProcedure command");
                let _ = reply.send(store.import_procedure(&def).map_err(StateError::from));
            }

            StateCommand::AddUser {
                username,
                email,
                user_type,
                reply,
            } => {
                debug!(%username, "actor_loop: AddUser command");
                let result = store
                    .add_user(&username, email.as_deref(), &user_type)
                    .map_err(StateError::from);
                let _ = reply.send(result);
            }

            StateCommand::FindUser { username, reply } => {
                debug!(%username, "actor_loop: FindUser command");
                let _ = reply.send(store.user_id(&username).map_err(StateError::from));
            }

            StateCommand::CreatePosition { new, reply } => {
                debug!(kenziffer = %new.kenziffer, "actor_loop: CreatePosition command");
                let _ = reply.send(store.create_position(&new).map_err(StateError::from));
            }

            StateCommand::CreateChatSession {
                user_id,
                position_id,
                reply,
            } => {
                debug!(%user_id, %position_id, "actor_loop: CreateChatSession command");
                let _ = reply.send(store.create_chat_session(user_id, position_id).map_err(StateError::from));
            }

            StateCommand::SaveChatMessage {
                session_id,
                sender,
                text,
                reply,
            } => {
                debug!(%session_id, "actor_loop: SaveChatMessage command");
                let _ = reply.send(store.save_chat_message(session_id, sender, &text).map_err(StateError::from));
            }

            StateCommand::ChatHistory {
                user_id,
                position_id,
                limit,
                reply,
            } => {
                debug!(%user_id, %position_id, "actor_loop: ChatHistory command");
                let _ = reply.send(store.chat_history(user_id, position_id, limit).map_err(StateError::from));
            }

            StateCommand::SchemaInfo { objects, reply } => {
                debug!(?objects, "actor_loop: SchemaInfo command");
                let names: Vec<&str> = objects.iter().map(String::as_str).collect();
                let _ = reply.send(store.schema_info(&names).map_err(StateError::from));
            }

            StateCommand::RunReadonlyQuery { sql, max_rows, reply } => {
                debug!(%max_rows, "actor_loop: RunReadonlyQuery command");
                let _ = reply.send(store.run_readonly_query(&sql, max_rows).map_err(StateError::from));
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use procstore::{PhaseDef, StepDef, TaskDef};
    use tempfile::tempdir;

    fn procedure() -> ProcedureDef {
        let task = |description: &str, order| TaskDef {
            description: description.to_string(),
            order,
            required_documents: None,
            link: None,
        };
        ProcedureDef {
            title: "Appointment Procedure".to_string(),
            basis: None,
            phases: vec![PhaseDef {
                title: "Preparation".to_string(),
                order: 1,
                link: None,
                steps: vec![StepDef {
                    title: "Release".to_string(),
                    order: 1,
                    link: None,
                    responsible_role: None,
                    tasks: vec![task("Request release", 1), task("Confirm budget", 2)],
                }],
            }],
        }
    }

    async fn seeded(manager: &StateManager) -> (i64, i64) {
        let procedure_id = manager.import_procedure(procedure()).await.unwrap();
        let alice = manager.add_user("alice", None, "User").await.unwrap();
        let created = manager
            .create_position(NewPosition {
                position_title: "Professorship Robotics".to_string(),
                department: None,
                kenziffer: "W2-001".to_string(),
                procedure_id,
                created_by: None,
                ba_name: "Committee Robotics".to_string(),
                member_ids: vec![alice],
                head_id: Some(alice),
            })
            .await
            .unwrap();
        (created.position_id, alice)
    }

    #[tokio::test]
    async fn test_state_manager_shared_checklist() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path().join("state.db")).unwrap();
        let (position_id, alice) = seeded(&manager).await;

        let rows = manager.fetch_rows(position_id, Scope::Shared).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.task_status == TaskStatus::NotStarted));

        let task_id = rows[0].task_id;
        assert!(
            manager
                .update_shared(position_id, task_id, TaskStatus::Completed, alice, None)
                .await
                .unwrap()
        );

        let rows = manager.fetch_rows(position_id, Scope::Shared).await.unwrap();
        let row = rows.iter().find(|r| r.task_id == task_id).unwrap();
        assert_eq!(row.task_status, TaskStatus::Completed);
        assert_eq!(row.completed_by, Some(alice));

        let personal = manager
            .fetch_rows(position_id, Scope::Personal { user_id: alice })
            .await
            .unwrap();
        assert_eq!(
            personal.iter().find(|r| r.task_id == task_id).unwrap().task_status,
            TaskStatus::Completed
        );

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_manager_get_nonexistent() {
        let manager = StateManager::spawn_with(ProcStore::in_memory().unwrap());

        assert!(manager.get_position(42).await.unwrap().is_none());
        let err = manager.get_position_required(42).await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
        assert!(manager.fetch_rows(42, Scope::Shared).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_manager_chat_log() {
        let manager = StateManager::spawn_with(ProcStore::in_memory().unwrap());
        let (position_id, alice) = seeded(&manager).await;

        let session = manager.create_chat_session(alice, position_id).await.unwrap();
        manager
            .save_chat_message(session, SenderType::User, "what's next?")
            .await
            .unwrap();
        manager
            .save_chat_message(session, SenderType::Bot, "Request release")
            .await
            .unwrap();

        let history = manager.chat_history(alice, position_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sender_type, SenderType::Bot);
    }

    #[tokio::test]
    async fn test_state_manager_position_statistics() {
        let manager = StateManager::spawn_with(ProcStore::in_memory().unwrap());
        let (position_id, alice) = seeded(&manager).await;
        let rows = manager.fetch_rows(position_id, Scope::Shared).await.unwrap();
        manager
            .update_shared(position_id, rows[0].task_id, TaskStatus::Completed, alice, None)
            .await
            .unwrap();

        let stats = manager.position_statistics().await.unwrap();
        assert_eq!(stats.total_positions, 1);
        assert_eq!(stats.assigned_positions, 1);
        assert_eq!(stats.unassigned_positions, 0);
        assert_eq!(stats.average_progress, 50.0);
    }

    #[tokio::test]
    async fn test_state_manager_find_user() {
        let manager = StateManager::spawn_with(ProcStore::in_memory().unwrap());
        let bob = manager.add_user("bob", Some("bob@example.org"), "HR").await.unwrap();
        assert_eq!(manager.find_user("bob").await.unwrap(), Some(bob));
        assert_eq!(manager.find_user("carol").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_state_manager_after_shutdown() {
        let manager = StateManager::spawn_with(ProcStore::in_memory().unwrap());
        manager.shutdown().await.unwrap();
        // Give the actor a chance to exit
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let err = manager.get_position(1).await.unwrap_err();
        assert!(matches!(err, StateError::ChannelError));
    }
}
