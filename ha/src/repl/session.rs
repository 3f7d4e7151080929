//! Chat session management

use colored::Colorize;
use eyre::Result;
use procstore::{JobPosition, Scope, SenderType, TaskStatus};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use super::SlashCommand;
use crate::assistant::Assistant;
use crate::config::AssistantConfig;
use crate::respond;

/// Interactive chat bound to one user and one position
pub struct ChatSession<'a> {
    assistant: &'a Assistant,
    user_id: i64,
    position: JobPosition,
    settings: AssistantConfig,
    /// None when the chat log could not be opened; the chat still works
    session_id: Option<i64>,
}

impl<'a> ChatSession<'a> {
    pub fn new(assistant: &'a Assistant, user_id: i64, position: JobPosition, settings: AssistantConfig) -> Self {
        Self {
            assistant,
            user_id,
            position,
            settings,
            session_id: None,
        }
    }

    /// Run the chat main loop
    pub async fn run(&mut self, initial_message: Option<String>) -> Result<()> {
        debug!(user_id = %self.user_id, position_id = %self.position.position_id, "run: called");
        self.print_welcome();
        self.replay_history().await;

        match self
            .assistant
            .state()
            .create_chat_session(self.user_id, self.position.position_id)
            .await
        {
            Ok(id) => self.session_id = Some(id),
            Err(e) => warn!(error = %e, "run: chat log unavailable, messages will not be saved"),
        }

        if let Some(message) = initial_message {
            println!("{} {}", ">".bright_green(), message);
            self.process_user_input(&message).await;
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(SlashCommand::parse(input)).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.process_user_input(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Hiring Procedure Assistant".bright_cyan().bold());
        println!(
            "Position: {} (Kennziffer: {})",
            self.position.position_title, self.position.kenziffer
        );
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    /// Print the most recent messages, oldest first
    async fn replay_history(&self) {
        let history = match self
            .assistant
            .state()
            .chat_history(self.user_id, self.position.position_id, self.settings.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "replay_history: failed to load chat history");
                return;
            }
        };
        if history.is_empty() {
            return;
        }

        println!("{}", "Earlier in this conversation:".dimmed());
        for message in history.iter().rev() {
            let who = match message.sender_type {
                SenderType::User => "You".bright_green(),
                SenderType::Bot => "Assistant".bright_blue(),
            };
            println!(
                "{} {}: {}",
                message.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                who,
                message.message_text
            );
        }
        println!();
    }

    async fn handle_slash_command(&mut self, command: SlashCommand) -> SlashResult {
        debug!(?command, "handle_slash_command: called");
        match command {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Quit => return SlashResult::Quit,
            SlashCommand::Status => {
                let agg = self.progress().await;
                println!("{}\n", respond::status(agg.as_ref()));
            }
            SlashCommand::Checklist => {
                let agg = self.progress().await;
                println!("{}\n", respond::checklist(agg.as_ref(), self.settings.preview_steps));
            }
            SlashCommand::History => self.replay_history().await,
            SlashCommand::Done(task_id) => self.toggle(task_id, TaskStatus::Completed).await,
            SlashCommand::Undo(task_id) => self.toggle(task_id, TaskStatus::NotStarted).await,
            SlashCommand::Usage(usage) => println!("{} Usage: {}", "?".yellow(), usage),
            SlashCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:16} Show this help", "/help".yellow());
        println!("  {:16} Exit the chat", "/quit".yellow());
        println!("  {:16} Show progress of the current step", "/status".yellow());
        println!("  {:16} Show the full checklist", "/checklist".yellow());
        println!("  {:16} Show recent messages", "/history".yellow());
        println!("  {:16} Mark a task as completed", "/done <task-id>".yellow());
        println!("  {:16} Reopen a task", "/undo <task-id>".yellow());
        println!();
        println!("Anything else is answered by the assistant, e.g. \"what's next?\"");
        println!();
    }

    async fn progress(&self) -> Option<crate::progress::AggregatedProgress> {
        self.assistant
            .get_aggregated_progress(self.position.position_id, Scope::Shared)
            .await
    }

    async fn toggle(&self, task_id: i64, status: TaskStatus) {
        let updated = self
            .assistant
            .update_task_status(self.position.position_id, task_id, status, self.user_id, None, Scope::Shared)
            .await;
        if updated {
            println!("{} Task #{} is now {}", "✓".green(), task_id, status);
        } else {
            println!("{} Could not update task #{}", "✗".red(), task_id);
        }
    }

    /// Answer a chat message and record both sides of the exchange
    async fn process_user_input(&self, input: &str) {
        self.record(SenderType::User, input).await;

        let agg = self.progress().await;
        let reply = self.assistant.classify_and_respond(input, agg.as_ref()).await;
        println!("\n{}\n", reply);

        self.record(SenderType::Bot, &reply).await;
    }

    async fn record(&self, sender: SenderType, text: &str) {
        let Some(session_id) = self.session_id else {
            return;
        };
        if let Err(e) = self.assistant.state().save_chat_message(session_id, sender, text).await {
            warn!(error = %e, "record: failed to save chat message");
        }
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}
