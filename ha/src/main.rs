//! HireAssist - hiring procedure assistant
//!
//! CLI entry point for managing procedures, checklists and the chat.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{info, warn};

use hireassist::assistant::{Assistant, PositionStage};
use hireassist::cli::{Cli, Command, OutputFormat, PositionCommand, UserCommand};
use hireassist::config::Config;
use hireassist::llm::create_client;
use hireassist::progress::percentage;
use hireassist::prompts::PromptLoader;
use hireassist::repl::ChatSession;
use hireassist::respond::{self, Completer, NO_DATA};
use hireassist::state::{StateError, StateManager};
use procstore::{NewPosition, PositionProgress, ProcedureDef, Scope, SenderType, TaskStatus};
use serde::Serialize;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hireassist")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to the log file only; stdout belongs to command output
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("hireassist.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "HireAssist loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let state = open_state(&config)?;

    let result = match command {
        Command::Init => cmd_init(&config),
        Command::Import { file } => cmd_import(&state, &file).await,
        Command::User { command } => match command {
            UserCommand::Add {
                username,
                email,
                user_type,
            } => cmd_user_add(&state, &username, email.as_deref(), &user_type).await,
        },
        Command::Position { command } => cmd_position(&state, command).await,
        Command::Positions { user, format } => cmd_positions(&state, user.as_deref(), format).await,
        Command::Checklist {
            position_id,
            personal,
            format,
        } => cmd_checklist(&config, state.clone(), position_id, personal.as_deref(), format).await,
        Command::Toggle {
            position_id,
            task_id,
            user,
            undo,
            notes,
            personal,
        } => {
            let status = if undo { TaskStatus::NotStarted } else { TaskStatus::Completed };
            cmd_toggle(&config, state.clone(), position_id, task_id, &user, status, notes, personal).await
        }
        Command::Status { position_id, format } => cmd_status(&config, state.clone(), position_id, format).await,
        Command::Ask { position_id, question } => {
            cmd_ask(&config, state.clone(), position_id, &question.join(" ")).await
        }
        Command::Chat {
            position_id,
            user,
            message,
        } => cmd_chat(&config, state.clone(), position_id, &user, message).await,
        Command::History {
            position_id,
            user,
            limit,
            format,
        } => {
            let limit = limit.unwrap_or(config.assistant.history_limit);
            cmd_history(&state, position_id, &user, limit, format).await
        }
        Command::Overview { format } => cmd_overview(&config, state.clone(), format).await,
    };

    // Queued commands are handled before the actor stops
    if let Err(e) = state.shutdown().await {
        warn!(error = %e, "State actor already stopped");
    }
    result
}

fn open_state(config: &Config) -> Result<StateManager> {
    let db_path = config.storage.expanded_db_path();
    StateManager::spawn(&db_path).context(format!("Failed to open database at {}", db_path.display()))
}

fn build_assistant(config: &Config, state: StateManager) -> Result<Assistant> {
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let prompts = PromptLoader::new(config.assistant.expanded_prompts_dir());
    let completer = Completer::new(llm, prompts, config.llm.max_tokens);
    Ok(Assistant::new(state, completer))
}

async fn resolve_user(state: &StateManager, username: &str) -> Result<i64> {
    state
        .find_user(username)
        .await?
        .ok_or_else(|| eyre::eyre!("Unknown user: {}", username))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The database is created when the state actor opens it
fn cmd_init(config: &Config) -> Result<()> {
    println!("Database ready at {}", config.storage.expanded_db_path().display());
    Ok(())
}

async fn cmd_import(state: &StateManager, file: &Path) -> Result<()> {
    let def = ProcedureDef::from_yaml_file(file).context(format!("Failed to read procedure from {}", file.display()))?;
    let title = def.title.clone();
    let task_count = def.task_count();
    let procedure_id = state.import_procedure(def).await?;
    println!("Imported procedure {} '{}' ({} tasks)", procedure_id, title, task_count);
    Ok(())
}

async fn cmd_user_add(state: &StateManager, username: &str, email: Option<&str>, user_type: &str) -> Result<()> {
    let user_id = state.add_user(username, email, user_type).await?;
    println!("Added user {} '{}' ({})", user_id, username, user_type);
    Ok(())
}

async fn cmd_position(state: &StateManager, command: PositionCommand) -> Result<()> {
    match command {
        PositionCommand::Add {
            title,
            kenziffer,
            procedure,
            department,
            committee,
            members,
            head,
            created_by,
        } => {
            let mut member_ids = Vec::with_capacity(members.len());
            for member in &members {
                member_ids.push(resolve_user(state, member).await?);
            }
            let head_id = match head.as_deref() {
                Some(name) if !members.iter().any(|m| m == name) => {
                    return Err(eyre::eyre!("Committee head '{}' must also be listed as a member", name));
                }
                Some(name) => Some(resolve_user(state, name).await?),
                None => None,
            };
            let created_by = match created_by.as_deref() {
                Some(name) => Some(resolve_user(state, name).await?),
                None => None,
            };

            let created = state
                .create_position(NewPosition {
                    ba_name: committee.unwrap_or_else(|| format!("Committee {}", title)),
                    position_title: title.clone(),
                    department,
                    kenziffer,
                    procedure_id: procedure,
                    created_by,
                    member_ids,
                    head_id,
                })
                .await?;
            println!(
                "Created position {} '{}' (committee {})",
                created.position_id, title, created.ba_id
            );
        }
        PositionCommand::SetStatus { position_id, status } => {
            match state.set_position_status(position_id, status).await {
                Ok(()) => println!("Position {} is now {}", position_id, status),
                Err(StateError::NotFound(_)) => return Err(eyre::eyre!("Unknown position {}", position_id)),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

async fn cmd_positions(state: &StateManager, user: Option<&str>, format: OutputFormat) -> Result<()> {
    let user_id = match user {
        Some(name) => Some(resolve_user(state, name).await?),
        None => None,
    };
    let positions = state.active_positions(user_id).await?;

    match format {
        OutputFormat::Json => print_json(&positions)?,
        OutputFormat::Text => {
            if positions.is_empty() {
                println!("No active positions.");
            }
            for position in &positions {
                let head = if position.is_head == Some(true) { " [head]" } else { "" };
                println!("{:>4}  {}{}", position.position_id, position.label(), head);
            }
        }
    }
    Ok(())
}

async fn cmd_checklist(
    config: &Config,
    state: StateManager,
    position_id: i64,
    personal: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let scope = match personal {
        Some(name) => Scope::Personal {
            user_id: resolve_user(&state, name).await?,
        },
        None => Scope::Shared,
    };
    let assistant = build_assistant(config, state)?;
    let aggregated = assistant.get_aggregated_progress(position_id, scope).await;

    match format {
        OutputFormat::Json => print_json(&aggregated)?,
        OutputFormat::Text => println!(
            "{}",
            respond::checklist(aggregated.as_ref(), config.assistant.preview_steps)
        ),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_toggle(
    config: &Config,
    state: StateManager,
    position_id: i64,
    task_id: i64,
    username: &str,
    status: TaskStatus,
    notes: Option<String>,
    personal: bool,
) -> Result<()> {
    let user_id = resolve_user(&state, username).await?;
    let scope = if personal { Scope::Personal { user_id } } else { Scope::Shared };
    let assistant = build_assistant(config, state)?;

    if !assistant
        .update_task_status(position_id, task_id, status, user_id, notes, scope)
        .await
    {
        return Err(eyre::eyre!("Could not update task {} of position {}", task_id, position_id));
    }
    println!("{} Task #{} is now {}", "✓".green(), task_id, status);
    Ok(())
}

async fn cmd_status(config: &Config, state: StateManager, position_id: i64, format: OutputFormat) -> Result<()> {
    let assistant = build_assistant(config, state)?;
    let aggregated = assistant.get_aggregated_progress(position_id, Scope::Shared).await;

    match format {
        OutputFormat::Json => match &aggregated {
            Some(agg) => print_json(&serde_json::json!({
                "procedure": agg.procedure_info,
                "progress": agg.progress,
                "current_step": agg.current_step().map(|step| &step.step_title),
            }))?,
            None => print_json(&serde_json::json!({ "error": NO_DATA }))?,
        },
        OutputFormat::Text => println!("{}", respond::status(aggregated.as_ref())),
    }
    Ok(())
}

async fn cmd_ask(config: &Config, state: StateManager, position_id: i64, question: &str) -> Result<()> {
    let assistant = build_assistant(config, state)?;
    let aggregated = assistant.get_aggregated_progress(position_id, Scope::Shared).await;
    let reply = assistant.classify_and_respond(question, aggregated.as_ref()).await;
    println!("{}", reply);
    Ok(())
}

async fn cmd_chat(
    config: &Config,
    state: StateManager,
    position_id: i64,
    username: &str,
    message: Option<String>,
) -> Result<()> {
    let user_id = resolve_user(&state, username).await?;
    let position = state.get_position_required(position_id).await?;
    if !position.status.is_active() {
        return Err(eyre::eyre!("Position {} is {}", position_id, position.status));
    }

    let assistant = build_assistant(config, state)?;
    let mut session = ChatSession::new(&assistant, user_id, position, config.assistant.clone());
    session.run(message).await
}

async fn cmd_history(
    state: &StateManager,
    position_id: i64,
    username: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let user_id = resolve_user(state, username).await?;
    let mut history = state.chat_history(user_id, position_id, limit).await?;
    history.reverse();

    match format {
        OutputFormat::Json => print_json(&history)?,
        OutputFormat::Text => {
            if history.is_empty() {
                println!("No messages yet.");
            }
            for message in &history {
                let who = match message.sender_type {
                    SenderType::User => username,
                    SenderType::Bot => "assistant",
                };
                println!(
                    "[{}] {}: {}",
                    message.created_at.format("%Y-%m-%d %H:%M"),
                    who,
                    message.message_text
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct OverviewRow<'a> {
    #[serde(flatten)]
    position: &'a PositionProgress,
    stage: PositionStage,
}

async fn cmd_overview(config: &Config, state: StateManager, format: OutputFormat) -> Result<()> {
    let statistics = state.position_statistics().await?;
    let overview = state.position_overview().await?;
    let assistant = build_assistant(config, state)?;

    let mut rows = Vec::with_capacity(overview.len());
    for position in &overview {
        rows.push(OverviewRow {
            position,
            stage: assistant.position_stage(position).await,
        });
    }

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "statistics": statistics,
            "positions": rows,
        }))?,
        OutputFormat::Text => {
            println!(
                "Positions: {} total, {} assigned, {} unassigned, {} completed",
                statistics.total_positions,
                statistics.assigned_positions,
                statistics.unassigned_positions,
                statistics.completed_positions
            );
            println!("Average progress of active positions: {:.1}%", statistics.average_progress);
            println!();

            if rows.is_empty() {
                println!("No active positions.");
            }
            for row in &rows {
                let position = row.position;
                let pct = percentage(position.completed_tasks as usize, position.total_tasks as usize);
                println!(
                    "{:>4}  {} ({})  {}  {}/{} tasks ({:.1}%)",
                    position.position_id,
                    position.position_title,
                    position.kenziffer,
                    position.ba_name.as_deref().unwrap_or("-"),
                    position.completed_tasks,
                    position.total_tasks,
                    pct
                );
                println!("      -> {}", row.stage);
            }
        }
    }
    Ok(())
}
