//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use procstore::PositionStatus;
use std::path::PathBuf;

/// Hiring procedure assistant
#[derive(Parser)]
#[command(
    name = "ha",
    about = "Checklists and chat for hiring committees working through an appointment procedure",
    version,
    after_help = "Logs are written to: ~/.local/share/hireassist/logs/hireassist.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Create the database if it does not exist
    Init,

    /// Import a procedure definition from YAML
    Import {
        /// Procedure definition file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Manage job positions
    Position {
        #[command(subcommand)]
        command: PositionCommand,
    },

    /// List active positions
    Positions {
        /// Only positions whose committee includes this user (all when omitted)
        #[arg(short, long)]
        user: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the checklist of a position
    Checklist {
        position_id: i64,

        /// Show this user's personal record instead of the committee's
        #[arg(short, long)]
        personal: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a task completed, or reopen it with --undo
    Toggle {
        position_id: i64,
        task_id: i64,

        /// User making the change
        #[arg(short, long)]
        user: String,

        /// Reopen the task
        #[arg(long)]
        undo: bool,

        /// Notes stored with the task
        #[arg(short, long)]
        notes: Option<String>,

        /// Only change the user's personal record
        #[arg(long)]
        personal: bool,
    },

    /// Show progress of the current step
    Status {
        position_id: i64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Ask the assistant a single question
    Ask {
        position_id: i64,

        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Chat with the assistant about a position
    Chat {
        position_id: i64,

        /// User chatting
        #[arg(short, long)]
        user: String,

        /// First message to send
        message: Option<String>,
    },

    /// Show the stored chat history
    History {
        position_id: i64,

        /// Whose conversation
        #[arg(short, long)]
        user: String,

        /// Number of messages to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Progress of all active positions
    Overview {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// User subcommands
#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user
    Add {
        username: String,

        #[arg(short, long)]
        email: Option<String>,

        /// User type, e.g. User or HR
        #[arg(short = 't', long = "type", default_value = "User")]
        user_type: String,
    },
}

/// Position subcommands
#[derive(Subcommand)]
pub enum PositionCommand {
    /// Create a position together with its committee
    Add {
        /// Position title
        #[arg(long)]
        title: String,

        /// Unique reference number
        #[arg(short, long)]
        kenziffer: String,

        /// Procedure the position follows
        #[arg(short, long)]
        procedure: i64,

        #[arg(short, long)]
        department: Option<String>,

        /// Committee name (defaults to "Committee <title>")
        #[arg(long)]
        committee: Option<String>,

        /// Committee member usernames
        #[arg(short, long = "member")]
        members: Vec<String>,

        /// Committee head username, must also be a member
        #[arg(long)]
        head: Option<String>,

        /// Creating user
        #[arg(long)]
        created_by: Option<String>,
    },

    /// Change the lifecycle state of a position
    SetStatus {
        position_id: i64,

        /// created, in_progress, completed or cancelled
        #[arg(value_parser = parse_position_status)]
        status: PositionStatus,
    },
}

fn parse_position_status(s: &str) -> Result<PositionStatus, String> {
    s.parse().map_err(|e: procstore::StoreError| e.to_string())
}

/// Output format for listing commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
