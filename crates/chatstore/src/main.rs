//! # chatstore CLI (`chatctl`)
//!
//! Creates the database, serves the JSON API and inspects or maintains
//! stored chats from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! chatctl --config ./config/chatstore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatctl init` | Create the SQLite database and run schema migrations |
//! | `chatctl serve` | Start the HTTP API |
//! | `chatctl history <user>` | Page through a user's chats |
//! | `chatctl usage <user>` | Count a user's recent messages |
//! | `chatctl chat show <id>` | Print a chat with its messages |
//! | `chatctl messages prune <chat> --after <ts>` | Drop messages after a point in time |
//! | `chatctl knowledge list` | List knowledge documents by status |
//! | `chatctl user add <email>` | Create a user |
//! | `chatctl providers` | Show the resolved model table |
//!
//! Log verbosity follows `RUST_LOG` and defaults to `chatstore=info`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chatstore::{chat_cmd, config, history, knowledge_cmd, migrate, providers, server, user_cmd};

/// chatstore CLI: persistence and query tooling for an AI chat application.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/chatstore.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "chatctl",
    about = "chatstore: chat persistence, query layer and JSON API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/chatstore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the records table. Running it
    /// again is safe.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// List a user's chats, newest first.
    History {
        /// User id.
        user_id: String,

        /// Page size.
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Only chats newer than this chat id.
        #[arg(long)]
        starting_after: Option<String>,

        /// Only chats older than this chat id.
        #[arg(long)]
        ending_before: Option<String>,
    },

    /// Count user messages sent within a recent window.
    Usage {
        /// User id.
        user_id: String,

        /// Window size in hours.
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Inspect or modify a chat.
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Maintain chat messages.
    Messages {
        #[command(subcommand)]
        action: MessagesAction,
    },

    /// Manage RAG knowledge documents.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Show which backend each logical model name resolves to.
    Providers,
}

#[derive(Subcommand)]
enum ChatAction {
    /// Print a chat with its messages, votes and stream ids.
    Show { id: String },

    /// Delete a chat with its messages and votes.
    Delete { id: String },

    /// Set a chat's visibility (`private` or `public`).
    Visibility { id: String, visibility: String },
}

#[derive(Subcommand)]
enum MessagesAction {
    /// Delete a chat's messages created after a timestamp, with their votes.
    Prune {
        chat_id: String,

        /// RFC 3339 timestamp; messages strictly newer are removed.
        #[arg(long)]
        after: String,

        /// Report the count without deleting.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Register a raw text or webpage document.
    Add {
        #[arg(long)]
        title: Option<String>,

        /// Inline text for a raw document.
        #[arg(long)]
        content: Option<String>,

        /// Page URL for a webpage document.
        #[arg(long)]
        url: Option<String>,
    },

    /// List knowledge documents in one status.
    List {
        #[arg(long, default_value = "pending")]
        status: String,
    },

    /// Overwrite a knowledge document's status.
    SetStatus { id: String, status: String },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user with a hashed password.
    Add {
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Create a guest user with a random password.
    Guest,

    /// Show users registered under an email.
    Show { email: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatstore=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::History {
            user_id,
            limit,
            starting_after,
            ending_before,
        } => {
            history::run_history(&cfg, &user_id, limit, starting_after, ending_before).await?;
        }
        Commands::Usage { user_id, hours } => {
            history::run_usage(&cfg, &user_id, hours).await?;
        }
        Commands::Chat { action } => match action {
            ChatAction::Show { id } => chat_cmd::run_chat_show(&cfg, &id).await?,
            ChatAction::Delete { id } => chat_cmd::run_chat_delete(&cfg, &id).await?,
            ChatAction::Visibility { id, visibility } => {
                chat_cmd::run_chat_visibility(&cfg, &id, &visibility).await?
            }
        },
        Commands::Messages { action } => match action {
            MessagesAction::Prune {
                chat_id,
                after,
                dry_run,
            } => {
                chat_cmd::run_messages_prune(&cfg, &chat_id, &after, dry_run).await?;
            }
        },
        Commands::Knowledge { action } => match action {
            KnowledgeAction::Add {
                title,
                content,
                url,
            } => {
                knowledge_cmd::run_knowledge_add(&cfg, title, content, url).await?;
            }
            KnowledgeAction::List { status } => {
                knowledge_cmd::run_knowledge_list(&cfg, &status).await?;
            }
            KnowledgeAction::SetStatus { id, status } => {
                knowledge_cmd::run_knowledge_set_status(&cfg, &id, &status).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::Add { email, password } => {
                user_cmd::run_user_add(&cfg, &email, &password).await?;
            }
            UserAction::Guest => user_cmd::run_user_guest(&cfg).await?,
            UserAction::Show { email } => user_cmd::run_user_show(&cfg, &email).await?,
        },
        Commands::Providers => {
            providers::list_providers(&cfg.providers)?;
        }
    }

    Ok(())
}
