use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use studyset::api::{ApiClient, Credentials};
use studyset::app::command::Command;
use studyset::app::{print_entry, print_history};
use studyset::history::HistoryStore;
use studyset::narration::{CommandSpeech, NoSpeech, SpeechEngine};
use studyset::{App, Config, StudySession};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "studyset")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive study session
    Study {
        /// Text to generate a study set from
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,
        /// Document to generate a study set from
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Manage saved sessions
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Store an identity token for the study service
    Login {
        /// Identity token issued by the auth provider
        token: String,
    },
    /// Forget the stored identity token
    Logout,
    /// Show the stored identity
    Whoami,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List saved sessions
    List,
    /// Show one saved session in full
    Show {
        /// Session id
        id: String,
    },
    /// Delete one saved session
    Delete {
        /// Session id
        id: String,
    },
    /// Delete all saved sessions
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyset=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Study { text, file }) => study(text, file).await?,
        Some(Commands::History { command }) => history(command).await?,
        Some(Commands::Login { token }) => {
            let identity = Credentials::sign_in(&token)?;
            println!("Signed in as {}", identity.masked());
        }
        Some(Commands::Logout) => {
            Credentials::sign_out()?;
            println!("Signed out");
        }
        Some(Commands::Whoami) => match Credentials::current_user()? {
            Some(identity) => println!("Signed in as {}", identity.masked()),
            None => println!("Not signed in"),
        },
        None => study(None, None).await?,
    }

    Ok(())
}

async fn study(text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let client = Arc::new(build_client(&config)?);
    let session = StudySession::new(client, speech_engine(&config), config.history_limit);
    let mut app = App::new(session);

    let staged = match (text, file) {
        (Some(text), _) => Some(Command::Text(text)),
        (None, Some(path)) => Some(Command::File(path)),
        (None, None) => None,
    };
    if let Some(command) = staged {
        app.handle_command(command).await?;
        app.handle_command(Command::Generate).await?;
    }

    app.run().await
}

async fn history(command: HistoryCommands) -> Result<()> {
    let config = Config::load()?;
    let store = HistoryStore::new(Arc::new(build_client(&config)?), config.history_limit);

    match command {
        HistoryCommands::List => {
            store.refresh().await.context("Failed to load history")?;
            print_history(&store.items());
        }
        HistoryCommands::Show { id } => {
            store.refresh().await.context("Failed to load history")?;
            store.toggle_details(&id);
            match store.expanded() {
                Some(entry) => print_entry(&entry),
                None => println!("No saved session with id {id}"),
            }
        }
        HistoryCommands::Delete { id } => {
            store.delete_one(&id).await.context("Failed to delete history item")?;
            println!("Deleted {id}");
        }
        HistoryCommands::Clear => {
            store.clear_all().await.context("Failed to clear history")?;
            println!("History cleared");
        }
    }
    Ok(())
}

fn build_client(config: &Config) -> Result<ApiClient> {
    let token = match Credentials::current_user() {
        Ok(identity) => identity.map(|i| i.token),
        Err(e) => {
            tracing::warn!("Continuing without identity: {}", e);
            None
        }
    };
    let client = ApiClient::new(config.api_base.clone(), config.request_timeout())
        .context("Failed to create HTTP client")?;
    Ok(client.with_token(token))
}

fn speech_engine(config: &Config) -> Arc<dyn SpeechEngine> {
    if let Some(program) = &config.speech_command {
        return Arc::new(CommandSpeech::new(program.clone()));
    }
    match CommandSpeech::detect() {
        Some(engine) => {
            tracing::debug!("Using {} for speech", engine.program());
            Arc::new(engine)
        }
        None => {
            tracing::info!("No speech program found; live narration disabled");
            Arc::new(NoSpeech)
        }
    }
}
