mod config;
mod error;
mod transcript;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use openapi::{ApiDescription, Translator};
use runtime::{
    Completion, EmptyToolHost, InvocationRegistry, Message, OpenAiBackend, Orchestrator, ToolHost,
    TurnEvent,
};
use storage::{ChatId, ChatRecord, ChatStore, Role};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::{API_KEY_ENV, Config};
use error::{Error, Result};

const CONFIG_FILE: &str = "toolbridge.toml";

#[derive(Parser)]
#[command(name = "toolbridge")]
#[command(about = "Chat with a model that can call your HTTP API", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat,
    /// Print the tools generated from the API description
    Tools,
    /// List saved chats
    History {
        /// Show only the last N chats
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Print a saved chat
    Show {
        /// Chat ID (prefix match supported)
        id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Tools) => cmd_tools(&config, &cli.config),
        Some(Commands::History { limit }) => cmd_history(&config, limit),
        Some(Commands::Show { id }) => cmd_show(&config, &id),
    }
}

async fn cmd_chat(config: &Config) -> Result<()> {
    println!("toolbridge v{}", env!("CARGO_PKG_VERSION"));

    let api_key = config.api_key(std::env::var(API_KEY_ENV).ok())?;
    let backend = OpenAiBackend::builder(api_key, &config.backend.model)
        .base_url(&config.backend.base_url)
        .build();
    println!("Model: {backend}");

    let data_dir = dirs_data_dir().unwrap_or_else(|| ".toolbridge".into());
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("chats.db");
    let store = ChatStore::open(&db_path)?;
    println!("Chats stored at: {}", db_path.display());

    match &config.api.description {
        Some(path) => {
            let description = ApiDescription::load(path)?;
            let registry =
                InvocationRegistry::from_description(&description, config.registry_options())?;
            debug!(description = %path.display(), ?registry, "tool registry built");
            println!("API: {} ({} tools)", path.display(), registry.specs().len());
            let orchestrator = Orchestrator::new(backend, registry).with_config(config.turn_config());
            chat_loop(&orchestrator, &store, &config.user_id).await
        }
        None => {
            println!("API: none (plain chat)");
            let orchestrator =
                Orchestrator::new(backend, EmptyToolHost).with_config(config.turn_config());
            chat_loop(&orchestrator, &store, &config.user_id).await
        }
    }
}

async fn chat_loop<H: ToolHost>(
    orchestrator: &Orchestrator<OpenAiBackend, H>,
    store: &ChatStore,
    user_id: &str,
) -> Result<()> {
    let chat_id = ChatId::new();
    println!("Chat ID: {chat_id}");
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut history: Vec<Message> = Vec::new();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        let mut turn_history = history.clone();
        turn_history.push(Message::user(input));

        println!();
        if let Some(completion) = stream_turn(orchestrator, turn_history, &mut stdout).await? {
            println!("\n");
            history = completion.messages;
            save_chat(store, chat_id, user_id, &history)?;
        }
    }

    println!("\nChat ended.");
    Ok(())
}

fn save_chat(
    store: &ChatStore,
    chat_id: ChatId,
    user_id: &str,
    history: &[Message],
) -> Result<ChatRecord> {
    let record = ChatRecord::new(chat_id, user_id, transcript::to_stored(history));
    store.save(&record)?;
    debug!(chat = %chat_id, title = %record.title, "chat saved");
    Ok(record)
}

/// Print one turn as it streams. Turn failures are reported and leave the
/// history untouched.
async fn stream_turn<H: ToolHost>(
    orchestrator: &Orchestrator<OpenAiBackend, H>,
    history: Vec<Message>,
    stdout: &mut io::Stdout,
) -> Result<Option<Completion>> {
    let mut turn = orchestrator.run_turn(history);
    while let Some(event) = turn.next().await {
        match event {
            Ok(TurnEvent::Text(delta)) => {
                print!("{delta}");
                stdout.flush()?;
            }
            Ok(TurnEvent::ToolResult(message)) => {
                for call in message.tool_calls() {
                    eprintln!("[tool] {} {}", call.name, call.input);
                }
            }
            Ok(TurnEvent::Completed(completion)) => return Ok(Some(completion)),
            Err(e) => {
                warn!(error = %e, "turn failed; history left unchanged");
                eprintln!("\nError: {e}\n");
                return Ok(None);
            }
        }
    }
    Ok(None)
}

fn cmd_tools(config: &Config, config_path: &Path) -> Result<()> {
    let path = config
        .api
        .description
        .as_ref()
        .ok_or_else(|| Error::MissingDescription {
            config: config_path.to_path_buf(),
        })?;
    let description = ApiDescription::load(path)?;
    let tools = Translator::new(config.api.collision).translate(&description)?;

    let functions: Vec<_> = tools.iter().map(|tool| tool.to_function_json()).collect();
    println!("{}", serde_json::to_string_pretty(&functions)?);
    Ok(())
}

fn cmd_history(config: &Config, limit: usize) -> Result<()> {
    let store = open_store()?;
    let chats = store.list_for_user(&config.user_id)?;

    if chats.is_empty() {
        println!("No chats found.");
        return Ok(());
    }

    println!("{:<36}  {:<16}  {:<5}  TITLE", "CHAT ID", "SAVED", "MSGS");
    println!("{}", "-".repeat(100));

    for summary in chats.into_iter().take(limit) {
        let saved = Local
            .from_utc_datetime(&summary.created_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        println!(
            "{:<36}  {:<16}  {:<5}  {}",
            summary.id, saved, summary.message_count, summary.title
        );
    }

    Ok(())
}

fn cmd_show(config: &Config, prefix: &str) -> Result<()> {
    let store = open_store()?;
    let id = store.resolve_prefix(&config.user_id, prefix)?;
    let chat = store.load(id)?;

    let saved = Local
        .from_utc_datetime(&chat.created_at.naive_utc())
        .format("%Y-%m-%d %H:%M:%S");
    println!("Chat: {} ({})", chat.id, chat.path);
    println!("Title: {}", chat.title);
    println!("Saved: {saved}\n");

    for message in &chat.messages {
        let role = match message.role {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::System => "SYSTEM",
            Role::Tool => "TOOL",
        };
        println!("{role}: {}", message.content);
    }

    Ok(())
}

fn open_store() -> Result<ChatStore> {
    let data_dir = dirs_data_dir().unwrap_or_else(|| ".toolbridge".into());
    let db_path = data_dir.join("chats.db");

    if !db_path.exists() {
        return Err(Error::DatabaseNotFound { path: db_path });
    }

    Ok(ChatStore::open(&db_path)?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/toolbridge"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("toolbridge"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("toolbridge"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
