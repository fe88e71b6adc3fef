//! Interactive chat REPL for OpenAI-compatible models.
//!
//! # Usage
//!
//! ```bash
//! # Write a default configuration file, then start chatting
//! parley --init-config
//! parley
//!
//! # Use another model for this run only
//! parley --model gpt-4o
//!
//! # Disable colors (useful for piping output)
//! parley --no-color
//! ```
//!
//! The API key is read from `OPENAI_API_KEY`, which is loaded from `.env` (or `--env-file`) at
//! startup.  Type `/help` at the prompt for the list of commands.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use arrrg::CommandLine;
use tracing_subscriber::EnvFilter;

use parley::chat::{ChatArgs, ChatConfig, ChatSession, LineEditor, Repl};
use parley::{ChatClient, Error, Interrupt, PlainTextRenderer, Result, SystemClipboard};

const LOG_ENV: &str = "PARLEY_LOG";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let (args, _) = ChatArgs::from_command_line_relaxed("parley [OPTIONS]");
    init_logging();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("parley: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn run(args: ChatArgs) -> Result<()> {
    let config_path = args.config_path()?;
    if args.init_config {
        ChatConfig::default().save(&config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let env_file = args.env_file();
    dotenvy::from_path(&env_file).map_err(|e| {
        Error::config(format!(
            "failed to load environment file `{}`: {e}",
            env_file.display()
        ))
    })?;

    let config = ChatConfig::load(&config_path)?;
    tracing::info!(path = %config_path.display(), "loaded configuration");

    let client = ChatClient::with_options(
        None,
        Some(config.base_url.clone()),
        Some(Duration::from_secs(config.connect_timeout_secs)),
    )?;
    let prefix = config.prefix_char();
    let session = ChatSession::new(client, config)
        .with_config_path(config_path)
        .with_model_override(args.model.clone());

    let interrupt = Interrupt::new();
    let handler = interrupt.clone();
    ctrlc::set_handler(move || handler.trigger()).map_err(|e| {
        Error::io(
            "failed to install the Ctrl+C handler",
            io::Error::other(e.to_string()),
        )
    })?;

    let mut editor = LineEditor::open(prefix)?;
    let mut repl = Repl::new(
        session,
        Box::new(PlainTextRenderer::with_color(!args.no_color)),
        Box::new(SystemClipboard::new()),
        interrupt,
    );
    repl.print_banner();
    repl.run(&mut editor).await;
    Ok(())
}
