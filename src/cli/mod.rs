//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod say;
pub mod settings;
pub mod thread_list;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::auth::{AuthManager, CredentialError};
use crate::core::config::Config;
use crate::core::model_client::GeminiClient;
use crate::utils::logging;

#[derive(Parser)]
#[command(name = "threadchat")]
#[command(version)]
#[command(about = "A terminal chat client with saved conversation threads, backed by Gemini")]
#[command(
    long_about = "threadchat keeps a list of conversation threads on disk and streams \
replies from the Gemini API into the active thread.\n\n\
Authentication:\n\
  Use 'threadchat auth' to store an API key in your system keyring.\n\n\
Environment Variables (checked before the keyring):\n\
  GEMINI_API_KEY    Your Gemini API key\n\
  API_KEY           Generic fallback\n\
  RUST_LOG          Diagnostic log filter (default: warn)\n\n\
Commands inside the chat:\n\
  /help             List chat commands\n\
  /new              Start a new thread\n\
  /threads          List saved threads\n\
  /switch <n|id>    Switch threads\n\
  /delete [n|id]    Delete a thread\n\
  Ctrl+C            Stop the reply in progress, or quit at the prompt"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use instead of the configured default
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send one prompt and print the reply without saving it
    Say {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List saved threads
    Threads,
    /// Store an API key in the system keyring
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Print the effective configuration
    Config,
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set (multiple words are joined)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let explicit_log = args.log.as_deref().map(Path::new);
    let data_dir = Config::load()
        .ok()
        .and_then(|config| config.resolve_data_dir().ok());
    let target = logging::choose_target(
        explicit_log,
        std::env::var_os("RUST_LOG").is_some(),
        data_dir.as_deref(),
    );
    logging::init(&target, explicit_log.is_none())?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat::run_chat(args.model).await,
        Commands::Say { prompt } => say::run_say(prompt, args.model).await,
        Commands::Threads => thread_list::list_threads(),
        Commands::Auth => {
            if let Err(e) = AuthManager::new().interactive_auth() {
                eprintln!("❌ Authentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Deauth => {
            if let Err(e) = AuthManager::new().interactive_deauth() {
                eprintln!("❌ Deauthentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Config => {
            Config::load()?.print_all();
            Ok(())
        }
        Commands::Set { key, value } => match value {
            Some(value) if !value.is_empty() => {
                match settings::set_and_save(&key, &value) {
                    Ok(message) => println!("{message}"),
                    Err(err) => {
                        err.print();
                        std::process::exit(1);
                    }
                }
                Ok(())
            }
            _ => {
                Config::load()?.print_all();
                Ok(())
            }
        },
        Commands::Unset { key } => {
            match settings::unset_and_save(&key) {
                Ok(message) => println!("{message}"),
                Err(err) => {
                    err.print();
                    std::process::exit(1);
                }
            }
            Ok(())
        }
    }
}

fn report_credential_error(err: &CredentialError) -> ! {
    eprintln!("❌ {err}");
    eprintln!();
    eprintln!("💡 Quick fixes:");
    for fix in err.quick_fixes() {
        eprintln!("  • {fix}");
    }
    std::process::exit(1);
}

/// Build the Gemini client from config, the `-m` override and the resolved
/// API key. Exits with a hint when no key is available.
pub(crate) fn build_client(config: &Config, model: Option<&str>) -> Arc<GeminiClient> {
    let api_key = match AuthManager::new().resolve_api_key() {
        Ok(key) => key,
        Err(err) => report_credential_error(&err),
    };
    let settings = config.model_settings(model);
    tracing::debug!(
        model = %settings.model,
        key_source = %api_key.source,
        "building model client"
    );
    Arc::new(GeminiClient::new(reqwest::Client::new(), api_key.value, settings))
}
