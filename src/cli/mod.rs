//! Command-line interface parsing and handling
//!
//! This module parses arguments, wires the service client and credential
//! store together, and dispatches into the account, chat and settings
//! commands.

pub mod account;
pub mod chat;
pub mod say;


use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::api::ApiClient;
use crate::auth::store::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
use crate::core::app::{App, StartOutcome};
use crate::core::config::Config;
use crate::core::session::LoginReason;
use crate::utils::logging::init_tracing;

/// Exit status when the command needs a (new) login.
pub const EXIT_LOGIN_REQUIRED: i32 = 2;

/// Seeds the in-memory store when `--no-keyring` is passed.
pub const TOKEN_ENV: &str = "CREDITCHAT_TOKEN";

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_SHA"), ")");

#[derive(Parser)]
#[command(name = "creditchat")]
#[command(version = VERSION)]
#[command(about = "A terminal chat client for token-metered chat services")]
#[command(
    long_about = "Creditchat talks to a token-metered chat service. Every reply costs tokens \
from your account balance; the balance shown is always the one the server reports.\n\n\
Getting started:\n\
  creditchat register   Create an account\n\
  creditchat login      Log in and store the session token in your system keyring\n\
  creditchat            Start chatting\n\n\
Environment Variables:\n\
  CREDITCHAT_API_URL    Service base URL (defaults to http://127.0.0.1:8000/api)\n\
  CREDITCHAT_LOG        Log filter, e.g. 'debug' (defaults to 'warn')\n\
  CREDITCHAT_TOKEN      Session token used with --no-keyring\n\n\
Chat commands:\n\
  /balance              Refresh and show your token balance\n\
  /logout               End the session\n\
  /quit                 Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Write logs to the given file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Service base URL, overriding config and environment
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Keep the session token in memory for this run only
    #[arg(long, global = true)]
    pub no_keyring: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Register,
    /// Log in and store the session token
    Login,
    /// Forget the stored session token
    Logout,
    /// Show the logged-in user and token balance
    Whoami,
    /// Start the interactive chat (default)
    Chat,
    /// Send a single message and print the reply
    Say {
        /// Message to send
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Set configuration values
    Set {
        /// Configuration key to set (api-url, request-timeout)
        key: String,
        /// Value to set for the key
        value: String,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the current configuration
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    let code = runtime.block_on(async_main(args))?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn async_main(args: Args) -> Result<i32, Box<dyn Error>> {
    let command = args.command.unwrap_or(Commands::Chat);

    match command {
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            if let Err(err) = config.set_value(&key, &value) {
                eprintln!("❌ {err}");
                return Ok(1);
            }
            config.save()?;
            println!("✅ Set {key} to: {}", value.trim());
            return Ok(0);
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            if let Err(err) = config.unset_value(&key) {
                eprintln!("❌ {err}");
                return Ok(1);
            }
            config.save()?;
            println!("✅ Unset {key}");
            return Ok(0);
        }
        Commands::Config => {
            Config::load()?.print_all();
            return Ok(0);
        }
        _ => {}
    }

    let config = Config::load()?;
    let credentials = credential_store(args.no_keyring);

    if let Commands::Logout = command {
        return logout(credentials.as_ref());
    }

    let base_url = config.resolve_base_url(args.api_url.as_deref());
    let api = Arc::new(ApiClient::new(&base_url, config.request_timeout())?);
    let app = App::new(api, credentials);

    match command {
        Commands::Register => account::run_register(&app).await,
        Commands::Login => account::run_login(&app).await,
        Commands::Whoami => whoami(&app).await,
        Commands::Say { prompt } => say::run_say(&app, prompt).await,
        _ => match app.start().await? {
            StartOutcome::Ready(controller) => chat::run_chat(controller).await,
            StartOutcome::LoginRequired(reason) => Ok(login_required(reason)),
        },
    }
}

fn credential_store(no_keyring: bool) -> Arc<dyn CredentialStore> {
    if !no_keyring {
        return Arc::new(KeyringCredentialStore::new());
    }
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            Arc::new(MemoryCredentialStore::with_token(token.trim()))
        }
        _ => Arc::new(MemoryCredentialStore::new()),
    }
}

fn logout(credentials: &dyn CredentialStore) -> Result<i32, Box<dyn Error>> {
    if credentials.clear()? {
        println!("✅ Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(0)
}

async fn whoami(app: &App) -> Result<i32, Box<dyn Error>> {
    match app.start().await? {
        StartOutcome::Ready(controller) => match controller.reload_profile().await {
            Ok(profile) => {
                println!("{} ({} tokens)", profile.username, profile.token_balance);
                Ok(0)
            }
            Err(required) => Ok(login_required(required.0)),
        },
        StartOutcome::LoginRequired(reason) => Ok(login_required(reason)),
    }
}

/// Tell the user to log in again and return the matching exit status.
pub(crate) fn login_required(reason: LoginReason) -> i32 {
    eprintln!("🔐 {}. Run 'creditchat login' to continue.", login_hint(reason));
    EXIT_LOGIN_REQUIRED
}

pub(crate) fn login_hint(reason: LoginReason) -> &'static str {
    match reason {
        LoginReason::NoCredential => "Not logged in",
        LoginReason::Rejected => "Your stored session is no longer valid",
        LoginReason::Expired => "Your session has expired",
        LoginReason::LoggedOut => "Logged out",
    }
}
