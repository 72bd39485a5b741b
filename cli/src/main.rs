//! `todo` — terminal front-end for the todo service.
//!
//! Every invocation restores the persisted session first and only then
//! decides between the authenticated and unauthenticated paths. API errors
//! are printed as `error: <message>` with a non-zero exit status.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use todo_core::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "todo", version, about = "Manage your todos from the terminal")]
struct Args {
    /// API base URL including the version prefix [env: TODO_API_URL]
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// File holding the session token [env: TODO_TOKEN_FILE]
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    /// Request timeout in seconds [env: TODO_HTTP_TIMEOUT_SECS]
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and log in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "TODO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TODO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List todos
    List {
        /// Only completed todos
        #[arg(long)]
        done: bool,
    },
    /// Add a todo
    Add { title: String },
    /// Show one todo
    Show { id: Uuid },
    /// Change a todo's title
    Rename { id: Uuid, title: String },
    /// Mark a todo as done
    Done { id: Uuid },
    /// Mark a todo as not done
    Undone { id: Uuid },
    /// Delete a todo
    Delete { id: Uuid },
}

fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Environment first, then command-line flags on top.
fn client_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    apply_flags(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_flags(config: &mut ClientConfig, args: &Args) {
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(path) = &args.token_file {
        config.token_path = path.clone();
    }
    if let Some(secs) = args.timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let result = match client_config(&args) {
        Ok(config) => commands::run(config, args.command).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
