//! smsgate - Admin console for an SMS gateway
//!
//! Signs in against the gateway's management API and manages connectors,
//! routes, users and groups from the terminal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;

use smsgate::config::{AdminConfig, ConfigOverrides};
use smsgate::session::AuthStatus;
use smsgate::Console;

#[derive(Parser, Debug)]
#[command(name = "smsgate")]
#[command(author = "smsgate Team")]
#[command(version)]
#[command(about = "Admin console for an SMS gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the console configuration file (TOML)
    #[arg(long, env = "SMSGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Management API base URL
    #[arg(long, env = "SMSGATE_API_URL", global = true)]
    api_url: Option<String>,

    /// Gateway API base URL (connectors and statistics)
    #[arg(long, env = "SMSGATE_GATEWAY_URL", global = true)]
    gateway_url: Option<String>,

    /// Basic auth username for the gateway API
    #[arg(long, env = "SMSGATE_GATEWAY_USERNAME", global = true)]
    gateway_username: Option<String>,

    /// Basic auth password for the gateway API
    #[arg(long, env = "SMSGATE_GATEWAY_PASSWORD", global = true, hide_env_values = true)]
    gateway_password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "SMSGATE_TIMEOUT_SECS", global = true)]
    timeout: Option<u64>,

    /// Refresh interval of `watch` in seconds
    #[arg(long, env = "SMSGATE_POLL_SECS", global = true)]
    poll_interval: Option<u64>,

    /// Where the session is stored (defaults to ~/.smsgate)
    #[arg(long, env = "SMSGATE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long, env = "SMSGATE_USERNAME")]
        username: String,
        /// Read from stdin when omitted
        #[arg(short, long, env = "SMSGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// End the stored session
    Logout,
    /// Show the signed-in user and the areas they may open
    Whoami,

    /// Manage connectors
    Connectors {
        #[command(subcommand)]
        command: cli::ConnectorCommands,
    },

    /// Manage MT and MO routes
    Routes {
        #[command(subcommand)]
        command: cli::RouteCommands,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        command: cli::UserCommands,
    },

    /// Manage groups
    Groups {
        #[command(subcommand)]
        command: cli::GroupCommands,
    },

    /// Show the traffic dashboard
    Stats {
        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Refresh the dashboard until interrupted
    Watch,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::from_level(log_level).into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Version = cli.command {
        println!("smsgate {}", env!("CARGO_PKG_VERSION"));
        println!("Admin console for an SMS gateway");
        return Ok(());
    }

    let overrides = ConfigOverrides {
        api_url: cli.api_url.clone(),
        gateway_url: cli.gateway_url.clone(),
        gateway_username: cli.gateway_username.clone(),
        gateway_password: cli.gateway_password.clone(),
        timeout_secs: cli.timeout,
        poll_interval_secs: cli.poll_interval,
        data_dir: cli.data_dir.clone(),
    };
    let config = AdminConfig::load(cli.config.as_deref(), overrides)?;
    debug!("API URL: {}", config.api_url);

    let console = Console::from_config(&config)?;

    let status = match &cli.command {
        Commands::Login { .. } => AuthStatus::Anonymous,
        _ => console.init().await,
    };

    let result = match cli.command {
        Commands::Login { username, password } => cli::login(&console, &username, password).await,
        Commands::Logout => cli::logout(&console).await,
        Commands::Whoami => cli::whoami(&console, status).await,
        Commands::Connectors { command } => command.execute(&console).await,
        Commands::Routes { command } => command.execute(&console).await,
        Commands::Users { command } => command.execute(&console).await,
        Commands::Groups { command } => command.execute(&console).await,
        Commands::Stats { format } => cli::stats(&console, &format).await,
        Commands::Watch => cli::watch(&console, config.poll_interval).await,
        Commands::Version => Ok(()),
    };

    console.teardown().await;
    result
}
