//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `start` (default) -- run the poll server
//! - `migrate [--status]` -- apply or list database migrations
//! - `status` -- query a running instance's health endpoint
//! - `config show|path` -- inspect the effective configuration
//! - `version` -- print build/version info

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{self, Config, DEFAULT_PORT};
use crate::logging;
use crate::migrations::MigrationRunner;
use crate::polls::SqlitePollStore;
use crate::server;

/// Multiple-choice polls, one vote per voter address.
#[derive(Parser, Debug)]
#[command(
    name = "quickpoll",
    version = env!("CARGO_PKG_VERSION"),
    about = "quickpoll - multiple-choice polls, one vote per voter address"
)]
pub struct Cli {
    /// Path to the JSON5 configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the poll server (default when no subcommand is given).
    Start,

    /// Apply pending database migrations and exit.
    Migrate {
        /// List applied and pending migrations instead of applying them.
        #[arg(long)]
        status: bool,
    },

    /// Query a running instance for health information.
    Status {
        /// Port of the running instance (default: from config or 3000).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host of the running instance.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let explicit = cli.config.as_deref();

    match cli.command.unwrap_or(Command::Start) {
        Command::Start => {
            let cfg = config::load_config(explicit)?;
            logging::init_tracing(&cfg.logging)?;
            server::start(&cfg).await?;
        }
        Command::Migrate { status } => {
            let cfg = config::load_config(explicit)?;
            logging::init_tracing(&cfg.logging)?;
            handle_migrate(&cfg, status).await?;
        }
        Command::Status { port, host } => handle_status(explicit, &host, port).await?,
        Command::Config(ConfigCommand::Show) => handle_config_show(explicit)?,
        Command::Config(ConfigCommand::Path) => handle_config_path(explicit),
        Command::Version => handle_version(),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

/// Run the `migrate` subcommand.
pub async fn handle_migrate(cfg: &Config, status: bool) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.database.is_memory() {
        println!("The in-process store has no schema; nothing to migrate.");
        return Ok(());
    }

    let store = SqlitePollStore::connect(&cfg.database.url, 1).await?;
    let runner = MigrationRunner::new(store.pool().clone());

    if status {
        println!("Database Migration Status");
        println!("==========================");
        let statuses = runner.status().await?;
        let mut pending = 0;
        for entry in &statuses {
            let label = if entry.applied {
                "APPLIED"
            } else {
                pending += 1;
                "PENDING"
            };
            println!("[{}] {}_{}", label, entry.version, entry.name);
        }
        println!();
        println!("Applied: {}", statuses.len() - pending);
        println!("Pending: {}", pending);
    } else {
        let applied = runner.run_migrations().await?;
        println!("Applied {} migration(s)", applied.len());
    }
    Ok(())
}

/// Run the `status` subcommand -- connect to a running instance's health endpoint.
pub async fn handle_status(
    explicit: Option<&Path>,
    host: &str,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let port = resolve_port(explicit, port);
    let url = format!("http://{}:{}/health", host, port);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let response = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Could not connect to quickpoll at {}:{}", host, port);
            eprintln!("  Error: {}", e);
            eprintln!();
            eprintln!("Is the server running? Start it with: quickpoll start");
            return Err(e.into());
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Health endpoint returned HTTP {}: {}", status, body).into());
    }

    let body: serde_json::Value = response.json().await?;

    println!("quickpoll status");
    println!("================");
    if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
        println!("  Version:  {}", version);
    }
    println!("  Address:  {}:{}", host, port);
    if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
        println!("  Status:   {}", status);
    }

    Ok(())
}

/// Run the `config show` subcommand.
pub fn handle_config_show(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config(explicit)?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(explicit: Option<&Path>) {
    println!("{}", config::get_config_path(explicit).display());
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("quickpoll {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("QUICKPOLL_BUILD_DATE"));
    println!("  Git commit: {}", env!("QUICKPOLL_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

/// Resolve the port to use for connecting to a running instance.
/// Tries (in order): explicit flag, config value, DEFAULT_PORT.
fn resolve_port(config_path: Option<&Path>, explicit: Option<u16>) -> u16 {
    if let Some(p) = explicit {
        return p;
    }
    config::load_config(config_path)
        .map(|cfg| cfg.server.port)
        .unwrap_or(DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_no_args_defaults_to_none() {
        let cli = Cli::try_parse_from(["quickpoll"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_start_subcommand() {
        let cli = Cli::try_parse_from(["quickpoll", "start"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Start)));
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli =
            Cli::try_parse_from(["quickpoll", "start", "--config", "/etc/quickpoll.json5"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/quickpoll.json5")));
    }

    #[test]
    fn test_cli_migrate() {
        let cli = Cli::try_parse_from(["quickpoll", "migrate"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Migrate { status: false })));

        let cli = Cli::try_parse_from(["quickpoll", "migrate", "--status"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Migrate { status: true })));
    }

    #[test]
    fn test_cli_version_subcommand() {
        let cli = Cli::try_parse_from(["quickpoll", "version"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Version)));
    }

    #[test]
    fn test_cli_config_show() {
        let cli = Cli::try_parse_from(["quickpoll", "config", "show"]).unwrap();
        match cli.command {
            Some(Command::Config(ConfigCommand::Show)) => {}
            other => panic!("Expected Config(Show), got {:?}", other),
        }
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::try_parse_from(["quickpoll", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand::Path))
        ));
    }

    #[test]
    fn test_cli_status_defaults() {
        let cli = Cli::try_parse_from(["quickpoll", "status"]).unwrap();
        match cli.command {
            Some(Command::Status { port, ref host }) => {
                assert_eq!(port, None);
                assert_eq!(host, "127.0.0.1");
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_status_with_port() {
        let cli = Cli::try_parse_from(["quickpoll", "status", "--port", "9000"]).unwrap();
        match cli.command {
            Some(Command::Status { port, .. }) => {
                assert_eq!(port, Some(9000));
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_port_prefers_flag() {
        assert_eq!(resolve_port(None, Some(4444)), 4444);
    }

    #[test]
    fn test_resolve_port_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quickpoll.json5");
        std::fs::write(&path, "{ server: { port: 8123 } }").unwrap();

        if std::env::var_os("QUICKPOLL_PORT").is_none() {
            assert_eq!(resolve_port(Some(&path), None), 8123);
        }
    }
}
