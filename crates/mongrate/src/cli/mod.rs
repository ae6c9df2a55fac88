mod status;
mod up;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use mongrate::prelude::*;

/// MONGRATE - ordered, idempotent MongoDB migrations
#[derive(Parser)]
#[command(name = "mongrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// CLI commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Apply every pending migration (default).
    Up,

    /// Show which migrations are applied to which databases.
    Status,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// TOML configuration file. Environment variables are used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Migrations directory (overrides config).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();
        init_tracing(self.global.json_logs);

        let config = self.global.load_config()?;
        let deps = connect(config).await?;

        match self.command.unwrap_or(Commands::Up) {
            Commands::Up => up::execute(&deps).await,
            Commands::Status => status::execute(&deps).await,
        }
    }
}

impl GlobalArgs {
    /// Resolve configuration from the config file or the environment, then apply overrides.
    pub fn load_config(&self) -> Result<MigrateConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                MigrateConfig::from_file(path)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?
            }
            None => MigrateConfig::from_env()?,
        };

        if let Some(dir) = &self.migrations_dir {
            config.migrations.dir = dir.clone();
        }
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect(config: MigrateConfig) -> Result<RunnerDependencies> {
    info!("Using data store at {}", config.mongo.redacted_uri());
    let store = MongoStore::from_config(&config.mongo).await?;
    Ok(RunnerDependencies::new(
        Arc::new(store),
        ExecutionContext::new(),
        config,
    ))
}

/// Process exit status for a failed command.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<MigrateError>()
        .map(MigrateError::exit_code)
        .unwrap_or(EXIT_MIGRATION_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_defaults_to_up() {
        let cli = Cli::try_parse_from(["mongrate"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(!cli.global.json_logs);
    }

    #[test]
    fn test_cli_parse_status_with_globals() {
        let cli = Cli::try_parse_from([
            "mongrate",
            "status",
            "--config",
            "mongrate.toml",
            "-m",
            "./db",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::Status));
        assert_eq!(cli.global.config, Some(PathBuf::from("mongrate.toml")));
        assert_eq!(cli.global.migrations_dir, Some(PathBuf::from("./db")));
        assert!(cli.global.json_logs);
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["mongrate", "down"]).is_err());
    }

    #[test]
    fn test_load_config_file_with_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mongrate.toml");
        fs::write(
            &path,
            r#"
[mongo]
host = "db.internal"
username = "root"
password = "secret"

[migrations]
dir = "/srv/migrations"
"#,
        )
        .unwrap();

        let args = GlobalArgs {
            config: Some(path),
            migrations_dir: Some(PathBuf::from("/tmp/override")),
            json_logs: false,
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.mongo.host, "db.internal");
        assert_eq!(config.migrations.dir, PathBuf::from("/tmp/override"));
    }

    #[test]
    fn test_invalid_config_keeps_exit_code() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mongrate.toml");
        fs::write(&path, "[mongo]\nhost = \"db\"\n").unwrap();

        let args = GlobalArgs {
            config: Some(path),
            ..Default::default()
        };
        let err = args.load_config().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrateError>(),
            Some(MigrateError::Config(_))
        ));
        assert_eq!(exit_code(&err), EXIT_MIGRATION_FAILED);
    }

    #[test]
    fn test_exit_codes() {
        let unreachable = anyhow::Error::from(MigrateError::Connectivity {
            attempts: 5,
            message: "connection refused".into(),
        });
        assert_eq!(exit_code(&unreachable), EXIT_CONNECTIVITY_FAILED);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&other), EXIT_MIGRATION_FAILED);
    }
}
