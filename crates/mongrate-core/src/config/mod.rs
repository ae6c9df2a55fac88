mod mongo;

pub use mongo::MongoConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MigrateError, Result};

pub const ENV_MONGO_HOST: &str = "MONGO_HOST";
pub const ENV_MONGO_PORT: &str = "MONGO_PORT";
pub const ENV_MONGO_USERNAME: &str = "MONGO_USERNAME";
pub const ENV_MONGO_PASSWORD: &str = "MONGO_PASSWORD";
pub const ENV_PING_MAX_RETRY: &str = "MONGO_PING_MAX_RETRY";
pub const ENV_PING_MAX_RETRY_SLEEP: &str = "MONGO_PING_MAX_RETRY_SLEEP";
pub const ENV_MIGRATIONS_DIR: &str = "MIGRATIONS_DIR";
pub const ENV_MIGRATIONS_DB: &str = "MIGRATIONS_DB";
pub const ENV_MIGRATIONS_EXTENSIONS: &str = "MIGRATIONS_EXTENSIONS";

/// Databases that belong to the server itself and are never migrated.
pub const SYSTEM_DATABASES: [&str; 3] = ["admin", "config", "local"];

/// Root configuration for MONGRATE.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// Data store connection.
    #[serde(default)]
    pub mongo: MongoConfig,

    /// Connectivity probe policy.
    #[serde(default)]
    pub ping: PingConfig,

    /// Migration discovery and bookkeeping.
    #[serde(default)]
    pub migrations: MigrationsConfig,
}

impl MigrateConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mongo = MongoConfig {
            host: var(ENV_MONGO_HOST).unwrap_or_else(mongo::default_host),
            port: parse_var(&var, ENV_MONGO_PORT)?.unwrap_or_else(mongo::default_port),
            username: require_var(&var, ENV_MONGO_USERNAME)?,
            password: require_var(&var, ENV_MONGO_PASSWORD)?,
        };

        let ping = PingConfig {
            max_retry: parse_var(&var, ENV_PING_MAX_RETRY)?.unwrap_or_else(default_max_retry),
            retry_sleep_ms: parse_var(&var, ENV_PING_MAX_RETRY_SLEEP)?
                .unwrap_or_else(default_retry_sleep_ms),
        };

        let migrations = MigrationsConfig {
            dir: var(ENV_MIGRATIONS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(default_migrations_dir),
            ledger_name: var(ENV_MIGRATIONS_DB).unwrap_or_else(default_ledger_name),
            extensions: var(ENV_MIGRATIONS_EXTENSIONS)
                .map(|v| split_extensions(&v))
                .unwrap_or_else(default_extensions),
        };

        Ok(Self {
            mongo,
            ping,
            migrations,
        })
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MigrateError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| MigrateError::Config(format!("Failed to parse config: {}", e)))?;
        config.migrations.extensions = config
            .migrations
            .extensions
            .iter()
            .flat_map(|e| split_extensions(e))
            .collect();
        config.validate()?;
        Ok(config)
    }

    /// Check that required settings are present.
    pub fn validate(&self) -> Result<()> {
        if self.mongo.username.is_empty() {
            return Err(missing(ENV_MONGO_USERNAME));
        }
        if self.mongo.password.is_empty() {
            return Err(missing(ENV_MONGO_PASSWORD));
        }
        if self.migrations.ledger_name.is_empty() {
            return Err(MigrateError::Config("ledger name must not be empty".into()));
        }
        if self.migrations.extensions.is_empty() {
            return Err(MigrateError::Config(
                "at least one migration file extension is required".into(),
            ));
        }
        Ok(())
    }

    /// Databases excluded from targeting: the system databases plus the ledger's own.
    pub fn reserved_databases(&self) -> Vec<String> {
        SYSTEM_DATABASES
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(self.migrations.ledger_name.clone()))
            .collect()
    }
}

/// Connectivity probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingConfig {
    /// Failed probes tolerated before giving up.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    /// Sleep between probes in milliseconds.
    #[serde(default = "default_retry_sleep_ms")]
    pub retry_sleep_ms: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            max_retry: default_max_retry(),
            retry_sleep_ms: default_retry_sleep_ms(),
        }
    }
}

impl PingConfig {
    pub fn retry_sleep(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms)
    }
}

fn default_max_retry() -> u32 {
    5
}

fn default_retry_sleep_ms() -> u64 {
    10_000
}

/// Migration discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Root of the migration tree.
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,

    /// Name of the ledger collection kept in every target database.
    /// A database with this name is also excluded from targeting.
    #[serde(default = "default_ledger_name")]
    pub ledger_name: String,

    /// File extensions loaded as migrations, without the leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            ledger_name: default_ledger_name(),
            extensions: default_extensions(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("/migrations")
}

fn default_ledger_name() -> String {
    "_migration".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn missing(key: &str) -> MigrateError {
    MigrateError::Config(format!("missing environment variable {}", key))
}

fn require_var(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    var(key).ok_or_else(|| missing(key))
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| MigrateError::Config(format!("invalid value for {}: {}", key, e)))
        })
        .transpose()
}

fn split_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern");

    for cap in re.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
