//! Migration discovery.
//!
//! Walks the migration tree, loads every file whose extension passes the
//! filter and orders the result by filesystem access time, oldest first.

mod command;

pub use command::CommandMigration;

use std::path::Path;
use std::sync::Arc;

use mongrate_core::config::MigrationsConfig;
use mongrate_core::error::{MigrateError, Result};
use mongrate_core::migration::DiscoveredUnit;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Discovers migration units under a directory tree.
pub struct Catalog {
    extensions: Vec<String>,
}

impl Catalog {
    /// Create a catalog accepting the given extensions (without leading dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| {
                    let e: String = e.into();
                    e.trim_start_matches('.').to_ascii_lowercase()
                })
                .collect(),
        }
    }

    pub fn from_config(config: &MigrationsConfig) -> Self {
        Self::new(config.extensions.iter().cloned())
    }

    /// Whether `path` passes the extension filter.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Discover all units under `root`, ordered by access time ascending.
    ///
    /// Units with equal access times keep traversal order; traversal visits
    /// directory entries sorted by file name.
    pub fn discover(&self, root: &Path) -> Result<Vec<DiscoveredUnit>> {
        if !root.is_dir() {
            return Err(MigrateError::Catalog(format!(
                "{} is not a readable directory",
                root.display()
            )));
        }

        let mut units = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                MigrateError::Catalog(format!("Failed to read {}: {}", root.display(), e))
            })?;
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if !self.accepts(path) {
                info!("filtered file {}", path.display());
                continue;
            }

            // Access time is read before the file is, so loading it can't shift the order.
            let metadata = entry.metadata().map_err(|e| {
                MigrateError::Catalog(format!("Failed to stat {}: {}", path.display(), e))
            })?;
            let accessed_at = metadata
                .accessed()
                .or_else(|_| metadata.modified())
                .map_err(|e| {
                    MigrateError::Catalog(format!(
                        "Failed to read timestamps of {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            let unit = CommandMigration::from_file(path).map_err(|e| {
                MigrateError::Catalog(format!(
                    "Failed to load migration {}: {}",
                    path.display(),
                    e
                ))
            })?;

            let name = path.display().to_string();
            debug!("Loaded migration {}", name);
            units.push(DiscoveredUnit::new(name, accessed_at, Arc::new(unit)));
        }

        units.sort_by_key(|u| u.accessed_at);

        info!("Discovered {} migration(s) in {}", units.len(), root.display());
        Ok(units)
    }
}
