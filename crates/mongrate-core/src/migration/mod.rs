mod entry;
mod state;

pub use entry::LedgerEntry;
pub use state::PairState;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use mongodb::bson::Document;

use crate::context::ExecutionContext;
use crate::error::Result;

/// A handle to one target database, passed to migration bodies.
pub trait DatabaseHandle: Send + Sync {
    /// Database name.
    fn name(&self) -> &str;

    /// Run a database command and return the server's reply.
    fn run_command(
        &self,
        command: Document,
    ) -> Pin<Box<dyn Future<Output = Result<Document>> + Send + '_>>;

    /// The underlying driver handle, when backed by a live server.
    fn mongo(&self) -> Option<&mongodb::Database> {
        None
    }
}

/// A forward data transformation with a compensating rollback.
pub trait MigrationUnit: Send + Sync {
    /// Human-readable description stored in the ledger.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Explicit target databases. `None` means every eligible database.
    fn target_databases(&self) -> Option<&[String]> {
        None
    }

    /// Apply the migration to one database.
    fn execute<'a>(
        &'a self,
        db: &'a dyn DatabaseHandle,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Undo a failed execution on one database.
    fn rollback<'a>(
        &'a self,
        db: &'a dyn DatabaseHandle,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// A migration unit together with its catalog identity and ordering key.
#[derive(Clone)]
pub struct DiscoveredUnit {
    /// Catalog path; the ledger key.
    pub name: String,
    /// Filesystem access time when discovered.
    pub accessed_at: SystemTime,
    /// The unit itself.
    pub unit: Arc<dyn MigrationUnit>,
}

impl DiscoveredUnit {
    pub fn new(
        name: impl Into<String>,
        accessed_at: SystemTime,
        unit: Arc<dyn MigrationUnit>,
    ) -> Self {
        Self {
            name: name.into(),
            accessed_at,
            unit,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.unit.description()
    }
}

impl std::fmt::Debug for DiscoveredUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredUnit")
            .field("name", &self.name)
            .field("accessed_at", &self.accessed_at)
            .field("description", &self.unit.description())
            .field("target_databases", &self.unit.target_databases())
            .finish()
    }
}
