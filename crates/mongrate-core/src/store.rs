use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::migration::{DatabaseHandle, LedgerEntry};

/// The data store the runner migrates.
///
/// Implemented over MongoDB by the runtime; tests use an in-memory store.
pub trait DataStore: Send + Sync {
    /// Lightweight liveness probe.
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Names of all databases on the server, in server order.
    fn list_database_names(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>>;

    /// Handle to a database. Does not touch the server.
    fn database(&self, name: &str) -> Arc<dyn DatabaseHandle>;

    /// Whether `database.collection` holds any entry named `name`.
    ///
    /// Presence only: the rest of the document is never read.
    fn ledger_entry_exists<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// Look up the ledger entry named `name` in `database.collection`.
    fn find_ledger_entry<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<LedgerEntry>>> + Send + 'a>>;

    /// Insert a ledger entry into `database.collection`.
    fn insert_ledger_entry<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        entry: &'a LedgerEntry,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
