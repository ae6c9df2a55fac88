use std::sync::Arc;

use chrono::{DateTime, Utc};
use mongrate_core::error::Result;
use mongrate_core::migration::LedgerEntry;
use mongrate_core::store::DataStore;

/// Per-database record of applied migration units.
///
/// Each target database keeps its own ledger collection. Entries are only
/// ever inserted: callers check [`Ledger::has_run`] before recording.
pub struct Ledger {
    store: Arc<dyn DataStore>,
    collection: String,
}

impl Ledger {
    pub fn new(store: Arc<dyn DataStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Name of the ledger collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The entry for `unit` in `database`, if it ran.
    pub async fn find(&self, database: &str, unit: &str) -> Result<Option<LedgerEntry>> {
        self.store
            .find_ledger_entry(database, &self.collection, unit)
            .await
    }

    /// Whether `unit` already ran against `database`.
    ///
    /// Any entry with that name counts, whatever else it holds.
    pub async fn has_run(&self, database: &str, unit: &str) -> Result<bool> {
        self.store
            .ledger_entry_exists(database, &self.collection, unit)
            .await
    }

    /// Record a successful execution. Plain insert, never an upsert.
    pub async fn record_success(
        &self,
        database: &str,
        unit: &str,
        executed_at: DateTime<Utc>,
        description: Option<&str>,
    ) -> Result<()> {
        let entry = LedgerEntry::new(unit, executed_at, description.map(str::to_string));
        self.store
            .insert_ledger_entry(database, &self.collection, &entry)
            .await
    }
}
