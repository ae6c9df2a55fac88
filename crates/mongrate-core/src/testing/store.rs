use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use mongodb::bson::{self, doc, Document};

use crate::error::{MigrateError, Result};
use crate::migration::{DatabaseHandle, LedgerEntry};
use crate::store::DataStore;

/// A command received by a [`MemoryDatabase`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    /// Database the command ran against.
    pub database: String,
    /// The command document as sent.
    pub command: Document,
}

impl RecordedCommand {
    /// Command name (first key of the document).
    pub fn name(&self) -> &str {
        self.command.keys().next().map(String::as_str).unwrap_or("")
    }
}

type CommandLog = Arc<RwLock<Vec<RecordedCommand>>>;

/// In-memory data store.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::new()
///     .with_databases(["admin", "shop", "billing"])
///     .with_ping_failures(2);
/// ```
pub struct MemoryStore {
    databases: RwLock<Vec<String>>,
    ping_failures: AtomicU32,
    ping_attempts: AtomicU32,
    list_calls: AtomicU32,
    ledgers: RwLock<HashMap<(String, String), Vec<Document>>>,
    lookups: RwLock<Vec<(String, String)>>,
    failing_reads: RwLock<HashSet<String>>,
    failing_writes: RwLock<HashSet<String>>,
    failing_commands: Arc<RwLock<HashSet<String>>>,
    commands: CommandLog,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, reachable store.
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(Vec::new()),
            ping_failures: AtomicU32::new(0),
            ping_attempts: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
            ledgers: RwLock::new(HashMap::new()),
            lookups: RwLock::new(Vec::new()),
            failing_reads: RwLock::new(HashSet::new()),
            failing_writes: RwLock::new(HashSet::new()),
            failing_commands: Arc::new(RwLock::new(HashSet::new())),
            commands: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Databases reported by `list_database_names`, in order.
    pub fn with_databases<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.databases.write().unwrap() = names.into_iter().map(Into::into).collect();
        self
    }

    /// Fail the next `count` pings.
    pub fn with_ping_failures(self, count: u32) -> Self {
        self.ping_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every ping.
    pub fn unreachable(self) -> Self {
        self.with_ping_failures(u32::MAX)
    }

    /// Seed a ledger entry.
    pub fn with_entry(self, database: &str, collection: &str, entry: LedgerEntry) -> Self {
        let document = bson::to_document(&entry).unwrap();
        self.with_raw_entry(database, collection, document)
    }

    /// Seed a ledger document as stored, whatever its shape.
    pub fn with_raw_entry(self, database: &str, collection: &str, document: Document) -> Self {
        self.push_document(database, collection, document);
        self
    }

    /// Make ledger lookups against `database` fail.
    pub fn failing_ledger_reads(self, database: &str) -> Self {
        self.failing_reads.write().unwrap().insert(database.to_string());
        self
    }

    /// Make ledger inserts into `database` fail.
    pub fn failing_ledger_writes(self, database: &str) -> Self {
        self.failing_writes.write().unwrap().insert(database.to_string());
        self
    }

    /// Make every command whose name is `command` fail.
    pub fn failing_command(self, command: &str) -> Self {
        self.failing_commands
            .write()
            .unwrap()
            .insert(command.to_string());
        self
    }

    /// Add a database after construction.
    pub fn add_database(&self, name: &str) {
        self.databases.write().unwrap().push(name.to_string());
    }

    /// Number of pings received.
    pub fn ping_attempts(&self) -> u32 {
        self.ping_attempts.load(Ordering::SeqCst)
    }

    /// Number of `list_database_names` calls received.
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Ledger entries in `database.collection`, in insertion order.
    ///
    /// Documents that do not decode as a [`LedgerEntry`] are left out.
    pub fn entries(&self, database: &str, collection: &str) -> Vec<LedgerEntry> {
        self.documents(database, collection)
            .into_iter()
            .filter_map(|d| bson::from_document(d).ok())
            .collect()
    }

    /// Raw ledger documents in `database.collection`, in insertion order.
    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.ledgers
            .read()
            .unwrap()
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn push_document(&self, database: &str, collection: &str, document: Document) {
        self.ledgers
            .write()
            .unwrap()
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .push(document);
    }

    fn named_document(&self, database: &str, collection: &str, name: &str) -> Option<Document> {
        self.documents(database, collection)
            .into_iter()
            .find(|d| d.get_str("name").ok() == Some(name))
    }

    fn record_lookup(&self, database: &str, collection: &str, name: &str) -> Result<()> {
        self.lookups
            .write()
            .unwrap()
            .push((database.to_string(), name.to_string()));

        if self.failing_reads.read().unwrap().contains(database) {
            return Err(MigrateError::Storage(format!(
                "find on {}.{} failed",
                database, collection
            )));
        }
        Ok(())
    }

    /// Every `(database, unit name)` ledger lookup, in order.
    pub fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.read().unwrap().clone()
    }

    /// Every command run against any database, in order.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.read().unwrap().clone()
    }
}

impl DataStore for MemoryStore {
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.ping_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.ping_failures.load(Ordering::SeqCst);
        let result = if remaining == 0 {
            Ok(())
        } else {
            if remaining != u32::MAX {
                self.ping_failures.fetch_sub(1, Ordering::SeqCst);
            }
            Err(MigrateError::Storage("connection refused".into()))
        };

        Box::pin(async move { result })
    }

    fn list_database_names(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let names = self.databases.read().unwrap().clone();
        Box::pin(async move { Ok(names) })
    }

    fn database(&self, name: &str) -> Arc<dyn DatabaseHandle> {
        Arc::new(MemoryDatabase {
            name: name.to_string(),
            commands: self.commands.clone(),
            failing_commands: self.failing_commands.clone(),
        })
    }

    fn ledger_entry_exists<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        let result = self
            .record_lookup(database, collection, name)
            .map(|()| self.named_document(database, collection, name).is_some());

        Box::pin(async move { result })
    }

    fn find_ledger_entry<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<LedgerEntry>>> + Send + 'a>> {
        let result = self.record_lookup(database, collection, name).and_then(|()| {
            self.named_document(database, collection, name)
                .map(|d| {
                    bson::from_document(d).map_err(|e| {
                        MigrateError::Storage(format!(
                            "Failed to decode ledger entry {} in {}.{}: {}",
                            name, database, collection, e
                        ))
                    })
                })
                .transpose()
        });

        Box::pin(async move { result })
    }

    fn insert_ledger_entry<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        entry: &'a LedgerEntry,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        let result = if self.failing_writes.read().unwrap().contains(database) {
            Err(MigrateError::Storage(format!(
                "insert into {}.{} failed",
                database, collection
            )))
        } else {
            bson::to_document(entry)
                .map(|document| self.push_document(database, collection, document))
                .map_err(|e| MigrateError::Serialization(e.to_string()))
        };

        Box::pin(async move { result })
    }
}

/// Database handle produced by [`MemoryStore::database`].
pub struct MemoryDatabase {
    name: String,
    commands: CommandLog,
    failing_commands: Arc<RwLock<HashSet<String>>>,
}

impl DatabaseHandle for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_command(
        &self,
        command: Document,
    ) -> Pin<Box<dyn Future<Output = Result<Document>> + Send + '_>> {
        let recorded = RecordedCommand {
            database: self.name.clone(),
            command,
        };
        let fails = self
            .failing_commands
            .read()
            .unwrap()
            .contains(recorded.name());
        let result = if fails {
            Err(MigrateError::Command(format!(
                "command {} failed on {}",
                recorded.name(),
                self.name
            )))
        } else {
            Ok(doc! { "ok": 1 })
        };
        self.commands.write().unwrap().push(recorded);

        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_ping_failures_then_success() {
        let store = MemoryStore::new().with_ping_failures(2);
        assert!(store.ping().await.is_err());
        assert!(store.ping().await.is_err());
        assert!(store.ping().await.is_ok());
        assert_eq!(store.ping_attempts(), 3);
    }

    #[tokio::test]
    async fn test_ledger_insert_and_find() {
        let store = MemoryStore::new();
        let entry = LedgerEntry::new("001.json", Utc::now(), None);

        assert!(store
            .find_ledger_entry("shop", "_migration", "001.json")
            .await
            .unwrap()
            .is_none());
        store
            .insert_ledger_entry("shop", "_migration", &entry)
            .await
            .unwrap();
        assert_eq!(
            store
                .find_ledger_entry("shop", "_migration", "001.json")
                .await
                .unwrap(),
            Some(entry)
        );
        assert!(store.entries("billing", "_migration").is_empty());
        assert_eq!(store.lookups().len(), 2);
    }

    #[tokio::test]
    async fn test_raw_entry_presence() {
        let store = MemoryStore::new().with_raw_entry(
            "shop",
            "_migration",
            doc! { "name": "001.json", "executedAt": "yesterday" },
        );

        assert!(store
            .ledger_entry_exists("shop", "_migration", "001.json")
            .await
            .unwrap());
        assert!(!store
            .ledger_entry_exists("shop", "_migration", "002.json")
            .await
            .unwrap());

        let entry = store
            .find_ledger_entry("shop", "_migration", "001.json")
            .await
            .unwrap()
            .unwrap();
        assert!(entry.executed_at.is_none());
        assert_eq!(store.documents("shop", "_migration").len(), 1);
    }

    #[tokio::test]
    async fn test_commands_recorded_and_failable() {
        let store = MemoryStore::new().failing_command("drop");
        let db = store.database("shop");

        db.run_command(doc! { "create": "orders" }).await.unwrap();
        assert!(db.run_command(doc! { "drop": "orders" }).await.is_err());

        let commands = store.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].database, "shop");
        assert_eq!(commands[0].name(), "create");
    }
}
