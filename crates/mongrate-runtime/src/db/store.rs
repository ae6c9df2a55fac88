use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, Credential};
use mongodb::Client;

use mongrate_core::config::MongoConfig;
use mongrate_core::error::{MigrateError, Result};
use mongrate_core::migration::{DatabaseHandle, LedgerEntry};
use mongrate_core::store::DataStore;

const APP_NAME: &str = "mongrate";

/// MongoDB-backed data store.
///
/// Holds one client for the whole process; the driver connects lazily on the
/// first operation.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Create a client from configuration. Does not contact the server.
    pub async fn from_config(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(config.address_uri())
            .await
            .map_err(|e| MigrateError::Config(format!("Invalid MongoDB address: {}", e)))?;

        options.app_name = Some(APP_NAME.to_string());
        options.credential = Some(
            Credential::builder()
                .username(config.username.clone())
                .password(config.password.clone())
                .build(),
        );

        let client = Client::with_options(options)
            .map_err(|e| MigrateError::Storage(format!("Failed to create client: {}", e)))?;

        tracing::debug!("MongoDB client created for {}", config.redacted_uri());
        Ok(Self { client })
    }

    /// The underlying driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl DataStore for MongoStore {
    fn ping(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .database("admin")
                .run_command(doc! { "ping": 1 })
                .await
                .map_err(|e| MigrateError::Storage(format!("Ping failed: {}", e)))?;
            Ok(())
        })
    }

    fn list_database_names(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .list_database_names()
                .await
                .map_err(|e| MigrateError::Storage(format!("Failed to list databases: {}", e)))
        })
    }

    fn database(&self, name: &str) -> Arc<dyn DatabaseHandle> {
        Arc::new(MongoDatabase {
            inner: self.client.database(name),
        })
    }

    fn ledger_entry_exists<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let found = self
                .client
                .database(database)
                .collection::<Document>(collection)
                .find_one(doc! { "name": name })
                .projection(doc! { "_id": 1 })
                .await
                .map_err(|e| {
                    MigrateError::Storage(format!(
                        "Failed to read ledger {}.{}: {}",
                        database, collection, e
                    ))
                })?;
            Ok(found.is_some())
        })
    }

    fn find_ledger_entry<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<LedgerEntry>>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .database(database)
                .collection::<LedgerEntry>(collection)
                .find_one(doc! { "name": name })
                .await
                .map_err(|e| {
                    MigrateError::Storage(format!(
                        "Failed to read ledger {}.{}: {}",
                        database, collection, e
                    ))
                })
        })
    }

    fn insert_ledger_entry<'a>(
        &'a self,
        database: &'a str,
        collection: &'a str,
        entry: &'a LedgerEntry,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .database(database)
                .collection::<LedgerEntry>(collection)
                .insert_one(entry)
                .await
                .map_err(|e| {
                    MigrateError::Storage(format!(
                        "Failed to record {} in {}.{}: {}",
                        entry.name, database, collection, e
                    ))
                })?;
            Ok(())
        })
    }
}

/// Handle to one database on a [`MongoStore`].
pub struct MongoDatabase {
    inner: mongodb::Database,
}

impl DatabaseHandle for MongoDatabase {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn run_command(
        &self,
        command: Document,
    ) -> Pin<Box<dyn Future<Output = Result<Document>> + Send + '_>> {
        Box::pin(async move {
            self.inner.run_command(command).await.map_err(|e| {
                MigrateError::Command(format!("Command failed on {}: {}", self.inner.name(), e))
            })
        })
    }

    fn mongo(&self) -> Option<&mongodb::Database> {
        Some(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anything beyond client construction needs a live server.

    #[tokio::test]
    async fn test_client_creation_is_lazy() {
        let config = MongoConfig {
            host: "127.0.0.1".into(),
            port: 1,
            username: "root".into(),
            password: "secret".into(),
        };

        let store = MongoStore::from_config(&config).await.unwrap();
        let handle = store.database("shop");
        assert_eq!(handle.name(), "shop");
        assert!(handle.mongo().is_some());
    }
}
