//! File-backed migration units made of MongoDB database commands.
//!
//! A unit file looks like:
//!
//! ```json
//! {
//!   "description": "index orders by timestamp",
//!   "targetDatabases": ["billing"],
//!   "execute":  [{ "createIndexes": "orders", "indexes": [{ "key": { "ts": 1 }, "name": "ts_1" }] }],
//!   "rollback": [{ "dropIndexes": "orders", "index": "ts_1" }]
//! }
//! ```
//!
//! String values that are exactly `${uuid}`, `${now}`, `${now_iso}` or
//! `${hash:<secret>}` are expanded from the execution context before the
//! command is sent.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use mongodb::bson::{self, Bson, Document};
use serde::Deserialize;
use tracing::debug;

use mongrate_core::context::ExecutionContext;
use mongrate_core::error::Result;
use mongrate_core::migration::{DatabaseHandle, MigrationUnit};

/// A migration defined as ordered lists of database commands.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandMigration {
    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    target_databases: Option<Vec<String>>,

    execute: Vec<Document>,

    #[serde(default)]
    rollback: Vec<Document>,
}

impl CommandMigration {
    /// Parse a unit from JSON text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a unit from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn execute_commands(&self) -> &[Document] {
        &self.execute
    }

    pub fn rollback_commands(&self) -> &[Document] {
        &self.rollback
    }
}

impl MigrationUnit for CommandMigration {
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn target_databases(&self) -> Option<&[String]> {
        self.target_databases.as_deref()
    }

    fn execute<'a>(
        &'a self,
        db: &'a dyn DatabaseHandle,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(run_commands(&self.execute, db, ctx))
    }

    fn rollback<'a>(
        &'a self,
        db: &'a dyn DatabaseHandle,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(run_commands(&self.rollback, db, ctx))
    }
}

async fn run_commands(
    commands: &[Document],
    db: &dyn DatabaseHandle,
    ctx: &ExecutionContext,
) -> Result<()> {
    for (idx, command) in commands.iter().enumerate() {
        let command = expand_document(command, ctx)?;
        debug!(
            "Running command #{} ({}) on {}",
            idx + 1,
            command.keys().next().map(String::as_str).unwrap_or("?"),
            db.name()
        );
        db.run_command(command).await?;
    }
    Ok(())
}

fn expand_document(doc: &Document, ctx: &ExecutionContext) -> Result<Document> {
    let mut expanded = Document::new();
    for (key, value) in doc {
        expanded.insert(key.clone(), expand_value(value, ctx)?);
    }
    Ok(expanded)
}

fn expand_value(value: &Bson, ctx: &ExecutionContext) -> Result<Bson> {
    match value {
        Bson::String(s) => expand_placeholder(s, ctx),
        Bson::Document(doc) => Ok(Bson::Document(expand_document(doc, ctx)?)),
        Bson::Array(items) => items
            .iter()
            .map(|item| expand_value(item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Bson::Array),
        other => Ok(other.clone()),
    }
}

fn expand_placeholder(value: &str, ctx: &ExecutionContext) -> Result<Bson> {
    let Some(name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) else {
        return Ok(Bson::String(value.to_string()));
    };

    let expanded = match name {
        "uuid" => Bson::String(ctx.uuid()),
        "now" => Bson::DateTime(bson::DateTime::from_millis(ctx.now().timestamp_millis())),
        "now_iso" => Bson::String(ctx.now_iso()),
        _ => match name.strip_prefix("hash:") {
            Some(secret) => Bson::String(ctx.hash_password(secret)?),
            None => Bson::String(value.to_string()),
        },
    };
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mongodb::bson::doc;
    use mongrate_core::context::FixedClock;
    use mongrate_core::store::DataStore;
    use mongrate_core::testing::MemoryStore;

    const UNIT: &str = r#"{
        "description": "seed admin user",
        "targetDatabases": ["billing"],
        "execute": [
            { "insert": "users", "documents": [
                { "_id": "${uuid}", "password": "${hash:changeme}", "createdAt": "${now}", "note": "${unknown}" }
            ] }
        ],
        "rollback": [ { "delete": "users", "deletes": [ { "q": {}, "limit": 0 } ] } ]
    }"#;

    fn frozen() -> ExecutionContext {
        ExecutionContext::with_clock(FixedClock(
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_parse_metadata() {
        let unit = CommandMigration::parse(UNIT).unwrap();
        assert_eq!(unit.description(), Some("seed admin user"));
        assert_eq!(unit.target_databases(), Some(&["billing".to_string()][..]));
        assert_eq!(unit.execute_commands().len(), 1);
        assert_eq!(unit.rollback_commands().len(), 1);
    }

    #[test]
    fn test_parse_minimal() {
        let unit = CommandMigration::parse(r#"{ "execute": [ { "create": "orders" } ] }"#).unwrap();
        assert!(unit.description().is_none());
        assert!(unit.target_databases().is_none());
        assert!(unit.rollback_commands().is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        assert!(CommandMigration::parse(r#"{ "execute": [], "targetDatabase": ["x"] }"#).is_err());
        assert!(CommandMigration::parse(r#"{ "rollback": [] }"#).is_err());
    }

    #[test]
    fn test_placeholders_expanded() {
        let ctx = frozen();
        let unit = CommandMigration::parse(UNIT).unwrap();
        let expanded = expand_document(&unit.execute_commands()[0], &ctx).unwrap();

        let user = expanded.get_array("documents").unwrap()[0]
            .as_document()
            .unwrap();
        assert_eq!(user.get_str("_id").unwrap().len(), 32);
        assert!(ctx
            .verify_password("changeme", user.get_str("password").unwrap())
            .unwrap());
        assert_eq!(
            user.get_datetime("createdAt").unwrap().timestamp_millis(),
            ctx.now().timestamp_millis()
        );
        assert_eq!(user.get_str("note").unwrap(), "${unknown}");
    }

    #[test]
    fn test_embedded_placeholders_left_alone() {
        let ctx = frozen();
        let expanded = expand_document(&doc! { "note": "created ${now_iso}" }, &ctx).unwrap();
        assert_eq!(expanded.get_str("note").unwrap(), "created ${now_iso}");

        let expanded = expand_document(&doc! { "at": "${now_iso}" }, &ctx).unwrap();
        assert_eq!(expanded.get_str("at").unwrap(), "2024-05-01T10:00:00.000Z");
    }

    #[tokio::test]
    async fn test_execute_runs_commands_in_order() {
        let store = MemoryStore::new();
        let db = store.database("billing");
        let unit = CommandMigration::parse(
            r#"{ "execute": [ { "create": "orders" }, { "createIndexes": "orders", "indexes": [] } ] }"#,
        )
        .unwrap();

        unit.execute(db.as_ref(), &frozen()).await.unwrap();

        let names: Vec<_> = store
            .commands()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["create", "createIndexes"]);
    }

    #[tokio::test]
    async fn test_execute_stops_at_first_failure() {
        let store = MemoryStore::new().failing_command("create");
        let db = store.database("billing");
        let unit = CommandMigration::parse(
            r#"{ "execute": [ { "create": "orders" }, { "createIndexes": "orders", "indexes": [] } ] }"#,
        )
        .unwrap();

        assert!(unit.execute(db.as_ref(), &frozen()).await.is_err());
        assert_eq!(store.commands().len(), 1);
    }
}
