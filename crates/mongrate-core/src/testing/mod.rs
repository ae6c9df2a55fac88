//! Testing utilities for MONGRATE.
//!
//! In-memory substitutes for the data store and for migration units, so the
//! runner can be exercised end to end without a MongoDB server:
//! - [`MemoryStore`]: scripted ping failures, a database list, ledger
//!   collections and a log of every command run against a database
//! - [`ScriptedUnit`]: a migration unit whose outcome per database is
//!   configured up front and whose calls are journaled
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new().with_databases(["shop", "billing"]));
//! let unit = Arc::new(ScriptedUnit::new("001").failing_on("billing"));
//!
//! let report = runner.run_units(&[discovered("001", unit.clone())]).await;
//! assert_eq!(unit.executed_on(), vec!["shop", "billing"]);
//! ```

mod store;
mod unit;

pub use store::{MemoryDatabase, MemoryStore, RecordedCommand};
pub use unit::{CallJournal, ScriptedUnit, UnitCall};
