pub mod config;
pub mod context;
pub mod error;
pub mod migration;
pub mod store;

#[cfg(feature = "testing")]
pub mod testing;

pub use config::MigrateConfig;
pub use context::{Clock, ExecutionContext, FixedClock, SystemClock};
pub use error::{MigrateError, Result, RollbackOutcome};
pub use migration::{DatabaseHandle, DiscoveredUnit, LedgerEntry, MigrationUnit, PairState};
pub use store::DataStore;
