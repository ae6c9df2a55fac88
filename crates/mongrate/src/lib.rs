//! MONGRATE: ordered, idempotent migrations for every database on a MongoDB server.
//!
//! The `mongrate` binary discovers command-document migrations on disk. Programs
//! that compile their own [`MigrationUnit`](prelude::MigrationUnit)s can drive
//! the same runner through [`MigrationRunner::run_units`](prelude::MigrationRunner::run_units).

pub use mongrate_core as core;
pub use mongrate_runtime as runtime;

/// Everything needed to configure and run migrations.
pub mod prelude {
    pub use mongrate_core::config::{MigrateConfig, MigrationsConfig, MongoConfig, PingConfig};
    pub use mongrate_core::context::{Clock, ExecutionContext, SystemClock};
    pub use mongrate_core::error::{
        MigrateError, Result, RollbackOutcome, EXIT_CONNECTIVITY_FAILED, EXIT_MIGRATION_FAILED,
    };
    pub use mongrate_core::migration::{DatabaseHandle, DiscoveredUnit, LedgerEntry, MigrationUnit};
    pub use mongrate_core::store::DataStore;
    pub use mongrate_runtime::{
        CommandMigration, MigrationRunner, MongoStore, RunReport, RunnerDependencies,
        TargetStatus, UnitStatus,
    };
}
