pub mod catalog;
pub mod db;
pub mod gate;
pub mod ledger;
pub mod resolver;
pub mod runner;

pub use catalog::{Catalog, CommandMigration};
pub use db::{MongoDatabase, MongoStore};
pub use gate::ConnectivityGate;
pub use ledger::Ledger;
pub use resolver::TargetResolver;
pub use runner::{
    MigrationRunner, PairRef, RunReport, RunnerDependencies, TargetStatus, UnitStatus,
};
