//! Migration runner.
//!
//! Applies every unit, in catalog order, to each of its target databases,
//! one pair at a time. A pair already in the ledger is skipped. A failed pair
//! is rolled back and ends the whole run: later databases and later units are
//! never attempted, and re-running the process resumes where it stopped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use mongrate_core::config::MigrateConfig;
use mongrate_core::context::ExecutionContext;
use mongrate_core::error::{MigrateError, Result, RollbackOutcome};
use mongrate_core::migration::{DiscoveredUnit, PairState};
use mongrate_core::store::DataStore;

use crate::catalog::Catalog;
use crate::gate::ConnectivityGate;
use crate::ledger::Ledger;
use crate::resolver::TargetResolver;

/// Everything the runner needs, constructed once per process.
#[derive(Clone)]
pub struct RunnerDependencies {
    /// Data store handle.
    pub store: Arc<dyn DataStore>,
    /// Context passed to every migration body.
    pub context: ExecutionContext,
    /// Configuration.
    pub config: MigrateConfig,
}

impl RunnerDependencies {
    pub fn new(store: Arc<dyn DataStore>, context: ExecutionContext, config: MigrateConfig) -> Self {
        Self {
            store,
            context,
            config,
        }
    }
}

/// A (unit, database) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRef {
    pub unit: String,
    pub database: String,
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Pairs executed and recorded during this run, in order.
    pub executed: Vec<PairRef>,
    /// Pairs skipped because the ledger already had them.
    pub skipped: Vec<PairRef>,
}

/// Ledger state of one unit on one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    pub database: String,
    /// The ledger has an entry for this unit.
    pub applied: bool,
    /// When the unit ran here, if the entry records it.
    pub executed_at: Option<DateTime<Utc>>,
}

/// Ledger state of one unit across its targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub name: String,
    pub description: Option<String>,
    pub targets: Vec<TargetStatus>,
}

impl UnitStatus {
    pub fn applied(&self) -> impl Iterator<Item = &TargetStatus> {
        self.targets.iter().filter(|t| t.applied)
    }

    pub fn pending(&self) -> impl Iterator<Item = &TargetStatus> {
        self.targets.iter().filter(|t| !t.applied)
    }
}

/// Orchestrates gate, catalog, resolver and ledger.
pub struct MigrationRunner<'a> {
    deps: &'a RunnerDependencies,
    ledger: Ledger,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(deps: &'a RunnerDependencies) -> Self {
        let ledger = Ledger::new(
            deps.store.clone(),
            deps.config.migrations.ledger_name.clone(),
        );
        Self { deps, ledger }
    }

    /// Gate connectivity, discover units from the configured directory and apply them.
    pub async fn run(&self) -> Result<RunReport> {
        self.ensure_reachable().await?;
        let units = self.discover()?;
        self.apply(&units).await
    }

    /// Gate connectivity and apply the given units, in the order given.
    pub async fn run_units(&self, units: &[DiscoveredUnit]) -> Result<RunReport> {
        self.ensure_reachable().await?;
        self.apply(units).await
    }

    /// Gate connectivity and report which discovered units are applied where.
    ///
    /// Read-only: nothing is executed or recorded.
    pub async fn status(&self) -> Result<Vec<UnitStatus>> {
        self.ensure_reachable().await?;
        let units = self.discover()?;
        self.inspect(&units).await
    }

    async fn ensure_reachable(&self) -> Result<()> {
        ConnectivityGate::new(self.deps.store.clone(), self.deps.config.ping.clone())
            .ensure_reachable()
            .await?;
        Ok(())
    }

    fn discover(&self) -> Result<Vec<DiscoveredUnit>> {
        let config = &self.deps.config.migrations;
        Catalog::from_config(config).discover(&config.dir)
    }

    async fn resolver(&self) -> Result<TargetResolver> {
        let databases = self.deps.store.list_database_names().await?;
        let resolver = TargetResolver::new(databases, self.deps.config.reserved_databases());
        debug!("Eligible databases: {:?}", resolver.allowed());
        Ok(resolver)
    }

    async fn apply(&self, units: &[DiscoveredUnit]) -> Result<RunReport> {
        let resolver = self.resolver().await?;
        let mut report = RunReport::default();

        for unit in units {
            info!("Current migration: {}", unit.name);

            for database in resolver.resolve(unit.unit.as_ref()) {
                let state = self.apply_pair(unit, &database).await?;
                let pair = PairRef {
                    unit: unit.name.clone(),
                    database,
                };
                match state {
                    PairState::Skipped => report.skipped.push(pair),
                    PairState::Recorded => report.executed.push(pair),
                    other => {
                        return Err(MigrateError::Internal(format!(
                            "migration {} for db {} stopped in state {}",
                            pair.unit, pair.database, other
                        )))
                    }
                }
            }
        }

        info!(
            "Done! {} executed, {} already applied",
            report.executed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Drive one pair to a terminal state. Aborted states come back as errors.
    async fn apply_pair(&self, unit: &DiscoveredUnit, database: &str) -> Result<PairState> {
        transition(unit, database, PairState::Pending);

        if self.ledger.has_run(database, &unit.name).await? {
            debug!(
                "Migration {} already in {}.{}, skipping",
                unit.name,
                database,
                self.ledger.collection()
            );
            transition(unit, database, PairState::Skipped);
            return Ok(PairState::Skipped);
        }

        info!(
            "Migration {} didn't run yet for db {}, executing...",
            unit.name, database
        );
        transition(unit, database, PairState::Running);

        let ctx = &self.deps.context;
        let db = self.deps.store.database(database);

        let result = match unit.unit.execute(db.as_ref(), ctx).await {
            Ok(()) => {
                self.ledger
                    .record_success(database, &unit.name, ctx.now(), unit.description())
                    .await
            }
            Err(e) => Err(e),
        };

        let cause = match result {
            Ok(()) => {
                info!("Migration {} for db {} ran successfully!", unit.name, database);
                transition(unit, database, PairState::Recorded);
                return Ok(PairState::Recorded);
            }
            Err(e) => e,
        };

        error!(
            "An error occurred while applying {} to db {}: {}; trying to roll back...",
            unit.name, database, cause
        );
        transition(unit, database, PairState::RollingBack);

        let rollback = match unit.unit.rollback(db.as_ref(), ctx).await {
            Ok(()) => {
                info!("Rolled back {} for db {}", unit.name, database);
                RollbackOutcome::Clean
            }
            Err(e) => {
                error!("Could not roll back {} for db {}: {}", unit.name, database, e);
                RollbackOutcome::Dirty(e.to_string())
            }
        };
        transition(unit, database, PairState::after_rollback(&rollback));

        Err(MigrateError::Execution {
            unit: unit.name.clone(),
            database: database.to_string(),
            message: cause.to_string(),
            rollback,
        })
    }

    async fn inspect(&self, units: &[DiscoveredUnit]) -> Result<Vec<UnitStatus>> {
        let resolver = self.resolver().await?;
        let mut statuses = Vec::with_capacity(units.len());

        for unit in units {
            let mut targets = Vec::new();
            for database in resolver.resolve(unit.unit.as_ref()) {
                let entry = self.ledger.find(&database, &unit.name).await?;
                targets.push(TargetStatus {
                    database,
                    applied: entry.is_some(),
                    executed_at: entry.and_then(|e| e.executed_at_utc()),
                });
            }

            statuses.push(UnitStatus {
                name: unit.name.clone(),
                description: unit.description().map(str::to_string),
                targets,
            });
        }

        Ok(statuses)
    }
}

fn transition(unit: &DiscoveredUnit, database: &str, state: PairState) {
    if state.is_aborted() {
        warn!(unit = %unit.name, database, state = state.as_str(), "pair aborted");
    } else {
        debug!(
            unit = %unit.name,
            database,
            state = state.as_str(),
            terminal = state.is_terminal(),
            "pair transition"
        );
    }
}
