use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use crate::context::ExecutionContext;
use crate::error::{MigrateError, Result};
use crate::migration::{DatabaseHandle, MigrationUnit};

/// One invocation of a [`ScriptedUnit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitCall {
    Execute { unit: String, database: String },
    Rollback { unit: String, database: String },
}

/// Call log that several units can share to assert cross-unit ordering.
pub type CallJournal = Arc<RwLock<Vec<UnitCall>>>;

/// A migration unit with scripted outcomes.
pub struct ScriptedUnit {
    label: String,
    description: Option<String>,
    targets: Option<Vec<String>>,
    fail_execute_on: HashSet<String>,
    fail_rollback: bool,
    journal: CallJournal,
}

impl ScriptedUnit {
    /// A unit that succeeds everywhere.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            targets: None,
            fail_execute_on: HashSet::new(),
            fail_rollback: false,
            journal: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare explicit target databases.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Fail `execute` for `database`.
    pub fn failing_on(mut self, database: &str) -> Self {
        self.fail_execute_on.insert(database.to_string());
        self
    }

    /// Fail every `rollback`.
    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    /// Record calls into a shared journal.
    pub fn sharing(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// All calls journaled so far (including other units sharing the journal).
    pub fn calls(&self) -> Vec<UnitCall> {
        self.journal.read().unwrap().clone()
    }

    /// Databases this unit's `execute` ran against, in order.
    pub fn executed_on(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                UnitCall::Execute { unit, database } if unit == self.label => Some(database),
                _ => None,
            })
            .collect()
    }

    /// Databases this unit's `rollback` ran against, in order.
    pub fn rolled_back_on(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                UnitCall::Rollback { unit, database } if unit == self.label => Some(database),
                _ => None,
            })
            .collect()
    }
}

impl MigrationUnit for ScriptedUnit {
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn target_databases(&self) -> Option<&[String]> {
        self.targets.as_deref()
    }

    fn execute<'a>(
        &'a self,
        db: &'a dyn DatabaseHandle,
        _ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.journal.write().unwrap().push(UnitCall::Execute {
                unit: self.label.clone(),
                database: db.name().to_string(),
            });

            if self.fail_execute_on.contains(db.name()) {
                return Err(MigrateError::Command(format!(
                    "{} failed on {}",
                    self.label,
                    db.name()
                )));
            }
            Ok(())
        })
    }

    fn rollback<'a>(
        &'a self,
        db: &'a dyn DatabaseHandle,
        _ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.journal.write().unwrap().push(UnitCall::Rollback {
                unit: self.label.clone(),
                database: db.name().to_string(),
            });

            if self.fail_rollback {
                return Err(MigrateError::Rollback(format!(
                    "{} could not be undone on {}",
                    self.label,
                    db.name()
                )));
            }
            Ok(())
        })
    }
}
