use std::collections::HashSet;

use mongrate_core::migration::MigrationUnit;

/// Computes the databases each migration unit runs against.
///
/// The eligible set is captured once, at construction; databases created
/// afterwards are not picked up by units resolved later in the same run.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    allowed: Vec<String>,
    reserved: HashSet<String>,
}

impl TargetResolver {
    /// `all_databases` in data store order; `reserved` are never targeted.
    pub fn new<I, S>(all_databases: Vec<String>, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reserved: HashSet<String> = reserved.into_iter().map(Into::into).collect();
        let allowed = all_databases
            .into_iter()
            .filter(|db| !reserved.contains(db))
            .collect();

        Self { allowed, reserved }
    }

    /// Every eligible database, in data store order.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn is_reserved(&self, database: &str) -> bool {
        self.reserved.contains(database)
    }

    /// Effective targets for `unit`.
    ///
    /// An explicit list is used as declared, minus reserved names and
    /// duplicates, and may resolve to nothing. Otherwise all eligible databases.
    pub fn resolve(&self, unit: &dyn MigrationUnit) -> Vec<String> {
        match unit.target_databases() {
            Some(declared) => {
                let mut seen = HashSet::new();
                declared
                    .iter()
                    .filter(|db| !self.is_reserved(db))
                    .filter(|db| seen.insert(db.as_str()))
                    .cloned()
                    .collect()
            }
            None => self.allowed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongrate_core::testing::ScriptedUnit;

    fn resolver() -> TargetResolver {
        TargetResolver::new(
            vec![
                "admin".into(),
                "shop".into(),
                "config".into(),
                "billing".into(),
                "local".into(),
                "_migration".into(),
            ],
            ["admin", "config", "local", "_migration"],
        )
    }

    #[test]
    fn test_allowed_excludes_reserved_and_keeps_order() {
        assert_eq!(resolver().allowed(), ["shop", "billing"]);
    }

    #[test]
    fn test_implicit_targets() {
        let unit = ScriptedUnit::new("u");
        assert_eq!(resolver().resolve(&unit), vec!["shop", "billing"]);
    }

    #[test]
    fn test_explicit_targets_minus_reserved() {
        let unit = ScriptedUnit::new("u").with_targets(["billing", "admin", "archive", "billing"]);
        assert_eq!(resolver().resolve(&unit), vec!["billing", "archive"]);
    }

    #[test]
    fn test_explicit_targets_can_resolve_to_nothing() {
        let unit = ScriptedUnit::new("u").with_targets(["local", "_migration"]);
        assert!(resolver().resolve(&unit).is_empty());

        let unit = ScriptedUnit::new("u").with_targets(Vec::<String>::new());
        assert!(resolver().resolve(&unit).is_empty());
    }
}
