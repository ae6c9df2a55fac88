use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Record that a migration unit has been applied to a database.
///
/// Only `name` is required when reading. Entries written by hand or by
/// older tools may lack the other fields or store them with another type;
/// such fields read back as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unit identity (catalog path).
    pub name: String,
    /// When execution completed.
    #[serde(
        rename = "executedAt",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub executed_at: Option<bson::DateTime>,
    /// Unit description at the time it ran.
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
}

impl LedgerEntry {
    pub fn new(
        name: impl Into<String>,
        executed_at: DateTime<Utc>,
        description: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            executed_at: Some(bson::DateTime::from_millis(executed_at.timestamp_millis())),
            description,
        }
    }

    /// Execution time as a chrono timestamp, if the entry carries one.
    pub fn executed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.executed_at
            .and_then(|at| DateTime::from_timestamp_millis(at.timestamp_millis()))
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Bson>::deserialize(deserializer)?;
    Ok(value.and_then(|v| bson::from_bson(v).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson::doc;

    #[test]
    fn test_serialized_field_names() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let entry = LedgerEntry::new("/migrations/001.json", at, Some("seed".into()));

        let doc = bson::to_document(&entry).unwrap();
        assert_eq!(doc.get_str("name").unwrap(), "/migrations/001.json");
        assert!(doc.get_datetime("executedAt").is_ok());
        assert_eq!(doc.get_str("description").unwrap(), "seed");
        assert_eq!(entry.executed_at_utc(), Some(at));
        assert_eq!(bson::from_document::<LedgerEntry>(doc).unwrap(), entry);
    }

    #[test]
    fn test_name_only_document_reads() {
        let entry: LedgerEntry =
            bson::from_document(doc! { "name": "/migrations/001.json" }).unwrap();
        assert_eq!(entry.name, "/migrations/001.json");
        assert!(entry.executed_at_utc().is_none());
        assert!(entry.description.is_none());
    }

    #[test]
    fn test_mistyped_fields_read_as_none() {
        let entry: LedgerEntry = bson::from_document(doc! {
            "name": "/migrations/001.json",
            "executedAt": "2024-05-01",
            "description": 42,
        })
        .unwrap();
        assert!(entry.executed_at.is_none());
        assert!(entry.description.is_none());
    }
}
