//! Audit trail types attached to documents.
//!
//! Mutating model operations accept an optional [`Actor`]. When one is given, an
//! [`AuditEntry`] describing who did what is recorded alongside the write; when
//! none is given, auditing is skipped.

use bson::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Name of the stored field holding a document's audit entries.
pub const RECORDS_FIELD: &str = "records";

/// Anyone who can be named in an audit entry.
pub trait Actor: Send + Sync {
    /// Display name of the actor.
    fn name(&self) -> &str;

    /// Account identifier of the actor.
    fn account(&self) -> &str;
}

/// A single immutable audit record.
///
/// Entries are created through [`AuditEntry::new`] and never modified afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditEntry {
    datetime: DateTime,
    summary: String,
    account: String,
    name: String,
}

impl AuditEntry {
    /// Creates an entry for `actor`, timestamped now.
    pub fn new(actor: &dyn Actor, summary: impl Into<String>) -> Self {
        Self {
            datetime: DateTime::now(),
            summary: summary.into(),
            account: actor.account().to_string(),
            name: actor.name().to_string(),
        }
    }

    pub fn datetime(&self) -> DateTime {
        self.datetime
    }

    /// The entry timestamp as a `chrono` value.
    pub fn timestamp(&self) -> chrono::DateTime<Utc> {
        self.datetime.to_chrono()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Append-only list of audit entries owned by a document.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct AuditLog(Vec<AuditEntry>);

impl AuditLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an entry at the end of the log.
    pub fn append(&mut self, entry: AuditEntry) {
        self.0.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clerk;

    impl Actor for Clerk {
        fn name(&self) -> &str {
            "Clerk Kent"
        }

        fn account(&self) -> &str {
            "ckent"
        }
    }

    #[test]
    fn entries_capture_the_actor() {
        let before = Utc::now().timestamp_millis();
        let entry = AuditEntry::new(&Clerk, "updated");

        assert_eq!(entry.account(), "ckent");
        assert_eq!(entry.name(), "Clerk Kent");
        assert_eq!(entry.summary(), "updated");
        assert!(entry.timestamp().timestamp_millis() >= before);
    }

    #[test]
    fn log_serializes_as_a_plain_array() {
        let mut log = AuditLog::new();
        log.append(AuditEntry::new(&Clerk, "create"));

        let value = bson::ser::serialize_to_bson(&log).unwrap();
        let array = value.as_array().unwrap();

        assert_eq!(array.len(), 1);
        let stored = array[0].as_document().unwrap();
        assert_eq!(stored.get_str("summary").unwrap(), "create");
        assert_eq!(stored.get_str("account").unwrap(), "ckent");
        assert!(stored.get_datetime("datetime").is_ok());
    }
}
