use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One line in the activity journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub employee: String,
    pub action: String,
    pub details: String,
}

/// Append-only journal of state-changing and money-moving operations.
/// Kept for staff audit; old entries are pruned opportunistically on load.
#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl Journal {
    pub fn record(&self, employee: &str, action: &str, details: impl Into<String>) {
        self.entries.lock().push(JournalEntry {
            timestamp: Utc::now(),
            employee: employee.to_string(),
            action: action.to_string(),
            details: details.into(),
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Drops entries older than the retention window.
    pub fn prune(&self, retention: Duration, now: DateTime<Utc>) {
        self.entries
            .lock()
            .retain(|e| now - e.timestamp < retention);
    }

    pub fn restore(&self, entries: Vec<JournalEntry>) {
        *self.entries.lock() = entries;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_prune_respects_retention() {
        let journal = Journal::default();
        let now = Utc::now();

        journal.restore(vec![
            JournalEntry {
                timestamp: now - Duration::days(40),
                employee: "Anvar".to_string(),
                action: "Shift opened".to_string(),
                details: String::new(),
            },
            JournalEntry {
                timestamp: now - Duration::days(2),
                employee: "Anvar".to_string(),
                action: "Shift closed".to_string(),
                details: String::new(),
            },
        ]);

        journal.prune(Duration::days(30), now);

        let entries = journal.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "Shift closed");
    }
}
