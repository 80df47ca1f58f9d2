use serde::{Deserialize, Serialize};

/// Claims about the staff member behind a command, supplied by the external
/// identity provider. The club never authenticates anyone itself, it only
/// checks capabilities on the identity it is handed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub employee: String,
    /// Grants destructive operations, currently only debtor write-off.
    pub supervisor: bool,
}

impl Identity {
    pub fn employee(name: &str) -> Self {
        Self {
            employee: name.to_string(),
            supervisor: false,
        }
    }

    pub fn supervisor(name: &str) -> Self {
        Self {
            employee: name.to_string(),
            supervisor: true,
        }
    }
}
