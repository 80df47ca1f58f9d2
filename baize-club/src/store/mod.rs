use std::collections::BTreeMap;

use async_trait::async_trait;
use baize_core::{Money, TableId, TableState};
use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;
pub use memory::*;

use crate::{CurrentShift, Debtor, JournalEntry, Receipt, ShiftRecord, ShiftStats};

pub type Result<T> = std::result::Result<T, StoreError>;

pub type SnapshotSender = Sender<Snapshot>;
pub type SnapshotReceiver = Receiver<Snapshot>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the write
    #[error("Store is unreachable: {0}")]
    Unreachable(String),
    /// An unknown or internal error happened with the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

/// The balances field group of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Balances {
    pub cash: Money,
    pub transfer: Money,
    pub debt: Money,
}

/// The per-owner document kept in the remote store, grouped into the field
/// groups that double as the units of conflict resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub tables: Vec<TableState>,
    pub prices: BTreeMap<TableId, Money>,
    pub debtors: Vec<Debtor>,
    pub history: Vec<ShiftRecord>,
    pub stats: ShiftStats,
    pub receipts: Vec<Receipt>,
    pub journal: Vec<JournalEntry>,
    /// Carried opaquely; the club never looks inside.
    pub notes: String,
    pub balances: Balances,
    pub shift: Option<CurrentShift>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Represents a type that can persist venue snapshots for multiple devices
/// sharing an owner id.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Fetches the current snapshot for an owner, if one was ever saved.
    async fn load(&self, owner_id: &str) -> Result<Option<Snapshot>>;

    /// Upserts the snapshot for an owner. Idempotent.
    async fn save(&self, owner_id: &str, snapshot: Snapshot) -> Result<()>;

    /// Subscribes to snapshots pushed by any writer under this owner,
    /// including this device's own saves.
    fn subscribe(&self, owner_id: &str) -> SnapshotReceiver;
}
