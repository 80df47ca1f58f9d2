use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{cost_from_elapsed, Config, Money};

pub type TableId = String;

/// The rental category of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Billiard,
    Console,
}

/// A consumable charge attached to a table while its session is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarItem {
    pub name: String,
    /// Unit price at the time the item was attached.
    pub price: Money,
    pub quantity: u32,
}

impl BarItem {
    pub fn total(&self) -> Money {
        self.price * self.quantity as Money
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Table {0} does not exist")]
    UnknownTable(TableId),
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Table is not active")]
    NotActive,
    #[error("Table is awaiting settlement")]
    AwaitingSettlement,
    #[error("Table is not awaiting settlement")]
    NotAwaitingSettlement,
    #[error("Table has no such item")]
    UnknownItem,
}

/// The session fields of a table. Everything here resets to defaults when the
/// session ends, whatever way it ends.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub active: bool,
    pub running: bool,
    pub closing: bool,
    pub vip: bool,
    /// One-shot latch for the low time warning.
    pub alarmed: bool,
    pub initial_seconds: u64,
    pub remaining_seconds: u64,
    /// Cost accrued under multipliers that are no longer current.
    pub banked_cost: Money,
    /// How many elapsed seconds `banked_cost` covers.
    pub banked_seconds: u64,
    pub items: Vec<BarItem>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Seconds elapsed since the session started, invariant across top-ups.
    pub fn elapsed_seconds(&self) -> u64 {
        self.initial_seconds.saturating_sub(self.remaining_seconds)
    }

    /// Cost of the session so far: banked rate segments plus the seconds
    /// elapsed under the current multiplier. Seconds already counted are
    /// never re-rated when the multiplier changes.
    pub fn cost(&self, hourly_rate: Money, config: &Config) -> Money {
        let unbanked = self.elapsed_seconds().saturating_sub(self.banked_seconds);

        self.banked_cost
            + cost_from_elapsed(unbanked, hourly_rate, self.vip, config.vip_multiplier)
    }

    pub fn bar_total(&self) -> Money {
        // Always summed from the items themselves, never accumulated, so a
        // removed item can't leave a stale remainder behind.
        self.items.iter().map(|i| i.total()).sum()
    }

    fn bank_rate_segment(&mut self, hourly_rate: Money, config: &Config) {
        let elapsed = self.elapsed_seconds();
        let unbanked = elapsed.saturating_sub(self.banked_seconds);

        self.banked_cost +=
            cost_from_elapsed(unbanked, hourly_rate, self.vip, config.vip_multiplier);
        self.banked_seconds = elapsed;
    }
}

/// The lifecycle state of a table, derived from its session fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableStatus {
    Idle,
    Running,
    Paused,
    /// Stopped manually, waiting for exactly one payment resolution.
    Closing,
}

/// How a funding operation landed on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundOutcome {
    Started,
    ToppedUp,
}

/// The final bill of a manually stopped session. Produced by [Table::begin_close]
/// and committed by exactly one payment resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub table_id: TableId,
    pub table_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub game_cost: Money,
    pub bar_items: Vec<BarItem>,
    pub bar_total: Money,
    pub total: Money,
    pub vip: bool,
}

/// The outcome of advancing a running table by one tick.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub remaining_seconds: u64,
    pub cost: Money,
    /// The low time threshold was crossed on this tick.
    pub low_time: bool,
    /// The clock ran out and the session was cleared.
    pub expired: bool,
}

/// Registration data for a table.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub id: TableId,
    pub name: String,
    pub kind: TableKind,
    pub hourly_rate: Money,
}

/// A serializable view of a table and its session, also used as the unit of
/// the `tables` snapshot field group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub id: TableId,
    pub name: String,
    pub kind: TableKind,
    pub hourly_rate: Money,
    pub session: Session,
}

/// A physical rentable unit and its current session.
///
/// All session mutation goes through the inner mutex, which is what makes a
/// tick fully apply before the next one and serializes manual commands
/// against an in-flight tick.
pub struct Table {
    pub id: TableId,
    pub name: String,
    pub kind: TableKind,
    hourly_rate: AtomicCell<Money>,
    session: Mutex<Session>,
}

impl Table {
    pub fn new(spec: TableSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            kind: spec.kind,
            hourly_rate: AtomicCell::new(spec.hourly_rate),
            session: Default::default(),
        }
    }

    pub fn hourly_rate(&self) -> Money {
        self.hourly_rate.load()
    }

    pub fn set_hourly_rate(&self, rate: Money) {
        self.hourly_rate.store(rate);
    }

    /// Funds the table with the given amount of seconds. Starts a session if
    /// the table is idle, otherwise tops the running one up, preserving the
    /// seconds already elapsed.
    pub fn fund(&self, seconds: u64, now: DateTime<Utc>) -> Result<FundOutcome, SessionError> {
        if seconds == 0 {
            return Err(SessionError::InvalidAmount);
        }

        let mut session = self.session.lock();

        if session.closing {
            return Err(SessionError::AwaitingSettlement);
        }

        if !session.active {
            *session = Session {
                active: true,
                running: true,
                initial_seconds: seconds,
                remaining_seconds: seconds,
                started_at: Some(now),
                ..Default::default()
            };

            return Ok(FundOutcome::Started);
        }

        let elapsed = session.elapsed_seconds();

        session.remaining_seconds = session.remaining_seconds.saturating_add(seconds);
        session.initial_seconds = elapsed.saturating_add(session.remaining_seconds);
        // A paused table resumes when more time is bought for it
        session.running = true;

        Ok(FundOutcome::ToppedUp)
    }

    /// Pauses a running table or resumes a paused one.
    /// Returns whether the table is running afterwards.
    pub fn toggle_pause(&self) -> Result<bool, SessionError> {
        let mut session = self.session.lock();

        if !session.active {
            return Err(SessionError::NotActive);
        }

        if session.closing {
            return Err(SessionError::AwaitingSettlement);
        }

        session.running = !session.running;

        Ok(session.running)
    }

    /// Enables or disables the VIP multiplier. The cost accrued so far is
    /// banked under the old multiplier first, so it is never re-rated.
    pub fn set_vip(&self, enabled: bool, config: &Config) -> Result<(), SessionError> {
        let mut session = self.session.lock();

        if !session.active {
            return Err(SessionError::NotActive);
        }

        if session.vip == enabled {
            return Ok(());
        }

        session.bank_rate_segment(self.hourly_rate.load(), config);
        session.vip = enabled;

        Ok(())
    }

    /// Attaches a consumable charge. Quantities of an already attached item
    /// at the same unit price merge.
    pub fn add_item(&self, name: &str, price: Money, quantity: u32) -> Result<(), SessionError> {
        if quantity == 0 || price < 0 {
            return Err(SessionError::InvalidAmount);
        }

        let mut session = self.session.lock();

        if !session.active {
            return Err(SessionError::NotActive);
        }

        let existing = session
            .items
            .iter_mut()
            .find(|i| i.name == name && i.price == price);

        match existing {
            Some(item) => item.quantity += quantity,
            None => session.items.push(BarItem {
                name: name.to_string(),
                price,
                quantity,
            }),
        }

        Ok(())
    }

    /// Detaches the consumable charge at the given index.
    pub fn remove_item(&self, index: usize) -> Result<BarItem, SessionError> {
        let mut session = self.session.lock();

        if !session.active {
            return Err(SessionError::NotActive);
        }

        if index >= session.items.len() {
            return Err(SessionError::UnknownItem);
        }

        Ok(session.items.remove(index))
    }

    /// Advances a running table by one tick. Paused, closing, and idle
    /// tables are untouched. When the clock runs out the session is cleared
    /// right here, without a payment decision.
    pub fn tick(&self, config: &Config) -> Option<Tick> {
        let mut session = self.session.lock();

        if !session.active || !session.running || session.closing {
            return None;
        }

        session.remaining_seconds = session.remaining_seconds.saturating_sub(1);

        let remaining = session.remaining_seconds;
        let cost = session.cost(self.hourly_rate.load(), config);

        let low_time = remaining == config.low_time_threshold_seconds && !session.alarmed;
        if low_time {
            session.alarmed = true;
        }

        let expired = remaining == 0;
        if expired {
            *session = Session::default();
        }

        Some(Tick {
            remaining_seconds: remaining,
            cost,
            low_time,
            expired,
        })
    }

    /// Stops the clock and produces the final bill, moving the table into
    /// the closing state. Idempotent: a stop on an idle table is a no-op and
    /// a repeated stop returns the same frozen bill again.
    pub fn begin_close(&self, config: &Config) -> Option<Settlement> {
        let mut session = self.session.lock();

        if !session.active {
            return None;
        }

        session.running = false;
        session.closing = true;

        Some(self.settlement_from(&session, config))
    }

    /// Claims the final bill and resets the table, all under one session
    /// lock. Of any number of concurrent claimants for the same bill exactly
    /// one gets it; the rest see `None`.
    pub fn take_settlement(&self, config: &Config) -> Option<Settlement> {
        let mut session = self.session.lock();

        if !session.active {
            return None;
        }

        let settlement = self.settlement_from(&session, config);
        *session = Session::default();

        Some(settlement)
    }

    fn settlement_from(&self, session: &Session, config: &Config) -> Settlement {
        let game_cost = session.cost(self.hourly_rate.load(), config);
        let bar_total = session.bar_total();

        Settlement {
            table_id: self.id.clone(),
            table_name: self.name.clone(),
            started_at: session.started_at,
            elapsed_seconds: session.elapsed_seconds(),
            game_cost,
            bar_items: session.items.clone(),
            bar_total,
            total: game_cost + bar_total,
            vip: session.vip,
        }
    }

    /// Resets every session field to defaults. Idempotent.
    pub fn clear(&self) {
        *self.session.lock() = Session::default();
    }

    pub fn is_active(&self) -> bool {
        self.session.lock().active
    }

    pub fn status(&self) -> TableStatus {
        let session = self.session.lock();

        if !session.active {
            TableStatus::Idle
        } else if session.closing {
            TableStatus::Closing
        } else if session.running {
            TableStatus::Running
        } else {
            TableStatus::Paused
        }
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.session.lock().remaining_seconds
    }

    pub fn current_cost(&self, config: &Config) -> Money {
        self.session.lock().cost(self.hourly_rate.load(), config)
    }

    pub fn state(&self) -> TableState {
        TableState {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            hourly_rate: self.hourly_rate.load(),
            session: self.session.lock().clone(),
        }
    }

    /// Replaces the session wholesale, used when a remote snapshot wins a
    /// merge for the tables field group.
    pub fn restore(&self, session: Session) {
        *self.session.lock() = session;
    }
}
