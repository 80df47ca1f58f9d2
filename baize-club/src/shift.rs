use std::collections::BTreeMap;

use baize_core::{Money, TableId};
use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Identity, PaymentMethod, Receipt};

#[derive(Debug, Error, PartialEq)]
pub enum ShiftError {
    #[error("A shift is already open")]
    AlreadyOpen,
    #[error("No shift is open")]
    NotOpen,
    #[error("Opening a shift requires an employee identity")]
    Unauthenticated,
}

/// Revenue broken down by where it was earned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShiftStats {
    /// Game revenue per table.
    pub tables: BTreeMap<TableId, Money>,
    /// Revenue from consumables, across all tables.
    pub bar: Money,
}

/// The one mutable shift, if any is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentShift {
    pub id: i64,
    pub employee: String,
    pub started_at: DateTime<Utc>,
}

/// An immutable snapshot of a closed shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRecord {
    pub id: i64,
    pub employee: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub cash_balance: Money,
    pub transfer_balance: Money,
    /// The venue-wide debt at close time. Debt is not shift-scoped, this is
    /// just what it stood at.
    pub debt_balance: Money,
    pub stats: ShiftStats,
    pub receipts: Vec<Receipt>,
}

/// A read-only rollup of the live shift state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSummary {
    pub shift: Option<CurrentShift>,
    pub cash_balance: Money,
    pub transfer_balance: Money,
    pub debt_balance: Money,
    pub stats: ShiftStats,
}

/// Aggregates balances, revenue stats, and receipts between shift open and
/// close. Balance fields move only through the operations here; call sites
/// never add to them directly.
#[derive(Default)]
pub struct ShiftTracker {
    current: Mutex<Option<CurrentShift>>,
    cash_balance: AtomicCell<Money>,
    transfer_balance: AtomicCell<Money>,
    stats: Mutex<ShiftStats>,
    receipts: Mutex<Vec<Receipt>>,
    history: Mutex<Vec<ShiftRecord>>,
}

impl ShiftTracker {
    /// Opens a shift, zeroing the live balances and stats.
    pub fn open(&self, identity: &Identity, now: DateTime<Utc>) -> Result<CurrentShift, ShiftError> {
        if identity.employee.trim().is_empty() {
            return Err(ShiftError::Unauthenticated);
        }

        let mut current = self.current.lock();

        if current.is_some() {
            return Err(ShiftError::AlreadyOpen);
        }

        let shift = CurrentShift {
            id: now.timestamp_millis(),
            employee: identity.employee.clone(),
            started_at: now,
        };

        *current = Some(shift.clone());

        self.cash_balance.store(0);
        self.transfer_balance.store(0);
        *self.stats.lock() = ShiftStats::default();
        self.receipts.lock().clear();

        Ok(shift)
    }

    /// Closes the open shift: snapshots it into history and zeroes the live
    /// state for the next one. The caller is responsible for clearing any
    /// still-active tables first.
    pub fn close(&self, debt_balance: Money, now: DateTime<Utc>) -> Result<ShiftRecord, ShiftError> {
        let mut current = self.current.lock();
        let shift = current.take().ok_or(ShiftError::NotOpen)?;

        let record = ShiftRecord {
            id: shift.id,
            employee: shift.employee,
            started_at: shift.started_at,
            ended_at: now,
            cash_balance: self.cash_balance.load(),
            transfer_balance: self.transfer_balance.load(),
            debt_balance,
            stats: self.stats.lock().clone(),
            receipts: self.receipts.lock().clone(),
        };

        self.history.lock().push(record.clone());

        self.cash_balance.store(0);
        self.transfer_balance.store(0);
        *self.stats.lock() = ShiftStats::default();
        self.receipts.lock().clear();

        Ok(record)
    }

    pub fn is_open(&self) -> bool {
        self.current.lock().is_some()
    }

    pub fn current(&self) -> Option<CurrentShift> {
        self.current.lock().clone()
    }

    /// Credits a received payment to the matching balance.
    pub fn record_payment(&self, method: PaymentMethod, amount: Money) {
        match method {
            PaymentMethod::Cash => self.cash_balance.fetch_add(amount),
            PaymentMethod::Transfer => self.transfer_balance.fetch_add(amount),
        };
    }

    pub fn record_game_revenue(&self, table_id: &str, amount: Money) {
        if amount > 0 {
            *self
                .stats
                .lock()
                .tables
                .entry(table_id.to_string())
                .or_default() += amount;
        }
    }

    pub fn record_bar_revenue(&self, amount: Money) {
        if amount > 0 {
            self.stats.lock().bar += amount;
        }
    }

    pub fn push_receipt(&self, receipt: Receipt) {
        self.receipts.lock().push(receipt);
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts.lock().clone()
    }

    pub fn history(&self) -> Vec<ShiftRecord> {
        self.history.lock().clone()
    }

    pub fn stats(&self) -> ShiftStats {
        self.stats.lock().clone()
    }

    pub fn summary(&self, debt_balance: Money) -> ShiftSummary {
        ShiftSummary {
            shift: self.current(),
            cash_balance: self.cash_balance.load(),
            transfer_balance: self.transfer_balance.load(),
            debt_balance,
            stats: self.stats.lock().clone(),
        }
    }

    /// Drops history and receipts past their retention windows. Soft policy,
    /// runs on the load path only.
    pub fn prune(
        &self,
        history_retention: chrono::Duration,
        receipt_retention: chrono::Duration,
        now: DateTime<Utc>,
    ) {
        self.history
            .lock()
            .retain(|r| now - r.ended_at < history_retention);
        self.receipts
            .lock()
            .retain(|r| now - r.timestamp < receipt_retention);
    }

    pub fn restore_history(&self, history: Vec<ShiftRecord>) {
        *self.history.lock() = history;
    }

    pub fn restore_receipts(&self, receipts: Vec<Receipt>) {
        *self.receipts.lock() = receipts;
    }

    pub fn restore_stats(&self, stats: ShiftStats) {
        *self.stats.lock() = stats;
    }

    pub fn restore_balances(&self, cash: Money, transfer: Money) {
        self.cash_balance.store(cash);
        self.transfer_balance.store(transfer);
    }

    pub fn restore_current(&self, shift: Option<CurrentShift>) {
        *self.current.lock() = shift;
    }

    pub fn balances(&self) -> (Money, Money) {
        (self.cash_balance.load(), self.transfer_balance.load())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ReceiptKind;

    #[test]
    fn test_open_requires_employee_and_no_open_shift() {
        let shifts = ShiftTracker::default();

        assert_eq!(
            shifts.open(&Identity::employee(""), Utc::now()),
            Err(ShiftError::Unauthenticated)
        );

        shifts.open(&Identity::employee("Anvar"), Utc::now()).unwrap();

        assert_eq!(
            shifts.open(&Identity::employee("Anvar"), Utc::now()),
            Err(ShiftError::AlreadyOpen)
        );
    }

    #[test]
    fn test_close_snapshots_and_zeroes() {
        let shifts = ShiftTracker::default();
        shifts.open(&Identity::employee("Anvar"), Utc::now()).unwrap();

        shifts.record_payment(PaymentMethod::Cash, 36_000);
        shifts.record_payment(PaymentMethod::Transfer, 12_000);
        shifts.record_game_revenue("b1", 20_000);
        shifts.record_bar_revenue(16_000);
        shifts.push_receipt(Receipt::new(
            ReceiptKind::DebtPayment {
                debtor: "Ali".to_string(),
                remaining_debt: 0,
            },
            Some(PaymentMethod::Cash),
            12_000,
            "Anvar",
            None,
        ));

        let record = shifts.close(25_000, Utc::now()).unwrap();

        assert_eq!(record.cash_balance, 36_000);
        assert_eq!(record.transfer_balance, 12_000);
        assert_eq!(record.debt_balance, 25_000);
        assert_eq!(record.stats.tables.get("b1"), Some(&20_000));
        assert_eq!(record.stats.bar, 16_000);
        assert_eq!(record.receipts.len(), 1);

        // Live state is zeroed for the next shift
        assert!(!shifts.is_open());
        assert_eq!(shifts.balances(), (0, 0));
        assert_eq!(shifts.stats(), ShiftStats::default());
        assert!(shifts.receipts().is_empty());
        assert_eq!(shifts.history().len(), 1);

        assert_eq!(shifts.close(0, Utc::now()), Err(ShiftError::NotOpen));
    }

    #[test]
    fn test_prune_drops_old_records() {
        let shifts = ShiftTracker::default();
        let now = Utc::now();

        let old = ShiftRecord {
            id: 1,
            employee: "Anvar".to_string(),
            started_at: now - chrono::Duration::days(9),
            ended_at: now - chrono::Duration::days(8),
            cash_balance: 0,
            transfer_balance: 0,
            debt_balance: 0,
            stats: ShiftStats::default(),
            receipts: vec![],
        };
        let recent = ShiftRecord {
            id: 2,
            ended_at: now - chrono::Duration::days(1),
            ..old.clone()
        };

        shifts.restore_history(vec![old, recent]);
        shifts.prune(chrono::Duration::days(7), chrono::Duration::days(7), now);

        let history = shifts.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, 2);
    }
}
