use baize_core::Money;
use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Identity;

/// An itemized liability a debtor accumulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtEntry {
    /// Where the debt came from, e.g. the table and duration it was run up on.
    pub source: String,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

/// A named party the venue has extended credit to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debtor {
    pub name: String,
    pub total_debt: Money,
    /// Append-only; kept even after the balance is paid down to zero.
    pub debts: Vec<DebtEntry>,
}

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("A debtor needs a name")]
    EmptyName,
    #[error("Debtor {0} does not exist")]
    UnknownDebtor(String),
    #[error("Payment exceeds the outstanding debt")]
    ExceedsDebt,
    #[error("Writing a debtor off requires the supervisor capability")]
    Unauthorized,
}

/// The outcome of a debt payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtPaymentOutcome {
    pub remaining: Money,
    /// The debtor's balance reached zero and they left the active roster.
    pub settled: bool,
}

/// Maps debtor names to outstanding balances and their itemized entries.
///
/// The derived debt balance is recomputed from the debtors after every
/// mutation rather than adjusted in place, so it can never drift from
/// the sum it is defined as.
#[derive(Default)]
pub struct DebtLedger {
    debtors: Mutex<Vec<Debtor>>,
    debt_balance: AtomicCell<Money>,
}

impl DebtLedger {
    /// Appends a debt entry, creating the debtor on first use. Names match
    /// case-insensitively.
    pub fn add_debt(
        &self,
        name: &str,
        amount: Money,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<Money, LedgerError> {
        let name = name.trim();

        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let mut debtors = self.debtors.lock();

        let debtor = match find_debtor(&debtors[..], name) {
            Some(index) => &mut debtors[index],
            None => {
                debtors.push(Debtor {
                    name: name.to_string(),
                    total_debt: 0,
                    debts: vec![],
                });

                debtors.last_mut().expect("debtor was just pushed")
            }
        };

        debtor.debts.push(DebtEntry {
            source: source.to_string(),
            amount,
            timestamp: now,
        });

        debtor.total_debt += amount;
        let total = debtor.total_debt;

        self.recompute_balance(&debtors[..]);

        Ok(total)
    }

    /// Pays an outstanding balance down. Reaching exactly zero drops the
    /// debtor from the active roster while keeping their entries.
    pub fn pay_debt(&self, name: &str, amount: Money) -> Result<DebtPaymentOutcome, LedgerError> {
        let mut debtors = self.debtors.lock();

        let index = find_debtor(&debtors[..], name)
            .ok_or_else(|| LedgerError::UnknownDebtor(name.to_string()))?;

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        if amount > debtors[index].total_debt {
            return Err(LedgerError::ExceedsDebt);
        }

        debtors[index].total_debt -= amount;
        let remaining = debtors[index].total_debt;

        self.recompute_balance(&debtors[..]);

        Ok(DebtPaymentOutcome {
            remaining,
            settled: remaining == 0,
        })
    }

    /// Removes a debtor and everything they owe. A write-off: destructive
    /// and irreversible, gated on the supervisor capability.
    pub fn delete_debtor(&self, name: &str, identity: &Identity) -> Result<Money, LedgerError> {
        if !identity.supervisor {
            return Err(LedgerError::Unauthorized);
        }

        let mut debtors = self.debtors.lock();

        let index = find_debtor(&debtors[..], name)
            .ok_or_else(|| LedgerError::UnknownDebtor(name.to_string()))?;

        let written_off = debtors.remove(index).total_debt;

        self.recompute_balance(&debtors[..]);

        Ok(written_off)
    }

    /// Debtors with an outstanding balance.
    pub fn roster(&self) -> Vec<Debtor> {
        self.debtors
            .lock()
            .iter()
            .filter(|d| d.total_debt > 0)
            .cloned()
            .collect()
    }

    pub fn debt_balance(&self) -> Money {
        self.debt_balance.load()
    }

    /// Replaces the debtors wholesale, used when a remote snapshot wins a
    /// merge. The balance is recomputed from the incoming debtors, never
    /// taken from the wire.
    pub fn restore(&self, incoming: Vec<Debtor>) {
        let mut debtors = self.debtors.lock();
        *debtors = incoming;
        self.recompute_balance(&debtors[..]);
    }

    /// Checks the balance against the sum it is defined as, healing and
    /// logging if something let them drift apart.
    pub fn verify_balance(&self, reported: Money) {
        let debtors = self.debtors.lock();
        let derived: Money = debtors.iter().map(|d| d.total_debt).sum();

        if reported != derived {
            warn!(
                "Debt balance of {reported} differs from the {derived} the debtors sum to, healing"
            );
        }

        self.debt_balance.store(derived);
    }

    fn recompute_balance(&self, debtors: &[Debtor]) {
        self.debt_balance
            .store(debtors.iter().map(|d| d.total_debt).sum());
    }

    /// All debtors, including settled ones. Used for persistence.
    pub fn all_debtors(&self) -> Vec<Debtor> {
        self.debtors.lock().clone()
    }
}

fn find_debtor(debtors: &[Debtor], name: &str) -> Option<usize> {
    debtors
        .iter()
        .position(|d| d.name.to_lowercase() == name.to_lowercase())
}
