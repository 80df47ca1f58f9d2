use baize_core::{BarItem, Money, TableId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::random_string;

/// How a payment reached the till.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
}

/// What a receipt records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ReceiptKind {
    /// A session was settled on the spot.
    Game {
        table_id: TableId,
        table_name: String,
        started_at: Option<DateTime<Utc>>,
        ended_at: DateTime<Utc>,
        elapsed_seconds: u64,
        game_cost: Money,
        bar_items: Vec<BarItem>,
        bar_total: Money,
        vip: bool,
    },
    /// A session's bill was converted into debt.
    DebtAdded {
        debtor: String,
        table_name: String,
    },
    /// A debtor paid part or all of what they owe.
    DebtPayment {
        debtor: String,
        remaining_debt: Money,
    },
}

/// Immutable audit record of a completed money-moving event. Never mutated
/// after creation; display is somebody else's problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    #[serde(flatten)]
    pub kind: ReceiptKind,
    /// Absent for debt conversions, which move no money yet.
    pub method: Option<PaymentMethod>,
    pub total: Money,
    pub employee: String,
    pub shift_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl Receipt {
    pub fn new(
        kind: ReceiptKind,
        method: Option<PaymentMethod>,
        total: Money,
        employee: &str,
        shift_id: Option<i64>,
    ) -> Self {
        Self {
            id: format!("receipt-{}", random_string(12)),
            kind,
            method,
            total,
            employee: employee.to_string(),
            shift_id,
            timestamp: Utc::now(),
        }
    }
}
