//! All schemas that are exposed from endpoints are defined here
//! along with the conversions into them

use baize_core::{BarItem, Config, Money, Table, TableKind, TableStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a table looks like from the outside: lifecycle state plus the live
/// figures a till display needs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    id: String,
    name: String,
    kind: TableKind,
    status: TableStatus,
    hourly_rate: Money,
    vip: bool,
    started_at: Option<DateTime<Utc>>,
    remaining_seconds: u64,
    elapsed_seconds: u64,
    current_cost: Money,
    bar_total: Money,
    items: Vec<BarItem>,
}

impl TableView {
    pub fn new(table: &Table, config: &Config) -> Self {
        let state = table.state();

        Self {
            id: state.id,
            name: state.name,
            kind: state.kind,
            status: table.status(),
            hourly_rate: state.hourly_rate,
            vip: state.session.vip,
            started_at: state.session.started_at,
            remaining_seconds: state.session.remaining_seconds,
            elapsed_seconds: state.session.elapsed_seconds(),
            current_cost: state.session.cost(state.hourly_rate, config),
            bar_total: state.session.bar_total(),
            items: state.session.items,
        }
    }
}

/// The outcome of a debtor write-off.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOff {
    pub debtor: String,
    pub written_off: Money,
}
