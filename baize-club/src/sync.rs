use std::thread;

use baize_core::TableSpec;
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{sync::mpsc::UnboundedReceiver, time::sleep};

use crate::{Balances, ClubContext, ClubEvent, Snapshot, Store, StoreError};

/// A top-level section of the snapshot document. Field groups are the unit
/// of conflict resolution: last write wins per group, nothing finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldGroup {
    Tables,
    Prices,
    Debtors,
    History,
    Stats,
    Receipts,
    Journal,
    Notes,
    Balances,
    Shift,
}

/// Keeps the local state and the remote store eventually consistent.
///
/// Outbound, every committed mutation queues a snapshot for a single save
/// worker that coalesces the queue and retries with a capped, doubling
/// backoff. Inbound, pushed snapshots are merged group by group behind an
/// equality gate, so a push can only touch the groups it actually changed,
/// and snapshots older than the last local write are dropped outright.
pub struct SyncReconciler<S> {
    context: ClubContext<S>,
}

impl<S> SyncReconciler<S>
where
    S: Store,
{
    pub fn new(context: &ClubContext<S>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Assembles the full snapshot of current local state.
    pub fn snapshot(&self) -> Snapshot {
        let context = &self.context;

        let mut tables: Vec<_> = context.engine.tables().iter().map(|t| t.state()).collect();
        tables.sort_by(|a, b| a.id.cmp(&b.id));

        let prices = tables
            .iter()
            .map(|t| (t.id.clone(), t.hourly_rate))
            .collect();

        let (cash, transfer) = context.shifts.balances();

        Snapshot {
            prices,
            tables,
            debtors: context.ledger.all_debtors(),
            history: context.shifts.history(),
            stats: context.shifts.stats(),
            receipts: context.shifts.receipts(),
            journal: context.journal.entries(),
            notes: context.notes.lock().clone(),
            balances: Balances {
                cash,
                transfer,
                debt: context.ledger.debt_balance(),
            },
            shift: context.shifts.current(),
            last_updated: Some(Utc::now()),
        }
    }

    /// Snapshots the current state and queues it for persistence. The
    /// caller's mutation is already visible locally; this never blocks it.
    pub fn request_save(&self) {
        let snapshot = self.snapshot();

        self.context.last_write_at.store(snapshot.last_updated);

        if self.context.save_sender.send(snapshot).is_err() {
            warn!("Save worker is gone, dropping snapshot");
        }
    }

    /// Starts the single outbound save task. Saves are strictly sequenced
    /// through it, and queued snapshots coalesce so only the newest pending
    /// one is written. An older save can never land after a newer one.
    pub fn start_save_worker(&self, mut receiver: UnboundedReceiver<Snapshot>) {
        let context = self.context.clone();

        self.context.handle.spawn(async move {
            while let Some(mut snapshot) = receiver.recv().await {
                while let Ok(newer) = receiver.try_recv() {
                    snapshot = newer;
                }

                save_with_retries(&context, snapshot).await;
            }
        });
    }

    /// Loads the owner's snapshot and merges it in, then applies the soft
    /// retention policy. Tables restored active resume ticking from their
    /// persisted clock; wall-clock time while the process was down is not
    /// deducted.
    pub async fn restore(&self) -> Result<(), StoreError> {
        let context = &self.context;

        if let Some(snapshot) = context.store.load(&context.owner_id).await? {
            let changed = self.merge(snapshot);
            info!("Restored snapshot, {} field groups applied", changed.len());
        }

        let now = Utc::now();
        let config = &context.config;

        context
            .shifts
            .prune(config.history_retention, config.receipt_retention, now);
        context.journal.prune(config.journal_retention, now);

        Ok(())
    }

    /// Starts pumping pushed snapshots into merges. Each merge that changes
    /// anything surfaces as a [ClubEvent::RemoteUpdate].
    pub fn start_subscription(&self) {
        let receiver = self.context.store.subscribe(&self.context.owner_id);
        let reconciler = Self::new(&self.context);

        thread::spawn(move || {
            for snapshot in receiver.iter() {
                let changed = reconciler.merge(snapshot);

                if !changed.is_empty() {
                    reconciler
                        .context
                        .emit(ClubEvent::RemoteUpdate { changed });
                }
            }
        });
    }

    /// Merges an inbound snapshot field group by field group. A group is
    /// only replaced if its serialized form differs from the local one, and
    /// only the replaced groups are reported back.
    pub fn merge(&self, incoming: Snapshot) -> Vec<FieldGroup> {
        let context = &self.context;

        // Snapshots are stamped when assembled. Anything at or before our
        // last local write is an echo or a late retry, not news.
        if let (Some(incoming_at), Some(local_at)) =
            (incoming.last_updated, context.last_write_at.load())
        {
            if incoming_at <= local_at {
                return vec![];
            }
        }

        let local = self.snapshot();
        let mut changed = vec![];

        if differs(&local.tables, &incoming.tables) {
            for state in incoming.tables {
                let table = context.engine.table(&state.id).unwrap_or_else(|_| {
                    context.engine.register_table(TableSpec {
                        id: state.id.clone(),
                        name: state.name.clone(),
                        kind: state.kind,
                        hourly_rate: state.hourly_rate,
                    })
                });

                table.set_hourly_rate(state.hourly_rate);
                table.restore(state.session);
            }

            changed.push(FieldGroup::Tables);
        }

        if differs(&local.prices, &incoming.prices) {
            for (id, rate) in &incoming.prices {
                if let Ok(table) = context.engine.table(id) {
                    table.set_hourly_rate(*rate);
                }
            }

            changed.push(FieldGroup::Prices);
        }

        if differs(&local.debtors, &incoming.debtors) {
            context.ledger.restore(incoming.debtors);
            changed.push(FieldGroup::Debtors);
        }

        if differs(&local.history, &incoming.history) {
            context.shifts.restore_history(incoming.history);
            changed.push(FieldGroup::History);
        }

        if differs(&local.stats, &incoming.stats) {
            context.shifts.restore_stats(incoming.stats);
            changed.push(FieldGroup::Stats);
        }

        if differs(&local.receipts, &incoming.receipts) {
            context.shifts.restore_receipts(incoming.receipts);
            changed.push(FieldGroup::Receipts);
        }

        if differs(&local.journal, &incoming.journal) {
            context.journal.restore(incoming.journal);
            changed.push(FieldGroup::Journal);
        }

        if differs(&local.notes, &incoming.notes) {
            *context.notes.lock() = incoming.notes;
            changed.push(FieldGroup::Notes);
        }

        if differs(&local.balances, &incoming.balances) {
            context
                .shifts
                .restore_balances(incoming.balances.cash, incoming.balances.transfer);
            changed.push(FieldGroup::Balances);
        }

        if differs(&local.shift, &incoming.shift) {
            context.shifts.restore_current(incoming.shift);
            changed.push(FieldGroup::Shift);
        }

        // The debt balance is defined as the sum over the debtors, so after
        // anything debt-related merged it is re-derived rather than trusted.
        let debt_touched = changed
            .iter()
            .any(|g| matches!(g, FieldGroup::Debtors | FieldGroup::Balances));

        if debt_touched {
            context.ledger.verify_balance(incoming.balances.debt);
        }

        // An accepted remote write supersedes our own, so anything older
        // than it is stale from here on.
        if !changed.is_empty() {
            context.last_write_at.store(incoming.last_updated);
        }

        changed
    }
}

async fn save_with_retries<S>(context: &ClubContext<S>, snapshot: Snapshot)
where
    S: Store,
{
    let attempts = context.config.save_attempts.max(1);
    let mut backoff = context.config.save_backoff;

    for attempt in 1..=attempts {
        match context.store.save(&context.owner_id, snapshot.clone()).await {
            Ok(_) => return,
            Err(e) if attempt == attempts => {
                error!("Save failed after {attempts} attempts: {e}");

                context.emit(ClubEvent::SaveFailed {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Save attempt {attempt} failed: {e}, retrying");

                sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

fn differs<T: Serialize>(local: &T, incoming: &T) -> bool {
    serde_json::to_value(local).ok() != serde_json::to_value(incoming).ok()
}
