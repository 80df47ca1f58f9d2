mod events;
mod identity;
mod journal;
mod ledger;
mod receipt;
mod shift;
mod store;
mod sync;
mod util;

use std::{sync::Arc, thread};

use baize_core::{
    seconds_from_money, Config, Engine, FundOutcome, Money, Settlement, SessionError, Table,
};
use chrono::{DateTime, Utc};
use crossbeam::{atomic::AtomicCell, channel::unbounded};
use log::warn;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::{runtime::Handle, sync::mpsc};

pub use events::*;
pub use identity::*;
pub use journal::*;
pub use ledger::*;
pub use receipt::*;
pub use shift::*;
pub use store::{
    Balances, MemoryStore, Snapshot, SnapshotReceiver, SnapshotSender, Store, StoreError,
};
pub use sync::*;

use util::format_duration;

/// How a session gets funded: by buying time directly or by an amount of
/// money converted at the table's current effective rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFunding {
    Time { minutes: u64 },
    Money { amount: Money },
}

/// The payment decision that commits a stopped session.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Cash,
    Transfer,
    Debt { debtor: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ClubError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Shift(#[from] ShiftError),
}

/// The venue system, tying the engine to the ledger, shift accounting, and
/// the remote store.
pub struct Club<S> {
    context: ClubContext<S>,
    sync: SyncReconciler<S>,
    event_receiver: EventReceiver,
}

/// A type passed to various components of the club, to access state and
/// emit events.
pub struct ClubContext<S> {
    pub config: Config,
    pub owner_id: String,

    pub engine: Arc<Engine>,
    pub store: Arc<S>,

    pub ledger: Arc<DebtLedger>,
    pub shifts: Arc<ShiftTracker>,
    pub journal: Arc<Journal>,
    pub notes: Arc<Mutex<String>>,

    pub handle: Handle,
    /// Stamp of the newest snapshot assembled from local state, used to spot
    /// stale inbound snapshots.
    pub(crate) last_write_at: Arc<AtomicCell<Option<DateTime<Utc>>>>,
    pub(crate) save_sender: mpsc::UnboundedSender<Snapshot>,
    event_sender: EventSender,
}

impl<S> Club<S>
where
    S: Store,
{
    /// Builds the club on top of an engine and a store, restores the last
    /// saved snapshot, and starts the subscription and event pumps.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn init(engine: Engine, store: S, owner_id: &str) -> Arc<Self> {
        let (event_sender, event_receiver) = unbounded();
        let (save_sender, save_receiver) = mpsc::unbounded_channel();

        let context = ClubContext {
            config: engine.config().clone(),
            owner_id: owner_id.to_string(),
            engine: Arc::new(engine),
            store: Arc::new(store),
            ledger: Default::default(),
            shifts: Default::default(),
            journal: Default::default(),
            notes: Default::default(),
            handle: Handle::current(),
            last_write_at: Default::default(),
            save_sender,
            event_sender,
        };

        let sync = SyncReconciler::new(&context);

        sync.start_save_worker(save_receiver);

        // Local-first: an unreachable store at startup is an offline start,
        // not a failure.
        if let Err(e) = sync.restore().await {
            warn!("Could not restore snapshot, starting fresh: {e}");
        }

        sync.start_subscription();
        spawn_engine_pump(&context);

        Arc::new(Self {
            context,
            sync,
            event_receiver,
        })
    }

    /// Funds a table, starting a session on an idle table or topping up an
    /// active one. Requires an open shift.
    pub fn fund_table(
        &self,
        table_id: &str,
        funding: SessionFunding,
        identity: &Identity,
    ) -> Result<FundOutcome, ClubError> {
        if !self.context.shifts.is_open() {
            return Err(ShiftError::NotOpen.into());
        }

        let table = self.context.engine.table(table_id)?;

        let seconds = match funding {
            SessionFunding::Time { minutes } => minutes.saturating_mul(60),
            SessionFunding::Money { amount } => seconds_from_money(
                amount,
                table.hourly_rate(),
                table.state().session.vip,
                self.context.config.vip_multiplier,
            ),
        };

        let outcome = table.fund(seconds, Utc::now())?;

        let action = match outcome {
            FundOutcome::Started => "Session started",
            FundOutcome::ToppedUp => "Time added",
        };

        self.journal(action, format!("{} ({})", table.name, format_duration(seconds)));
        self.sync.request_save();

        Ok(outcome)
    }

    /// Pauses or resumes a table. Returns whether it is running afterwards.
    pub fn toggle_pause(&self, table_id: &str, _identity: &Identity) -> Result<bool, ClubError> {
        let table = self.context.engine.table(table_id)?;
        let running = table.toggle_pause()?;

        let action = if running {
            "Session resumed"
        } else {
            "Session paused"
        };

        self.journal(action, table.name.clone());
        self.sync.request_save();

        Ok(running)
    }

    /// Enables or disables the VIP multiplier on a table.
    pub fn set_vip(
        &self,
        table_id: &str,
        enabled: bool,
        _identity: &Identity,
    ) -> Result<(), ClubError> {
        let table = self.context.engine.table(table_id)?;
        table.set_vip(enabled, &self.context.config)?;

        let action = if enabled { "VIP enabled" } else { "VIP disabled" };

        self.journal(action, table.name.clone());
        self.sync.request_save();

        Ok(())
    }

    /// Attaches a consumable charge to an active table.
    pub fn add_table_item(
        &self,
        table_id: &str,
        name: &str,
        price: Money,
        quantity: u32,
        _identity: &Identity,
    ) -> Result<(), ClubError> {
        let table = self.context.engine.table(table_id)?;
        table.add_item(name, price, quantity)?;

        self.journal(
            "Item attached",
            format!("{}: {name} x{quantity}", table.name),
        );
        self.sync.request_save();

        Ok(())
    }

    /// Detaches a consumable charge from an active table.
    pub fn remove_table_item(
        &self,
        table_id: &str,
        index: usize,
        _identity: &Identity,
    ) -> Result<(), ClubError> {
        let table = self.context.engine.table(table_id)?;
        let item = table.remove_item(index)?;

        self.journal("Item detached", format!("{}: {}", table.name, item.name));
        self.sync.request_save();

        Ok(())
    }

    /// Stops a table's clock and returns the bill awaiting a payment
    /// decision, or `None` if the table is idle.
    pub fn stop_session(
        &self,
        table_id: &str,
        _identity: &Identity,
    ) -> Result<Option<Settlement>, ClubError> {
        let table = self.context.engine.table(table_id)?;

        Ok(table.begin_close(&self.context.config))
    }

    /// Commits a stopped session with exactly one payment resolution. The
    /// table is fully reset before any money moves. A settle on an idle
    /// table is an idempotent no-op.
    pub fn settle(
        &self,
        table_id: &str,
        resolution: Resolution,
        identity: &Identity,
    ) -> Result<Option<Receipt>, ClubError> {
        let context = &self.context;
        let table = context.engine.table(table_id)?;

        // Validate a debt resolution against a non-committal quote first, so
        // a rejection leaves the table still awaiting its settlement.
        if let Resolution::Debt { debtor } = &resolution {
            let Some(quote) = table.begin_close(&context.config) else {
                return Ok(None);
            };

            if debtor.trim().is_empty() {
                return Err(LedgerError::EmptyName.into());
            }

            if quote.total <= 0 {
                return Err(LedgerError::InvalidAmount.into());
            }
        }

        // The claim is the commit point: of any concurrent resolutions for
        // the same bill, exactly one takes it and the rest see an idle table.
        let Some(settlement) = table.take_settlement(&context.config) else {
            return Ok(None);
        };

        let receipt = match resolution {
            Resolution::Cash => self.settle_paid(&table, settlement, PaymentMethod::Cash, identity),
            Resolution::Transfer => {
                self.settle_paid(&table, settlement, PaymentMethod::Transfer, identity)
            }
            Resolution::Debt { debtor } => self.settle_as_debt(settlement, &debtor, identity)?,
        };

        context.shifts.push_receipt(receipt.clone());
        self.sync.request_save();

        Ok(Some(receipt))
    }

    /// Pays down a debtor's balance. Reaching zero drops them from the
    /// active roster.
    pub fn pay_debt(
        &self,
        debtor: &str,
        amount: Money,
        method: PaymentMethod,
        identity: &Identity,
    ) -> Result<Receipt, ClubError> {
        let context = &self.context;

        let outcome = context.ledger.pay_debt(debtor, amount)?;
        context.shifts.record_payment(method, amount);

        let receipt = Receipt::new(
            ReceiptKind::DebtPayment {
                debtor: debtor.to_string(),
                remaining_debt: outcome.remaining,
            },
            Some(method),
            amount,
            &identity.employee,
            context.shifts.current().map(|s| s.id),
        );

        context.shifts.push_receipt(receipt.clone());

        self.journal("Debt paid", format!("{debtor}: {amount}"));
        self.sync.request_save();

        Ok(receipt)
    }

    /// Writes a debtor off entirely. Requires the supervisor capability.
    pub fn delete_debtor(&self, debtor: &str, identity: &Identity) -> Result<Money, ClubError> {
        let written_off = self.context.ledger.delete_debtor(debtor, identity)?;

        self.journal("Debtor written off", format!("{debtor}: {written_off}"));
        self.sync.request_save();

        Ok(written_off)
    }

    /// Opens a shift for the given employee.
    pub fn open_shift(&self, identity: &Identity) -> Result<CurrentShift, ClubError> {
        let shift = self.context.shifts.open(identity, Utc::now())?;

        self.journal("Shift opened", format!("Employee: {}", shift.employee));
        self.sync.request_save();

        Ok(shift)
    }

    /// Closes the open shift. Every active table is force-cleared without a
    /// payment decision; whatever was on its clock is abandoned.
    pub fn close_shift(&self, _identity: &Identity) -> Result<ShiftRecord, ClubError> {
        let context = &self.context;

        if !context.shifts.is_open() {
            return Err(ShiftError::NotOpen.into());
        }

        for table in context.engine.active_tables() {
            let abandoned = table.current_cost(&context.config);

            self.journal(
                "Session abandoned at shift close",
                format!("{}: {abandoned}", table.name),
            );
            table.clear();
        }

        let record = context
            .shifts
            .close(context.ledger.debt_balance(), Utc::now())?;

        // The shift is gone at this point, so attribute the entry explicitly
        context.journal.record(
            &record.employee,
            "Shift closed",
            format!(
                "Takings: {}",
                record.cash_balance + record.transfer_balance
            ),
        );
        self.sync.request_save();

        Ok(record)
    }

    pub fn tables(&self) -> Vec<Arc<Table>> {
        let mut tables = self.context.engine.tables();
        tables.sort_by(|a, b| a.id.cmp(&b.id));
        tables
    }

    pub fn table(&self, id: &str) -> Result<Arc<Table>, ClubError> {
        Ok(self.context.engine.table(id)?)
    }

    pub fn active_tables(&self) -> Vec<Arc<Table>> {
        self.context.engine.active_tables()
    }

    pub fn debtor_roster(&self) -> Vec<Debtor> {
        self.context.ledger.roster()
    }

    pub fn shift_summary(&self) -> ShiftSummary {
        self.context
            .shifts
            .summary(self.context.ledger.debt_balance())
    }

    pub fn history(&self) -> Vec<ShiftRecord> {
        self.context.shifts.history()
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.context.shifts.receipts()
    }

    pub fn journal_entries(&self) -> Vec<JournalEntry> {
        self.context.journal.entries()
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.context.store
    }

    /// Receive events from the club.
    pub fn events(&self) -> EventReceiver {
        self.event_receiver.clone()
    }

    fn settle_paid(
        &self,
        table: &Table,
        settlement: Settlement,
        method: PaymentMethod,
        identity: &Identity,
    ) -> Receipt {
        let context = &self.context;

        context.shifts.record_payment(method, settlement.total);
        context
            .shifts
            .record_game_revenue(&table.id, settlement.game_cost);
        context.shifts.record_bar_revenue(settlement.bar_total);

        self.journal(
            "Session paid",
            format!("{}: {} ({:?})", table.name, settlement.total, method),
        );

        Receipt::new(
            ReceiptKind::Game {
                table_id: settlement.table_id,
                table_name: settlement.table_name,
                started_at: settlement.started_at,
                ended_at: Utc::now(),
                elapsed_seconds: settlement.elapsed_seconds,
                game_cost: settlement.game_cost,
                bar_items: settlement.bar_items,
                bar_total: settlement.bar_total,
                vip: settlement.vip,
            },
            Some(method),
            settlement.total,
            &identity.employee,
            context.shifts.current().map(|s| s.id),
        )
    }

    fn settle_as_debt(
        &self,
        settlement: Settlement,
        debtor: &str,
        identity: &Identity,
    ) -> Result<Receipt, ClubError> {
        let context = &self.context;

        let source = format!(
            "{} ({})",
            settlement.table_name,
            format_duration(settlement.elapsed_seconds)
        );

        context
            .ledger
            .add_debt(debtor, settlement.total, &source, Utc::now())?;

        self.journal(
            "Converted to debt",
            format!("{source}: {} -> {debtor}", settlement.total),
        );

        Ok(Receipt::new(
            ReceiptKind::DebtAdded {
                debtor: debtor.trim().to_string(),
                table_name: settlement.table_name,
            },
            None,
            settlement.total,
            &identity.employee,
            context.shifts.current().map(|s| s.id),
        ))
    }

    fn journal(&self, action: &str, details: String) {
        let employee = self
            .context
            .shifts
            .current()
            .map(|s| s.employee)
            .unwrap_or_else(|| "system".to_string());

        self.context.journal.record(&employee, action, details);
    }
}

impl<S> ClubContext<S> {
    /// Receivers may already be gone during teardown, so a failed send
    /// drops the event instead of panicking the pump threads.
    pub fn emit(&self, event: ClubEvent) {
        self.event_sender.send(event).ok();
    }
}

impl<S> Clone for ClubContext<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            owner_id: self.owner_id.clone(),
            engine: self.engine.clone(),
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            shifts: self.shifts.clone(),
            journal: self.journal.clone(),
            notes: self.notes.clone(),
            handle: self.handle.clone(),
            last_write_at: self.last_write_at.clone(),
            save_sender: self.save_sender.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

fn spawn_engine_pump<S>(context: &ClubContext<S>)
where
    S: Store,
{
    let context = context.clone();
    let receiver = context.engine.events();
    let sync = SyncReconciler::new(&context);

    let run = move || {
        for event in receiver.iter() {
            if let baize_core::EngineEvent::Expired { table_id } = &event {
                let employee = context
                    .shifts
                    .current()
                    .map(|s| s.employee)
                    .unwrap_or_else(|| "system".to_string());

                context
                    .journal
                    .record(&employee, "Session expired", table_id.clone());

                // The cleared session has to reach the store
                sync.request_save();
            }

            context.emit(ClubEvent::from_engine_event(event));
        }
    };

    thread::spawn(run);
}

#[cfg(test)]
mod test {
    use super::*;
    use baize_core::{TableKind, TableSpec, TableStatus};
    use std::time::{Duration as StdDuration, Instant};

    fn test_config() -> Config {
        Config {
            // Keeps the clock thread inert so the tests own the timeline
            tick_interval: StdDuration::from_secs(100_000),
            save_backoff: StdDuration::from_millis(1),
            ..Default::default()
        }
    }

    async fn test_club() -> Arc<Club<MemoryStore>> {
        let engine = Engine::new(test_config());

        engine.register_table(TableSpec {
            id: "b1".to_string(),
            name: "Billiard 1".to_string(),
            kind: TableKind::Billiard,
            hourly_rate: 40_000,
        });
        engine.register_table(TableSpec {
            id: "c1".to_string(),
            name: "Console 1".to_string(),
            kind: TableKind::Console,
            hourly_rate: 25_000,
        });

        Club::init(engine, MemoryStore::new(), "club-1").await
    }

    fn wait_for(
        events: &EventReceiver,
        matches: impl Fn(&ClubEvent) -> bool,
    ) -> ClubEvent {
        let deadline = Instant::now() + StdDuration::from_secs(5);

        loop {
            match events.recv_timeout(deadline - Instant::now()) {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for event"),
            }
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + StdDuration::from_secs(5);

        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_funding_requires_an_open_shift() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");

        assert_eq!(
            club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar),
            Err(ShiftError::NotOpen.into())
        );

        club.open_shift(&anvar).unwrap();

        assert_eq!(
            club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar),
            Ok(FundOutcome::Started)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_money_funding_converts_at_the_table_rate() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");
        club.open_shift(&anvar).unwrap();

        club.fund_table("b1", SessionFunding::Money { amount: 20_000 }, &anvar)
            .unwrap();

        let table = club.table("b1").unwrap();
        assert_eq!(table.remaining_seconds(), 1800, "20 000 at 40 000/h buys half an hour");

        assert_eq!(
            club.fund_table("c1", SessionFunding::Money { amount: 0 }, &anvar),
            Err(SessionError::InvalidAmount.into())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cash_settle_moves_money_and_resets_the_table() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");
        club.open_shift(&anvar).unwrap();

        club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar)
            .unwrap();
        club.add_table_item("b1", "Pepsi", 8_000, 2, &anvar).unwrap();

        let settlement = club.stop_session("b1", &anvar).unwrap().expect("active");
        assert_eq!(settlement.bar_total, 16_000);

        let receipt = club
            .settle("b1", Resolution::Cash, &anvar)
            .unwrap()
            .expect("settlement was pending");

        assert_eq!(receipt.total, 16_000);
        assert_eq!(receipt.method, Some(PaymentMethod::Cash));

        let summary = club.shift_summary();
        assert_eq!(summary.cash_balance, 16_000);
        assert_eq!(summary.stats.bar, 16_000);

        assert_eq!(club.table("b1").unwrap().status(), TableStatus::Idle);
        assert_eq!(club.receipts().len(), 1);

        // A repeated settle is a no-op, not a double charge
        assert_eq!(club.settle("b1", Resolution::Cash, &anvar), Ok(None));
        assert_eq!(club.shift_summary().cash_balance, 16_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_debt_conversion_accumulates_on_one_debtor() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");
        club.open_shift(&anvar).unwrap();

        club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar)
            .unwrap();
        club.add_table_item("b1", "Pepsi", 10_000, 2, &anvar).unwrap();
        club.settle("b1", Resolution::Debt { debtor: "Ali".to_string() }, &anvar)
            .unwrap();

        club.fund_table("c1", SessionFunding::Time { minutes: 10 }, &anvar)
            .unwrap();
        club.add_table_item("c1", "Choy", 5_000, 1, &anvar).unwrap();
        club.settle("c1", Resolution::Debt { debtor: "ali".to_string() }, &anvar)
            .unwrap();

        let roster = club.debtor_roster();
        assert_eq!(roster.len(), 1, "names match case-insensitively");
        assert_eq!(roster[0].total_debt, 25_000);
        assert_eq!(roster[0].debts.len(), 2);

        let summary = club.shift_summary();
        assert_eq!(summary.debt_balance, 25_000);
        assert_eq!(summary.cash_balance, 0, "a conversion moves no money");

        // Both tables are fully reset
        assert_eq!(club.table("b1").unwrap().status(), TableStatus::Idle);
        assert_eq!(club.table("c1").unwrap().status(), TableStatus::Idle);

        // Paying part of it back moves money and shrinks the debt
        let receipt = club
            .pay_debt("Ali", 10_000, PaymentMethod::Cash, &anvar)
            .unwrap();

        assert_eq!(receipt.total, 10_000);
        assert_eq!(club.shift_summary().cash_balance, 10_000);
        assert_eq!(club.shift_summary().debt_balance, 15_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_debt_conversion_keeps_the_bill_pending() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");
        club.open_shift(&anvar).unwrap();

        club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar)
            .unwrap();
        club.add_table_item("b1", "Pepsi", 8_000, 1, &anvar).unwrap();
        club.stop_session("b1", &anvar).unwrap();

        assert_eq!(
            club.settle("b1", Resolution::Debt { debtor: "  ".to_string() }, &anvar),
            Err(LedgerError::EmptyName.into())
        );

        // The table still awaits its payment decision
        assert_eq!(club.table("b1").unwrap().status(), TableStatus::Closing);

        club.settle("b1", Resolution::Transfer, &anvar).unwrap();
        assert_eq!(club.shift_summary().transfer_balance, 8_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_shift_abandons_active_sessions() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");
        club.open_shift(&anvar).unwrap();

        club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar)
            .unwrap();
        club.fund_table("c1", SessionFunding::Time { minutes: 5 }, &anvar)
            .unwrap();

        let record = club.close_shift(&anvar).unwrap();
        assert_eq!(record.employee, "Anvar");

        for table in club.tables() {
            assert_eq!(table.status(), TableStatus::Idle);
        }

        assert_eq!(club.history().len(), 1);
        assert_eq!(
            club.close_shift(&anvar),
            Err(ShiftError::NotOpen.into())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_exhausted_save_surfaces_and_recovers() {
        let club = test_club().await;
        let events = club.events();
        let anvar = Identity::employee("Anvar");

        club.store().set_failing(true);
        club.open_shift(&anvar).unwrap();

        wait_for(&events, |e| matches!(e, ClubEvent::SaveFailed { .. }));
        assert!(!club.store().contains("club-1"), "nothing landed");

        // Local state survived the outage, and the next save catches up
        assert!(club.shift_summary().shift.is_some());

        club.store().set_failing(false);
        club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar)
            .unwrap();

        let store = club.store().clone();
        wait_until(move || store.contains("club-1")).await;

        let saved = club.store().document("club-1").unwrap();
        assert!(saved.shift.is_some());
        assert!(saved.tables.iter().any(|t| t.session.active));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_merge_only_applies_changed_groups() {
        let club = test_club().await;
        let events = club.events();
        let anvar = Identity::employee("Anvar");

        club.open_shift(&anvar).unwrap();

        let store = club.store().clone();
        wait_until(move || store.contains("club-1")).await;

        // A remote device edits the notes on top of our own document and
        // pushes; nothing but the notes group may move.
        let mut snapshot = club.store().document("club-1").unwrap();

        snapshot.notes = "cue tip broke".to_string();
        snapshot.last_updated = Some(Utc::now());
        club.store().push("club-1", snapshot.clone());

        let event = wait_for(&events, |e| matches!(e, ClubEvent::RemoteUpdate { .. }));
        assert!(
            matches!(event, ClubEvent::RemoteUpdate { changed } if changed == vec![FieldGroup::Notes])
        );

        // The shift the push left alone is still open
        assert!(club.shift_summary().shift.is_some());

        // A pushed table session is picked up and the table resumes
        snapshot.tables[0].session = baize_core::Session {
            active: true,
            running: true,
            initial_seconds: 600,
            remaining_seconds: 600,
            ..Default::default()
        };
        snapshot.last_updated = Some(Utc::now());
        club.store().push("club-1", snapshot);

        let event = wait_for(&events, |e| matches!(e, ClubEvent::RemoteUpdate { .. }));
        assert!(
            matches!(event, ClubEvent::RemoteUpdate { changed } if changed.contains(&FieldGroup::Tables))
        );

        let table = club.table("b1").unwrap();
        assert_eq!(table.status(), TableStatus::Running);
        assert_eq!(table.remaining_seconds(), 600);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restore_resumes_from_the_persisted_clock() {
        let store = MemoryStore::new();

        store.push(
            "club-1",
            Snapshot {
                tables: vec![baize_core::TableState {
                    id: "b1".to_string(),
                    name: "Billiard 1".to_string(),
                    kind: TableKind::Billiard,
                    hourly_rate: 40_000,
                    session: baize_core::Session {
                        active: true,
                        running: true,
                        initial_seconds: 900,
                        remaining_seconds: 300,
                        ..Default::default()
                    },
                }],
                ..Default::default()
            },
        );

        let engine = Engine::new(test_config());
        let club = Club::init(engine, store, "club-1").await;

        // The table was not even registered locally; the snapshot brings it
        let table = club.table("b1").unwrap();
        assert_eq!(table.status(), TableStatus::Running);
        assert_eq!(table.remaining_seconds(), 300);
        assert_eq!(table.state().session.elapsed_seconds(), 600);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_resolutions_commit_exactly_once() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");

        club.open_shift(&anvar).unwrap();

        for round in 1..=25 {
            club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar)
                .unwrap();
            club.add_table_item("b1", "Pepsi", 8_000, 2, &anvar).unwrap();
            club.stop_session("b1", &anvar).unwrap();

            let barrier = std::sync::Barrier::new(2);

            let committed = thread::scope(|s| {
                let settle = || {
                    barrier.wait();
                    club.settle("b1", Resolution::Cash, &anvar)
                };

                let a = s.spawn(settle);
                let b = s.spawn(settle);

                [a.join().unwrap(), b.join().unwrap()]
                    .into_iter()
                    .filter(|outcome| matches!(outcome, Ok(Some(_))))
                    .count()
            });

            assert_eq!(committed, 1, "round {round}: exactly one resolution lands");
            assert_eq!(club.table("b1").unwrap().status(), TableStatus::Idle);
        }

        // Each bill was charged once: 25 rounds of a 16 000 bar tab on an
        // unticked clock.
        assert_eq!(club.receipts().len(), 25);
        assert_eq!(club.shift_summary().cash_balance, 25 * 16_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_late_snapshot_echo_does_not_roll_back() {
        let club = test_club().await;
        let events = club.events();
        let anvar = Identity::employee("Anvar");

        club.open_shift(&anvar).unwrap();

        let store = club.store().clone();
        wait_until(move || store.contains("club-1")).await;

        // Captured before the session below starts, so it knows nothing of it
        let stale = club.store().document("club-1").unwrap();

        club.fund_table("b1", SessionFunding::Time { minutes: 10 }, &anvar)
            .unwrap();

        let store = club.store().clone();
        wait_until(move || {
            store
                .document("club-1")
                .is_some_and(|d| d.tables.iter().any(|t| t.session.active))
        })
        .await;

        // A save from before the funding lands late, followed by a genuinely
        // newer remote edit. The subscription sees them in order.
        club.store().push("club-1", stale);

        let mut fresh = club.store().document("club-1").unwrap();
        fresh.notes = "chalk restocked".to_string();
        fresh.last_updated = Some(Utc::now());
        club.store().push("club-1", fresh);

        // The first update to surface is the notes edit: the stale snapshot
        // merged to nothing instead of reverting the table to idle.
        let event = wait_for(&events, |e| matches!(e, ClubEvent::RemoteUpdate { .. }));
        assert!(
            matches!(event, ClubEvent::RemoteUpdate { changed } if changed == vec![FieldGroup::Notes])
        );

        assert_eq!(club.table("b1").unwrap().status(), TableStatus::Running);
        assert!(club.shift_summary().shift.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_extreme_funding_saturates() {
        let club = test_club().await;
        let anvar = Identity::employee("Anvar");

        club.open_shift(&anvar).unwrap();

        let outcome = club
            .fund_table("b1", SessionFunding::Time { minutes: u64::MAX }, &anvar)
            .unwrap();

        assert_eq!(outcome, FundOutcome::Started);
        assert_eq!(club.table("b1").unwrap().remaining_seconds(), u64::MAX);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_emit_without_receiver_is_quiet() {
        let (event_sender, _) = unbounded();
        let (save_sender, _save_receiver) = mpsc::unbounded_channel();

        let context = ClubContext {
            config: test_config(),
            owner_id: "club-1".to_string(),
            engine: Arc::new(Engine::new(test_config())),
            store: Arc::new(MemoryStore::new()),
            ledger: Default::default(),
            shifts: Default::default(),
            journal: Default::default(),
            notes: Default::default(),
            handle: Handle::current(),
            last_write_at: Default::default(),
            save_sender,
            event_sender,
        };

        context.emit(ClubEvent::Expired {
            table_id: "b1".to_string(),
        });
    }
}
