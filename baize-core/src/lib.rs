use crossbeam::channel::unbounded;
use dashmap::DashMap;
use std::sync::Arc;

mod billing;
mod clock;
mod config;
mod events;
mod table;

pub use billing::*;
pub use config::*;
pub use events::*;
pub use table::*;

// Reduces verbosity
type Store<Id, T> = Arc<DashMap<Id, Arc<T>>>;

/// The venue engine, owning the tables and the clock that advances them.
pub struct Engine {
    context: EngineContext,
    event_receiver: EventReceiver,
}

/// A type passed to various components of the engine, to access state and
/// emit events.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Config,

    event_sender: EventSender,

    pub tables: Store<TableId, Table>,
}

impl Engine {
    pub fn new(config: Config) -> Engine {
        let (event_sender, event_receiver) = unbounded();

        let context = EngineContext {
            config,
            event_sender,
            tables: Default::default(),
        };

        clock::spawn_clock_thread(&context);

        Engine {
            context,
            event_receiver,
        }
    }

    /// Registers a table with the engine, replacing any previous
    /// registration under the same id.
    pub fn register_table(&self, spec: TableSpec) -> Arc<Table> {
        let table: Arc<Table> = Table::new(spec).into();

        self.context
            .tables
            .insert(table.id.clone(), table.clone());

        table
    }

    /// Looks a table up by id.
    pub fn table(&self, id: &str) -> Result<Arc<Table>, SessionError> {
        self.context
            .tables
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| SessionError::UnknownTable(id.to_string()))
    }

    /// All registered tables.
    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.context.tables.iter().map(|t| t.clone()).collect()
    }

    /// Tables with an active session.
    pub fn active_tables(&self) -> Vec<Arc<Table>> {
        self.context
            .tables
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.clone())
            .collect()
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Receive events from the engine.
    pub fn wait_for_event(&self) -> EngineEvent {
        self.event_receiver
            .recv()
            .expect("event is received without error")
    }

    pub fn events(&self) -> EventReceiver {
        self.event_receiver.clone()
    }
}

impl EngineContext {
    /// Receivers may already be gone during teardown, so a failed send
    /// drops the event instead of panicking the clock thread.
    pub fn emit(&self, event: EngineEvent) {
        self.event_sender.send(event).ok();
    }
}

// Realistically, the context should always be created by the engine.
// However, in a test, this may not be possible.
#[cfg(test)]
impl Default for EngineContext {
    fn default() -> Self {
        let (event_sender, _) = unbounded();

        Self {
            config: Config::default(),
            event_sender,
            tables: Default::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_emit_without_receiver_is_quiet() {
        // The default context drops its receiver immediately
        let context = EngineContext::default();

        context.emit(EngineEvent::LowTime {
            table_id: "b1".to_string(),
        });
    }
}
