use crossbeam::channel::{Receiver, Sender};

use crate::{Money, TableId};

pub type EventSender = Sender<EngineEvent>;
pub type EventReceiver = Receiver<EngineEvent>;

/// Describes the events that can be emitted by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A running table advanced by one tick.
    TimeUpdate {
        table_id: TableId,
        /// Seconds left on the table's clock.
        remaining_seconds: u64,
        /// The cost of the session so far.
        cost: Money,
    },
    /// A running table crossed the low time threshold. Fires once per session.
    LowTime { table_id: TableId },
    /// A table's clock ran out and its session was cleared without a payment
    /// decision. The money-moving path is the manual stop, not this.
    Expired { table_id: TableId },
}
