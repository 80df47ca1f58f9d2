use baize_core::{EngineEvent, Money, TableId};
use crossbeam::channel::{Receiver, Sender};

use crate::FieldGroup;

pub type EventSender = Sender<ClubEvent>;
pub type EventReceiver = Receiver<ClubEvent>;

/// Events emitted by the club, for a notification layer to render.
#[derive(Debug, Clone)]
pub enum ClubEvent {
    /// A running table advanced by one tick.
    TimeUpdate {
        table_id: TableId,
        remaining_seconds: u64,
        cost: Money,
    },
    /// A table is about to run out of time. Fires once per session.
    LowTimeWarning { table_id: TableId },
    /// A table ran out of time and was cleared without a payment decision.
    Expired { table_id: TableId },
    /// A save was given up on after exhausting its retries. The local state
    /// is kept; this is the persistent warning the operator should see.
    SaveFailed { reason: String },
    /// A remote snapshot won a merge for the listed field groups.
    RemoteUpdate { changed: Vec<FieldGroup> },
}

impl ClubEvent {
    /// Converts an engine event to a friendly club event.
    pub fn from_engine_event(event: EngineEvent) -> ClubEvent {
        match event {
            EngineEvent::TimeUpdate {
                table_id,
                remaining_seconds,
                cost,
            } => Self::TimeUpdate {
                table_id,
                remaining_seconds,
                cost,
            },
            EngineEvent::LowTime { table_id } => Self::LowTimeWarning { table_id },
            EngineEvent::Expired { table_id } => Self::Expired { table_id },
        }
    }
}
