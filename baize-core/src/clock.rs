use std::{thread, time::Instant};

use log::info;

use crate::{EngineContext, EngineEvent};

/// Spawns the clock thread, advancing every running table on a shared one
/// second cadence. Ticks are synchronous and never touch I/O; anything that
/// needs to leave the process goes through the event channel.
pub fn spawn_clock_thread(context: &EngineContext) {
    let context = context.clone();
    let tick_interval = context.config.tick_interval;

    let run = move || {
        let mut next = Instant::now();

        loop {
            for table in context.tables.iter() {
                let Some(tick) = table.tick(&context.config) else {
                    continue;
                };

                context.emit(EngineEvent::TimeUpdate {
                    table_id: table.id.clone(),
                    remaining_seconds: tick.remaining_seconds,
                    cost: tick.cost,
                });

                if tick.low_time {
                    context.emit(EngineEvent::LowTime {
                        table_id: table.id.clone(),
                    });
                }

                if tick.expired {
                    info!("Table {} expired, session cleared", table.id);

                    context.emit(EngineEvent::Expired {
                        table_id: table.id.clone(),
                    });
                }
            }

            next += tick_interval;
            spin_sleep::sleep(next - Instant::now())
        }
    };

    thread::spawn(run);
}
