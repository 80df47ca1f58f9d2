use std::{env, sync::Arc, thread};

use baize_club::{Club, ClubEvent, MemoryStore};
use baize_core::{Config, Engine, Money, TableKind, TableSpec};
use log::{error, info, warn};

mod logging;

const BILLIARD_RATE: Money = 40_000;
const CONSOLE_RATE: Money = 25_000;

#[tokio::main]
async fn main() {
    logging::init_logger();

    let engine = Engine::new(Config::default());

    // The default floor. Rates and sessions are overridden by the restored
    // snapshot if one exists.
    register_floor(&engine);

    let owner_id = env::var("BAIZE_OWNER_ID").unwrap_or_else(|_| "baize".to_string());
    let club = Club::init(engine, MemoryStore::new(), &owner_id).await;

    spawn_event_logger(&club);

    baize_server::run_server(club).await;
}

fn register_floor(engine: &Engine) {
    for i in 1..=3 {
        engine.register_table(TableSpec {
            id: format!("billiard-{i}"),
            name: format!("Billiard {i}"),
            kind: TableKind::Billiard,
            hourly_rate: BILLIARD_RATE,
        });
    }

    for i in 1..=2 {
        engine.register_table(TableSpec {
            id: format!("console-{i}"),
            name: format!("Console {i}"),
            kind: TableKind::Console,
            hourly_rate: CONSOLE_RATE,
        });
    }
}

fn spawn_event_logger(club: &Arc<Club<MemoryStore>>) {
    let events = club.events();

    thread::spawn(move || {
        for event in events.iter() {
            match event {
                ClubEvent::LowTimeWarning { table_id } => {
                    warn!("Table {table_id} is almost out of time")
                }
                ClubEvent::Expired { table_id } => info!("Table {table_id} ran out of time"),
                ClubEvent::SaveFailed { reason } => error!("Snapshot save failed: {reason}"),
                ClubEvent::RemoteUpdate { changed } => {
                    info!("Remote update applied {} field groups", changed.len())
                }
                ClubEvent::TimeUpdate { .. } => {}
            }
        }
    });
}
