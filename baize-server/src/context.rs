use std::sync::Arc;

use axum::extract::FromRef;
use baize_club::{Club, MemoryStore};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub club: Arc<Club<MemoryStore>>,
}
