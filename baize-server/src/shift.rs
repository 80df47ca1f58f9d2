use axum::{
    extract::State,
    routing::{get, post},
    Json,
};
use baize_club::{CurrentShift, JournalEntry, Receipt, ShiftRecord, ShiftSummary};

use crate::{auth::Identity, context::ServerContext, errors::ServerResult, Router};

async fn open_shift(
    identity: Identity,
    State(context): State<ServerContext>,
) -> ServerResult<Json<CurrentShift>> {
    let shift = context.club.open_shift(identity.claims())?;

    Ok(Json(shift))
}

/// Closes the shift. Active sessions are abandoned and cleared.
async fn close_shift(
    identity: Identity,
    State(context): State<ServerContext>,
) -> ServerResult<Json<ShiftRecord>> {
    let record = context.club.close_shift(identity.claims())?;

    Ok(Json(record))
}

async fn shift_summary(State(context): State<ServerContext>) -> Json<ShiftSummary> {
    Json(context.club.shift_summary())
}

async fn history(State(context): State<ServerContext>) -> Json<Vec<ShiftRecord>> {
    Json(context.club.history())
}

async fn receipts(State(context): State<ServerContext>) -> Json<Vec<Receipt>> {
    Json(context.club.receipts())
}

async fn journal(State(context): State<ServerContext>) -> Json<Vec<JournalEntry>> {
    Json(context.club.journal_entries())
}

pub fn router() -> Router {
    Router::new()
        .route("/shift", get(shift_summary))
        .route("/shift/open", post(open_shift))
        .route("/shift/close", post(close_shift))
        .route("/history", get(history))
        .route("/receipts", get(receipts))
        .route("/journal", get(journal))
}
