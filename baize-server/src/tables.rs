use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};
use baize_club::{ClubError, Receipt, Resolution, SessionFunding};
use baize_core::{SessionError, Settlement};

use crate::{
    auth::Identity,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{FundSchema, ItemSchema, SettleSchema, ValidatedJson, VipSchema},
    serialized::TableView,
    Router,
};

async fn list_tables(State(context): State<ServerContext>) -> Json<Vec<TableView>> {
    let club = &context.club;

    let tables = club
        .tables()
        .iter()
        .map(|t| TableView::new(t, club.config()))
        .collect();

    Json(tables)
}

async fn fund_table(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(table_id): Path<String>,
    ValidatedJson(body): ValidatedJson<FundSchema>,
) -> ServerResult<Json<TableView>> {
    let club = &context.club;

    let funding = match (body.minutes, body.amount) {
        (Some(minutes), None) => SessionFunding::Time { minutes },
        (None, Some(amount)) => SessionFunding::Money { amount },
        _ => {
            return Err(ServerError::Invalid(
                "Fund with either minutes or an amount".to_string(),
            ))
        }
    };

    club.fund_table(&table_id, funding, identity.claims())?;

    let table = club.table(&table_id)?;
    Ok(Json(TableView::new(&table, club.config())))
}

async fn toggle_pause(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(table_id): Path<String>,
) -> ServerResult<Json<TableView>> {
    let club = &context.club;

    club.toggle_pause(&table_id, identity.claims())?;

    let table = club.table(&table_id)?;
    Ok(Json(TableView::new(&table, club.config())))
}

async fn set_vip(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(table_id): Path<String>,
    Json(body): Json<VipSchema>,
) -> ServerResult<Json<TableView>> {
    let club = &context.club;

    club.set_vip(&table_id, body.enabled, identity.claims())?;

    let table = club.table(&table_id)?;
    Ok(Json(TableView::new(&table, club.config())))
}

async fn add_item(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(table_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ItemSchema>,
) -> ServerResult<Json<TableView>> {
    let club = &context.club;

    club.add_table_item(&table_id, &body.name, body.price, body.quantity, identity.claims())?;

    let table = club.table(&table_id)?;
    Ok(Json(TableView::new(&table, club.config())))
}

async fn remove_item(
    identity: Identity,
    State(context): State<ServerContext>,
    Path((table_id, index)): Path<(String, usize)>,
) -> ServerResult<Json<TableView>> {
    let club = &context.club;

    club.remove_table_item(&table_id, index, identity.claims())?;

    let table = club.table(&table_id)?;
    Ok(Json(TableView::new(&table, club.config())))
}

/// Stops the clock and returns the bill. The table stays frozen until a
/// settle commits it.
async fn stop_session(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(table_id): Path<String>,
) -> ServerResult<Json<Settlement>> {
    let club = &context.club;

    let settlement = club
        .stop_session(&table_id, identity.claims())?
        .ok_or(ClubError::Session(SessionError::NotActive))?;

    Ok(Json(settlement))
}

async fn settle(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(table_id): Path<String>,
    Json(body): Json<SettleSchema>,
) -> ServerResult<Json<Receipt>> {
    let club = &context.club;

    let resolution = match body {
        SettleSchema::Cash => Resolution::Cash,
        SettleSchema::Transfer => Resolution::Transfer,
        SettleSchema::Debt { debtor } => Resolution::Debt { debtor },
    };

    let receipt = club
        .settle(&table_id, resolution, identity.claims())?
        .ok_or(ClubError::Session(SessionError::NotActive))?;

    Ok(Json(receipt))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tables))
        .route("/:id/start", post(fund_table))
        .route("/:id/top-up", post(fund_table))
        .route("/:id/pause", post(toggle_pause))
        .route("/:id/vip", post(set_vip))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:index", delete(remove_item))
        .route("/:id/stop", post(stop_session))
        .route("/:id/settle", post(settle))
}
