use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};
use baize_club::{Debtor, Receipt};

use crate::{
    auth::Identity,
    context::ServerContext,
    errors::ServerResult,
    schemas::{DebtPaymentSchema, ValidatedJson},
    serialized::WriteOff,
    Router,
};

/// Debtors with an outstanding balance.
async fn list_debtors(State(context): State<ServerContext>) -> Json<Vec<Debtor>> {
    Json(context.club.debtor_roster())
}

async fn pay_debt(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(debtor): Path<String>,
    ValidatedJson(body): ValidatedJson<DebtPaymentSchema>,
) -> ServerResult<Json<Receipt>> {
    let receipt = context.club.pay_debt(
        &debtor,
        body.amount,
        body.method.into(),
        identity.claims(),
    )?;

    Ok(Json(receipt))
}

/// Writes a debtor off entirely. Supervisor only.
async fn delete_debtor(
    identity: Identity,
    State(context): State<ServerContext>,
    Path(debtor): Path<String>,
) -> ServerResult<Json<WriteOff>> {
    let written_off = context.club.delete_debtor(&debtor, identity.claims())?;

    Ok(Json(WriteOff {
        debtor,
        written_off,
    }))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_debtors))
        .route("/:name/payments", post(pay_debt))
        .route("/:name", delete(delete_debtor))
}
