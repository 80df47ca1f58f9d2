use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use baize_core::Money;
use serde::{de::DeserializeOwned, Deserialize};
use validator::Validate;

/// Funds a table by buying minutes directly or by converting an amount of
/// money at the table's current effective rate. Exactly one must be given.
#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FundSchema {
    #[validate(range(min = 1))]
    pub minutes: Option<u64>,
    #[validate(range(min = 1))]
    pub amount: Option<Money>,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ItemSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(range(min = 0))]
    pub price: Money,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VipSchema {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "resolution")]
pub enum SettleSchema {
    Cash,
    Transfer,
    Debt { debtor: String },
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DebtPaymentSchema {
    #[validate(range(min = 1))]
    pub amount: Money,
    pub method: PaymentMethodSchema,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodSchema {
    Cash,
    Transfer,
}

impl From<PaymentMethodSchema> for baize_club::PaymentMethod {
    fn from(value: PaymentMethodSchema) -> Self {
        match value {
            PaymentMethodSchema::Cash => Self::Cash,
            PaymentMethodSchema::Transfer => Self::Transfer,
        }
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
