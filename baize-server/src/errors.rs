use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use baize_club::{ClubError, LedgerError, ShiftError};
use baize_core::SessionError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource} {identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<ClubError> for ServerError {
    fn from(value: ClubError) -> Self {
        match value {
            ClubError::Session(SessionError::UnknownTable(id)) => Self::NotFound {
                resource: "table",
                identifier: id,
            },
            ClubError::Session(SessionError::AwaitingSettlement) => {
                Self::Conflict(SessionError::AwaitingSettlement.to_string())
            }
            ClubError::Session(e) => Self::Invalid(e.to_string()),
            ClubError::Ledger(LedgerError::UnknownDebtor(name)) => Self::NotFound {
                resource: "debtor",
                identifier: name,
            },
            ClubError::Ledger(LedgerError::Unauthorized) => {
                Self::Forbidden(LedgerError::Unauthorized.to_string())
            }
            ClubError::Ledger(e) => Self::Invalid(e.to_string()),
            ClubError::Shift(ShiftError::Unauthenticated) => {
                Self::Unauthenticated(ShiftError::Unauthenticated.to_string())
            }
            ClubError::Shift(e) => Self::Conflict(e.to_string()),
        }
    }
}
