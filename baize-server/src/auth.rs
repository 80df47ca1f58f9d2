use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use baize_club::Identity as ClubIdentity;

/// Wraps [ClubIdentity] so [FromRequestParts] can be implemented for it.
///
/// The identity provider sits in front of this server; by the time a request
/// arrives its claims are already trusted and ride in as plain headers.
pub struct Identity(ClubIdentity);

impl Identity {
    pub fn claims(&self) -> &ClubIdentity {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let employee = parts
            .headers
            .get("x-employee")
            .and_then(|x| x.to_str().ok())
            .filter(|x| !x.trim().is_empty())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing x-employee header"))?;

        let supervisor = parts
            .headers
            .get("x-supervisor")
            .and_then(|x| x.to_str().ok())
            .map(|x| x == "true")
            .unwrap_or(false);

        let identity = if supervisor {
            ClubIdentity::supervisor(employee)
        } else {
            ClubIdentity::employee(employee)
        };

        Ok(Self(identity))
    }
}
