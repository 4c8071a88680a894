//! Acting-user extraction
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in a header and every transition is stamped with it.

use axum::http::request::Parts;
use shared::Actor;
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the acting user's id
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Extractor for the acting user
/// Use this in handlers to thread the actor into service calls
#[derive(Clone, Copy, Debug)]
pub struct CurrentActor(pub Actor);

/// Parse the actor header value
pub(crate) fn parse_actor(value: Option<&str>) -> Result<Actor, &'static str> {
    let raw = value.ok_or("Missing X-Actor-Id header")?;
    let user_id = Uuid::parse_str(raw.trim()).map_err(|_| "Invalid X-Actor-Id header")?;
    if user_id.is_nil() {
        return Err("Invalid X-Actor-Id header");
    }
    Ok(Actor::new(user_id))
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok());

        parse_actor(header)
            .map(CurrentActor)
            .map_err(|msg| AppError::Unauthorized(msg.to_string()))
    }
}
