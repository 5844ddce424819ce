// ABOUTME: Actor context for API requests
// ABOUTME: Reads the identity forwarded by the upstream auth layer

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};

use crate::response::ApiResponse;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Authenticated actor recorded on every mutation
#[derive(Debug, Clone)]
pub struct CurrentActor {
    pub id: String,
}

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ApiResponse<()>>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match id {
            Some(id) => Ok(Self { id: id.to_string() }),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error(format!("Missing {} header", ACTOR_HEADER))),
            )),
        }
    }
}
