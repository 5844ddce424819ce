// ABOUTME: HTTP request handlers for stock movements
// ABOUTME: Direct or confirmable moves, batch distribution and cancellation

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use stockboard_movements::{Distribution, MovementRequest};

use crate::auth::CurrentActor;
use crate::response::{created_or_error, ok_or_error};
use crate::state::DbState;

/// Move stock out of a product, directly or behind a confirmation link
pub async fn create_movement(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
    Json(request): Json<MovementRequest>,
) -> impl IntoResponse {
    info!(
        "Moving {} units of {} for {} (confirmation: {})",
        request.quantity, id, actor.id, request.requires_confirmation
    );

    let result = db.movements.create_movement(&id, request, &actor.id).await;
    created_or_error(result)
}

#[derive(Debug, Deserialize)]
pub struct DistributeRequest {
    pub distributions: Vec<Distribution>,
}

/// Split a product's stock across several destinations
pub async fn distribute(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
    Json(request): Json<DistributeRequest>,
) -> impl IntoResponse {
    info!(
        "Distributing {} to {} destinations for {}",
        id,
        request.distributions.len(),
        actor.id
    );

    let result = db
        .movements
        .distribute(&id, &request.distributions, &actor.id)
        .await;
    created_or_error(result)
}

/// Cancel a pending movement
pub async fn cancel_movement(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
) -> impl IntoResponse {
    info!("Cancelling movement {} for {}", id, actor.id);

    ok_or_error(db.movements.cancel(&id, &actor.id).await)
}

/// Pending confirmations of a product
pub async fn list_pending(
    State(db): State<DbState>,
    Path(id): Path<String>,
    _actor: CurrentActor,
) -> impl IntoResponse {
    ok_or_error(db.movements.list_pending(&id).await)
}
