// ABOUTME: Unauthenticated handlers for the public confirmation link
// ABOUTME: The token in the path is the only credential

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use tracing::info;

use stockboard_movements::{ConfirmInput, PublicMovement};

use crate::response::ok_or_error;
use crate::state::DbState;

pub async fn get_movement(
    State(db): State<DbState>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    ok_or_error(db.movements.get_by_token(&token).await)
}

pub async fn confirm_movement(
    State(db): State<DbState>,
    Path(token): Path<String>,
    Json(input): Json<ConfirmInput>,
) -> impl IntoResponse {
    info!(
        "Confirming movement via public link ({} received by {})",
        input.quantity_received, input.confirmed_by
    );

    let result = db
        .movements
        .confirm(&token, input)
        .await
        .map(|outcome| PublicMovement::new(&outcome.entry, &outcome.product));
    ok_or_error(result)
}
