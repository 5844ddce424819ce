// ABOUTME: HTTP request handlers for stock adjustments
// ABOUTME: Direct corrections, absolute counts and the approval lifecycle

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;

use stockboard_adjustments::{AdjustmentInput, SetStockInput};
use stockboard_ledger::{AdjustmentType, MovementStatus};
use stockboard_storage::StorageError;

use crate::auth::CurrentActor;
use crate::response::{created_or_error, ok_or_error, ApiError};
use crate::state::DbState;

/// Either a signed change or a counted quantity
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    pub quantity_change: Option<i64>,
    pub new_quantity: Option<i64>,
    pub adjustment_type: Option<AdjustmentType>,
    pub reason: String,
    pub notes: Option<String>,
    /// Park the change as pending instead of applying it
    #[serde(default)]
    pub requires_approval: bool,
}

pub async fn create_adjustment(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
    Json(request): Json<AdjustmentRequest>,
) -> Response {
    info!("Adjusting product {} for {}", id, actor.id);

    match (request.quantity_change, request.new_quantity) {
        (Some(change), None) => {
            let input = AdjustmentInput {
                quantity_change: change,
                adjustment_type: request.adjustment_type.unwrap_or(AdjustmentType::Correction),
                reason: request.reason,
                notes: request.notes,
            };
            if request.requires_approval {
                created_or_error(db.adjustments.request_adjustment(&id, input, &actor.id).await)
            } else {
                created_or_error(db.adjustments.adjust(&id, input, &actor.id).await)
            }
        }
        (None, Some(new_quantity)) if !request.requires_approval => {
            let input = SetStockInput {
                new_quantity,
                adjustment_type: request.adjustment_type.unwrap_or(AdjustmentType::Recount),
                reason: request.reason,
                notes: request.notes,
            };
            created_or_error(db.adjustments.adjust_to(&id, input, &actor.id).await)
        }
        (None, Some(_)) => ApiError(StorageError::InvalidInput(
            "approval requests take a quantityChange".to_string(),
        ))
        .into_response(),
        _ => ApiError(StorageError::InvalidInput(
            "exactly one of quantityChange or newQuantity is required".to_string(),
        ))
        .into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjustmentListQuery {
    pub status: Option<MovementStatus>,
}

pub async fn list_adjustments(
    State(db): State<DbState>,
    Path(id): Path<String>,
    _actor: CurrentActor,
    Query(query): Query<AdjustmentListQuery>,
) -> impl IntoResponse {
    ok_or_error(db.adjustments.list_adjustments(&id, query.status).await)
}

/// Edit a pending adjustment
pub async fn update_adjustment(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
    Json(input): Json<AdjustmentInput>,
) -> impl IntoResponse {
    info!("Updating adjustment {} for {}", id, actor.id);

    ok_or_error(db.adjustments.update_pending_adjustment(&id, input).await)
}

pub async fn approve_adjustment(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
) -> impl IntoResponse {
    info!("Approving adjustment {} for {}", id, actor.id);

    ok_or_error(db.adjustments.approve_adjustment(&id, &actor.id).await)
}

pub async fn cancel_adjustment(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
) -> impl IntoResponse {
    info!("Cancelling adjustment {} for {}", id, actor.id);

    ok_or_error(db.adjustments.cancel_adjustment(&id, &actor.id).await)
}
