// ABOUTME: HTTP request handlers for product state and workflow moves
// ABOUTME: Creation, column moves, evidence, transfers and the ledger view

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockboard_catalog::{Product, ProductCreateInput};
use stockboard_kanban::{MoveRequest, TransferLog, ValidationInput};
use stockboard_ledger::{LedgerVerification, MovementLog};
use stockboard_storage::StorageResult;

use crate::auth::CurrentActor;
use crate::response::{created_or_error, ok_or_error};
use crate::state::DbState;

/// Create a product on a board
pub async fn create_product(
    State(db): State<DbState>,
    actor: CurrentActor,
    Json(input): Json<ProductCreateInput>,
) -> impl IntoResponse {
    info!("Creating product on kanban {} for {}", input.kanban_id, actor.id);

    let result = db.catalog.create_product(input, &actor.id).await;
    created_or_error(result)
}

pub async fn get_product(
    State(db): State<DbState>,
    Path(id): Path<String>,
    _actor: CurrentActor,
) -> impl IntoResponse {
    ok_or_error(db.catalog.get_product(&id).await)
}

/// Move a product to another column of its board
pub async fn move_product(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
    Json(request): Json<MoveRequest>,
) -> impl IntoResponse {
    info!(
        "Moving product {} to {} for {}",
        id, request.target_column, actor.id
    );

    let result = db.engine.move_product(&id, request, &actor.id).await;
    ok_or_error(result)
}

/// Record evidence that opens the validation gate
pub async fn record_validation(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
    Json(input): Json<ValidationInput>,
) -> impl IntoResponse {
    info!("Recording {} evidence for product {}", input.column_status, id);

    let result = db.engine.record_validation(&id, input, &actor.id).await;
    created_or_error(result)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub target_kanban_id: Option<String>,
}

/// Manual transfer to a linked receive board
pub async fn transfer_product(
    State(db): State<DbState>,
    Path(id): Path<String>,
    actor: CurrentActor,
    Json(request): Json<TransferRequest>,
) -> impl IntoResponse {
    info!("Transferring product {} for {}", id, actor.id);

    let result = db
        .engine
        .transfer_product(&id, request.target_kanban_id.as_deref(), &actor.id)
        .await;
    ok_or_error(result)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerView {
    pub product: Product,
    pub entries: Vec<MovementLog>,
    pub transfers: Vec<TransferLog>,
    pub verification: LedgerVerification,
}

/// Product history with the replay check
pub async fn get_ledger(
    State(db): State<DbState>,
    Path(id): Path<String>,
    _actor: CurrentActor,
) -> impl IntoResponse {
    ok_or_error(load_ledger(&db, &id).await)
}

async fn load_ledger(db: &DbState, id: &str) -> StorageResult<LedgerView> {
    let product = db.catalog.get_product(id).await?;
    let entries = db.ledger.list_for_product(id).await?;
    let transfers = db.engine.list_transfers(id).await?;
    let verification = db.ledger.verify_product(id).await?;

    Ok(LedgerView {
        product,
        entries,
        transfers,
        verification,
    })
}
