// ABOUTME: HTTP request handlers for board columns
// ABOUTME: Column listings and drag-and-drop reordering

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockboard_catalog::{Column, Product, ProductGroup};
use stockboard_kanban::ReorderItem;
use stockboard_storage::{StorageError, StorageResult};

use crate::auth::CurrentActor;
use crate::response::{ok_or_error, ApiError};
use crate::state::DbState;

fn parse_column(raw: &str) -> StorageResult<Column> {
    Column::from_str(raw).map_err(StorageError::InvalidInput)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    pub kanban_id: String,
    pub column: Column,
    pub products: Vec<Product>,
    pub groups: Vec<ProductGroup>,
}

pub async fn list_column(
    State(db): State<DbState>,
    Path((kanban_id, column)): Path<(String, String)>,
    _actor: CurrentActor,
) -> Response {
    let column = match parse_column(&column) {
        Ok(column) => column,
        Err(err) => return ApiError(err).into_response(),
    };

    ok_or_error(load_column(&db, kanban_id, column).await)
}

async fn load_column(db: &DbState, kanban_id: String, column: Column) -> StorageResult<ColumnView> {
    let products = db.catalog.list_column(&kanban_id, column).await?;
    let groups = db.ordering.list_groups(&kanban_id, column).await?;

    Ok(ColumnView {
        kanban_id,
        column,
        products,
        groups,
    })
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub items: Vec<ReorderItem>,
}

/// Persist a full ordering of a column
pub async fn reorder_column(
    State(db): State<DbState>,
    Path((kanban_id, column)): Path<(String, String)>,
    actor: CurrentActor,
    Json(request): Json<ReorderRequest>,
) -> Response {
    let column = match parse_column(&column) {
        Ok(column) => column,
        Err(err) => return ApiError(err).into_response(),
    };

    info!(
        "Reordering {} items in {}/{} for {}",
        request.items.len(),
        kanban_id,
        column,
        actor.id
    );

    ok_or_error(db.ordering.reorder(&kanban_id, column, &request.items).await)
}
