// ABOUTME: Board-to-board transfer of purchased products
// ABOUTME: Target resolution, reassignment and the transfer log

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};

use stockboard_catalog::repo;
use stockboard_catalog::{Column, Kanban, KanbanLink, KanbanType, Product};
use stockboard_core::generate_id;
use stockboard_storage::{StorageError, StorageResult};

use crate::types::{TransferLog, TransferType};

/// Receive board a product transfers to: its own preference, else its board's default
pub fn resolve_target(product: &Product, kanban: &Kanban) -> Option<String> {
    product
        .preferred_receive_kanban_id
        .clone()
        .or_else(|| kanban.default_linked_kanban_id.clone())
}

/// Verified link from `from` to `to_kanban_id`, if both ends are the right board types
pub async fn verified_link(
    conn: &mut SqliteConnection,
    from: &Kanban,
    to_kanban_id: &str,
) -> StorageResult<Option<(KanbanLink, Kanban)>> {
    if from.kanban_type != KanbanType::Order {
        return Ok(None);
    }

    let Some(link) = repo::find_verified_link(conn, &from.id, to_kanban_id).await? else {
        return Ok(None);
    };
    let target = repo::fetch_kanban(conn, to_kanban_id).await?;
    if target.kanban_type != KanbanType::Receive {
        return Ok(None);
    }

    Ok(Some((link, target)))
}

/// Reassign a Purchased product to `target` and append the transfer log row.
///
/// The product keeps its column, lands at the front of it on the new board and takes
/// the target board's location when that board has one.
pub async fn apply_transfer(
    conn: &mut SqliteConnection,
    product: &Product,
    from: &Kanban,
    target: &Kanban,
    transfer_type: TransferType,
    transferred_by: &str,
    now: DateTime<Utc>,
) -> StorageResult<TransferLog> {
    let column = product.column_status;
    let position = repo::front_position(conn, &target.id, column, Some(&product.id)).await?;
    let location_id = target
        .location_id
        .clone()
        .or_else(|| product.location_id.clone());

    sqlx::query(
        r#"
        UPDATE products SET
            kanban_id = ?, location_id = ?, column_position = ?, column_entered_at = ?,
            product_group_id = NULL, group_position = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&target.id)
    .bind(&location_id)
    .bind(position)
    .bind(now)
    .bind(now)
    .bind(&product.id)
    .execute(&mut *conn)
    .await?;

    let log = TransferLog {
        id: generate_id("xfer"),
        product_id: product.id.clone(),
        from_kanban_id: from.id.clone(),
        to_kanban_id: target.id.clone(),
        from_column: column,
        to_column: column,
        transfer_type,
        transferred_by: transferred_by.to_string(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO transfer_logs (
            id, product_id, from_kanban_id, to_kanban_id, from_column, to_column,
            transfer_type, transferred_by, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&log.id)
    .bind(&log.product_id)
    .bind(&log.from_kanban_id)
    .bind(&log.to_kanban_id)
    .bind(log.from_column)
    .bind(log.to_column)
    .bind(log.transfer_type)
    .bind(&log.transferred_by)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;

    info!(
        "Transferred product {} from {} to {} ({:?})",
        product.id, from.name, target.name, transfer_type
    );

    Ok(log)
}

/// Transfer history of one product, oldest first
pub async fn list_transfers(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> StorageResult<Vec<TransferLog>> {
    debug!("Listing transfers for product {}", product_id);

    let rows = sqlx::query("SELECT * FROM transfer_logs WHERE product_id = ? ORDER BY rowid")
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_transfer).collect()
}

fn row_to_transfer(row: &SqliteRow) -> StorageResult<TransferLog> {
    let from_column: Column = row.try_get("from_column")?;
    let to_column: Column = row.try_get("to_column")?;

    Ok(TransferLog {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        from_kanban_id: row.try_get("from_kanban_id")?,
        to_kanban_id: row.try_get("to_kanban_id")?,
        from_column,
        to_column,
        transfer_type: row.try_get("transfer_type")?,
        transferred_by: row.try_get("transferred_by")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Reject a manual transfer unless the product is a committed purchase
pub fn ensure_transferable(product: &Product) -> StorageResult<()> {
    if product.column_status != Column::Purchased {
        return Err(StorageError::InvalidTransferState(format!(
            "product {} is in {}, only Purchased products can be transferred",
            product.id, product.column_status
        )));
    }
    if product.is_draft {
        return Err(StorageError::InvalidTransferState(format!(
            "product {} is still a draft",
            product.id
        )));
    }
    Ok(())
}
