// ABOUTME: Ledger storage layer using SQLite
// ABOUTME: Append, read and the controlled pending-to-terminal status transitions

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use stockboard_core::generate_id;
use stockboard_storage::{StorageError, StorageResult};

use crate::replay::{replay_stock_level, LedgerVerification};
use crate::types::{AdjustmentType, MovementLog, MovementStatus, MovementType, NewMovementLog};

/// Append a row and return it as stored
pub async fn insert(
    conn: &mut SqliteConnection,
    entry: NewMovementLog,
    now: DateTime<Utc>,
) -> StorageResult<MovementLog> {
    let id = generate_id("mov");

    debug!(
        "Appending ledger row {} ({:?}/{:?}) for product {}",
        id, entry.movement_type, entry.status, entry.product_id
    );

    let approved_at = (entry.movement_type == MovementType::Adjustment
        && entry.status == MovementStatus::Approved)
        .then_some(now);
    let approved_by = approved_at.map(|_| entry.moved_by.clone());
    let confirmed_at = (entry.status == MovementStatus::Received).then_some(now);
    let confirmed_by = confirmed_at.map(|_| entry.moved_by.clone());

    sqlx::query(
        r#"
        INSERT INTO movement_logs (
            id, product_id, destination_product_id,
            from_location_id, to_location_id, from_person_id, to_person_id,
            from_stock_level, to_stock_level, quantity_moved,
            movement_type, status, adjustment_type, reason, notes,
            public_token, token_expires_at,
            moved_by, confirmed_by, confirmed_at, approved_by, approved_at,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&entry.product_id)
    .bind(&entry.destination_product_id)
    .bind(&entry.from_location_id)
    .bind(&entry.to_location_id)
    .bind(&entry.from_person_id)
    .bind(&entry.to_person_id)
    .bind(entry.from_stock_level)
    .bind(entry.to_stock_level)
    .bind(entry.quantity_moved)
    .bind(entry.movement_type)
    .bind(entry.status)
    .bind(entry.adjustment_type)
    .bind(&entry.reason)
    .bind(&entry.notes)
    .bind(&entry.public_token)
    .bind(entry.token_expires_at)
    .bind(&entry.moved_by)
    .bind(&confirmed_by)
    .bind(confirmed_at)
    .bind(&approved_by)
    .bind(approved_at)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    fetch(conn, &id).await
}

/// Get a single row by id
pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> StorageResult<MovementLog> {
    let row = sqlx::query("SELECT * FROM movement_logs WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StorageError::Sqlx)?
        .ok_or_else(|| StorageError::not_found("Movement", id))?;

    row_to_entry(&row)
}

/// Get the row behind a public confirmation token
pub async fn fetch_by_token(conn: &mut SqliteConnection, token: &str) -> StorageResult<MovementLog> {
    let row = sqlx::query("SELECT * FROM movement_logs WHERE public_token = ?")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StorageError::Sqlx)?
        // The token itself never goes into error messages or logs
        .ok_or_else(|| StorageError::not_found("Confirmation link", "<token>"))?;

    row_to_entry(&row)
}

/// Every row touching a product on either side, in creation order
pub async fn list_for_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> StorageResult<Vec<MovementLog>> {
    let rows = sqlx::query(
        "SELECT * FROM movement_logs WHERE product_id = ? OR destination_product_id = ? ORDER BY rowid",
    )
    .bind(product_id)
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    rows.iter().map(row_to_entry).collect()
}

/// Pending confirmation rows sourced from a product
pub async fn list_pending_movements(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> StorageResult<Vec<MovementLog>> {
    let rows = sqlx::query(
        "SELECT * FROM movement_logs WHERE product_id = ? AND status = 'pending' AND movement_type != 'adjustment' ORDER BY rowid",
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    rows.iter().map(row_to_entry).collect()
}

/// Adjustment rows for a product, optionally narrowed to one status
pub async fn list_adjustments(
    conn: &mut SqliteConnection,
    product_id: &str,
    status: Option<MovementStatus>,
) -> StorageResult<Vec<MovementLog>> {
    let rows = match status {
        Some(status) => sqlx::query(
            "SELECT * FROM movement_logs WHERE product_id = ? AND movement_type = 'adjustment' AND status = ? ORDER BY rowid",
        )
        .bind(product_id)
        .bind(status)
        .fetch_all(&mut *conn)
        .await,
        None => sqlx::query(
            "SELECT * FROM movement_logs WHERE product_id = ? AND movement_type = 'adjustment' ORDER BY rowid",
        )
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await,
    }
    .map_err(StorageError::Sqlx)?;

    rows.iter().map(row_to_entry).collect()
}

/// Fields written when a pending movement is confirmed
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub quantity_received: i64,
    pub destination_product_id: Option<String>,
    pub from_stock_level: Option<i64>,
    pub to_stock_level: Option<i64>,
    pub confirmed_by: String,
}

/// pending -> received. The requested quantity is replaced by the received one.
pub async fn record_confirmation(
    conn: &mut SqliteConnection,
    id: &str,
    confirmation: &Confirmation,
    now: DateTime<Utc>,
) -> StorageResult<MovementLog> {
    let result = sqlx::query(
        r#"
        UPDATE movement_logs
        SET status = 'received',
            quantity_moved = ?,
            destination_product_id = COALESCE(?, destination_product_id),
            from_stock_level = COALESCE(?, from_stock_level),
            to_stock_level = COALESCE(?, to_stock_level),
            confirmed_by = ?,
            confirmed_at = ?,
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(confirmation.quantity_received)
    .bind(&confirmation.destination_product_id)
    .bind(confirmation.from_stock_level)
    .bind(confirmation.to_stock_level)
    .bind(&confirmation.confirmed_by)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    ensure_transitioned(conn, id, result.rows_affected()).await
}

/// pending -> expired, the lazy self-heal applied on every read path
pub async fn record_expiry(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> StorageResult<MovementLog> {
    let result = sqlx::query(
        "UPDATE movement_logs SET status = 'expired', updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    ensure_transitioned(conn, id, result.rows_affected()).await
}

/// pending -> cancelled. A public token is kept but forced into the past so a
/// stale link still resolves and reports the cancellation.
pub async fn record_cancellation(
    conn: &mut SqliteConnection,
    id: &str,
    cancelled_by: &str,
    now: DateTime<Utc>,
) -> StorageResult<MovementLog> {
    let invalidated_expiry = now - Duration::seconds(1);

    let result = sqlx::query(
        r#"
        UPDATE movement_logs
        SET status = 'cancelled',
            cancelled_by = ?,
            cancelled_at = ?,
            token_expires_at = CASE WHEN public_token IS NULL THEN token_expires_at ELSE ? END,
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(cancelled_by)
    .bind(now)
    .bind(invalidated_expiry)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    ensure_transitioned(conn, id, result.rows_affected()).await
}

/// pending -> approved for an adjustment, stamping the stock it was applied against
pub async fn record_approval(
    conn: &mut SqliteConnection,
    id: &str,
    approved_by: &str,
    from_stock_level: i64,
    to_stock_level: i64,
    now: DateTime<Utc>,
) -> StorageResult<MovementLog> {
    let result = sqlx::query(
        r#"
        UPDATE movement_logs
        SET status = 'approved',
            from_stock_level = ?,
            to_stock_level = ?,
            approved_by = ?,
            approved_at = ?,
            updated_at = ?
        WHERE id = ? AND status = 'pending' AND movement_type = 'adjustment'
        "#,
    )
    .bind(from_stock_level)
    .bind(to_stock_level)
    .bind(approved_by)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    ensure_transitioned(conn, id, result.rows_affected()).await
}

/// Edit a pending adjustment in place
pub async fn update_pending_adjustment(
    conn: &mut SqliteConnection,
    id: &str,
    change: i64,
    adjustment_type: AdjustmentType,
    reason: &str,
    now: DateTime<Utc>,
) -> StorageResult<MovementLog> {
    let result = sqlx::query(
        r#"
        UPDATE movement_logs
        SET quantity_moved = ?, adjustment_type = ?, reason = ?, updated_at = ?
        WHERE id = ? AND status = 'pending' AND movement_type = 'adjustment'
        "#,
    )
    .bind(change)
    .bind(adjustment_type)
    .bind(reason)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(StorageError::Sqlx)?;

    ensure_transitioned(conn, id, result.rows_affected()).await
}

async fn ensure_transitioned(
    conn: &mut SqliteConnection,
    id: &str,
    rows_affected: u64,
) -> StorageResult<MovementLog> {
    let entry = fetch(conn, id).await?;
    if rows_affected == 0 {
        return Err(StorageError::InvalidState(format!(
            "movement {} is {:?}, not pending",
            id, entry.status
        )));
    }
    Ok(entry)
}

/// Compare a product's recorded stock level with its replayed ledger
pub async fn verify_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> StorageResult<LedgerVerification> {
    let recorded: Option<i64> = sqlx::query_scalar("SELECT stock_level FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(StorageError::Sqlx)?
        .ok_or_else(|| StorageError::not_found("Product", product_id))?;

    let entries = list_for_product(conn, product_id).await?;
    let replayed = replay_stock_level(&entries, product_id);

    Ok(LedgerVerification::new(
        product_id,
        recorded.unwrap_or(0),
        replayed,
        entries.len(),
    ))
}

/// Helper to convert row to MovementLog
fn row_to_entry(row: &SqliteRow) -> StorageResult<MovementLog> {
    Ok(MovementLog {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        destination_product_id: row.try_get("destination_product_id")?,
        from_location_id: row.try_get("from_location_id")?,
        to_location_id: row.try_get("to_location_id")?,
        from_person_id: row.try_get("from_person_id")?,
        to_person_id: row.try_get("to_person_id")?,
        from_stock_level: row.try_get("from_stock_level")?,
        to_stock_level: row.try_get("to_stock_level")?,
        quantity_moved: row.try_get("quantity_moved")?,
        movement_type: row.try_get("movement_type")?,
        status: row.try_get("status")?,
        adjustment_type: row.try_get("adjustment_type")?,
        reason: row.try_get("reason")?,
        notes: row.try_get("notes")?,
        public_token: row.try_get("public_token")?,
        token_expires_at: row.try_get("token_expires_at")?,
        moved_by: row.try_get("moved_by")?,
        confirmed_by: row.try_get("confirmed_by")?,
        confirmed_at: row.try_get("confirmed_at")?,
        cancelled_by: row.try_get("cancelled_by")?,
        cancelled_at: row.try_get("cancelled_at")?,
        approved_by: row.try_get("approved_by")?,
        approved_at: row.try_get("approved_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Read-side access to the ledger for API handlers and tooling
pub struct LedgerStorage {
    pool: SqlitePool,
}

impl LedgerStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a single ledger row by ID
    pub async fn get_entry(&self, id: &str) -> StorageResult<MovementLog> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// List a product's ledger in creation order
    pub async fn list_for_product(&self, product_id: &str) -> StorageResult<Vec<MovementLog>> {
        let mut conn = self.pool.acquire().await?;
        list_for_product(&mut conn, product_id).await
    }

    /// Replay one product's ledger against its recorded stock
    pub async fn verify_product(&self, product_id: &str) -> StorageResult<LedgerVerification> {
        let mut conn = self.pool.acquire().await?;
        verify_product(&mut conn, product_id).await
    }

    /// Replay every product's ledger; returns one verification per product
    pub async fn verify_all(&self) -> StorageResult<Vec<LedgerVerification>> {
        let mut conn = self.pool.acquire().await?;

        let product_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM products ORDER BY rowid")
            .fetch_all(&mut *conn)
            .await?;

        let mut results = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            results.push(verify_product(&mut conn, &product_id).await?);
        }

        Ok(results)
    }
}
