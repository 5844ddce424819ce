// ABOUTME: Adjustment service: direct corrections and the pending/approve/cancel lifecycle
// ABOUTME: Every applied change keeps stock non-negative and lands in the ledger

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use stockboard_catalog::storage::product_invalidations;
use stockboard_catalog::{repo, Product};
use stockboard_core::{InvalidationSink, Invalidations, Resource};
use stockboard_ledger::storage as ledger;
use stockboard_ledger::{MovementLog, MovementStatus, MovementType, NewMovementLog};
use stockboard_storage::{begin_write, lock_product, StorageError, StorageResult};

use crate::types::{AdjustmentInput, AdjustmentOutcome, SetStockInput};

/// Stock level after applying `change` to `current`.
///
/// A zero change is meaningless and rejected; a result below zero is `NegativeStock`.
pub fn apply_change(current: i64, change: i64) -> StorageResult<i64> {
    if change == 0 {
        return Err(StorageError::InvalidInput(
            "adjustment must change the stock level".to_string(),
        ));
    }

    let next = current.checked_add(change).ok_or_else(|| {
        StorageError::InvalidInput(format!("adjustment {} overflows stock {}", change, current))
    })?;
    if next < 0 {
        return Err(StorageError::NegativeStock { current, change });
    }
    Ok(next)
}

pub struct AdjustmentService {
    pool: SqlitePool,
    sink: Arc<dyn InvalidationSink>,
}

impl AdjustmentService {
    pub fn new(pool: SqlitePool, sink: Arc<dyn InvalidationSink>) -> Self {
        Self { pool, sink }
    }

    /// Apply a signed correction immediately; the ledger row is approved by `actor`
    pub async fn adjust(
        &self,
        product_id: &str,
        input: AdjustmentInput,
        actor: &str,
    ) -> StorageResult<AdjustmentOutcome> {
        let reason = required_reason(&input.reason)?;
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        ensure_stored(&product)?;

        let current = product.current_stock();
        let next = apply_change(current, input.quantity_change).map_err(|err| {
            if let StorageError::NegativeStock { .. } = err {
                warn!(
                    "Adjustment of {} by {} rejected: stock is {}",
                    product.id, input.quantity_change, current
                );
            }
            err
        })?;

        let outcome = self
            .apply(&mut tx, &product, input, next, reason, actor, now)
            .await?;
        tx.commit().await?;

        info!(
            "Adjusted {} by {} ({:?}) to {}",
            product_id,
            outcome.entry.quantity_moved,
            outcome.entry.adjustment_type,
            outcome.product.current_stock()
        );

        product_invalidations(&outcome.product).emit(self.sink.as_ref());
        Ok(outcome)
    }

    /// Set stock to a counted quantity.
    ///
    /// A count that matches the current stock still records a zero-change row, so the
    /// ledger shows when the product was last counted.
    pub async fn adjust_to(
        &self,
        product_id: &str,
        input: SetStockInput,
        actor: &str,
    ) -> StorageResult<AdjustmentOutcome> {
        let reason = required_reason(&input.reason)?;
        if input.new_quantity < 0 {
            return Err(StorageError::InvalidInput(format!(
                "counted quantity cannot be negative, got {}",
                input.new_quantity
            )));
        }

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        ensure_stored(&product)?;

        let change = input.new_quantity - product.current_stock();
        let delta = AdjustmentInput {
            quantity_change: change,
            adjustment_type: input.adjustment_type,
            reason: input.reason,
            notes: input.notes,
        };

        let outcome = self
            .apply(&mut tx, &product, delta, input.new_quantity, reason, actor, now)
            .await?;
        tx.commit().await?;

        info!(
            "Counted {} at {} (change {})",
            product_id, input.new_quantity, change
        );

        product_invalidations(&outcome.product).emit(self.sink.as_ref());
        Ok(outcome)
    }

    /// Raise an adjustment for later approval; stock does not change yet
    pub async fn request_adjustment(
        &self,
        product_id: &str,
        input: AdjustmentInput,
        actor: &str,
    ) -> StorageResult<MovementLog> {
        let reason = required_reason(&input.reason)?;
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        ensure_stored(&product)?;
        apply_change(product.current_stock(), input.quantity_change)?;

        let mut row = NewMovementLog::adjustment(
            product_id,
            input.quantity_change,
            input.adjustment_type,
            MovementStatus::Pending,
            actor,
        );
        row.reason = Some(reason);
        row.notes = input.notes;
        row.from_location_id = product.location_id.clone();
        row.to_location_id = product.location_id.clone();

        let entry = ledger::insert(&mut tx, row, now).await?;
        tx.commit().await?;

        info!(
            "Adjustment {} of {} requested for {} by {}",
            entry.id, entry.quantity_moved, product_id, actor
        );

        self.emit_product(product_id);
        Ok(entry)
    }

    /// Approve a pending adjustment, re-checking it against the stock of the moment
    pub async fn approve_adjustment(
        &self,
        adjustment_id: &str,
        approver: &str,
    ) -> StorageResult<AdjustmentOutcome> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let entry = fetch_pending_adjustment(&mut tx, adjustment_id).await?;
        lock_product(&mut tx, &entry.product_id).await?;
        let product = repo::fetch_product(&mut tx, &entry.product_id).await?;
        ensure_stored(&product)?;

        let current = product.current_stock();
        let next = apply_change(current, entry.quantity_moved)?;
        repo::set_stock_level(&mut tx, &product.id, next, now).await?;
        let (product, to_stock_level) = reload_with_aggregate(&mut tx, &product.id).await?;

        let entry =
            ledger::record_approval(&mut tx, adjustment_id, approver, current, to_stock_level, now)
                .await?;
        tx.commit().await?;

        info!(
            "Adjustment {} approved by {}: {} -> {}",
            adjustment_id, approver, current, next
        );

        product_invalidations(&product).emit(self.sink.as_ref());
        Ok(AdjustmentOutcome {
            entry,
            product,
            to_stock_level,
        })
    }

    /// Edit a pending adjustment
    pub async fn update_pending_adjustment(
        &self,
        adjustment_id: &str,
        input: AdjustmentInput,
    ) -> StorageResult<MovementLog> {
        let reason = required_reason(&input.reason)?;
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let entry = fetch_pending_adjustment(&mut tx, adjustment_id).await?;
        let product = repo::fetch_product(&mut tx, &entry.product_id).await?;
        apply_change(product.current_stock(), input.quantity_change)?;

        let entry = ledger::update_pending_adjustment(
            &mut tx,
            adjustment_id,
            input.quantity_change,
            input.adjustment_type,
            &reason,
            now,
        )
        .await?;
        tx.commit().await?;

        debug!("Adjustment {} edited", adjustment_id);

        self.emit_product(&entry.product_id);
        Ok(entry)
    }

    /// Cancel a pending adjustment
    pub async fn cancel_adjustment(&self, adjustment_id: &str, actor: &str) -> StorageResult<MovementLog> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        fetch_pending_adjustment(&mut tx, adjustment_id).await?;
        let entry = ledger::record_cancellation(&mut tx, adjustment_id, actor, now).await?;
        tx.commit().await?;

        info!("Adjustment {} cancelled by {}", adjustment_id, actor);

        self.emit_product(&entry.product_id);
        Ok(entry)
    }

    /// Adjustments of a product, oldest first, optionally narrowed to one status
    pub async fn list_adjustments(
        &self,
        product_id: &str,
        status: Option<MovementStatus>,
    ) -> StorageResult<Vec<MovementLog>> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_product(&mut conn, product_id).await?;
        ledger::list_adjustments(&mut conn, product_id, status).await
    }

    /// Shared direct-apply path: new level, aggregate, approved ledger row
    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        product: &Product,
        input: AdjustmentInput,
        next: i64,
        reason: String,
        actor: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<AdjustmentOutcome> {
        let current = product.current_stock();
        repo::set_stock_level(conn, &product.id, next, now).await?;
        let (updated, to_stock_level) = reload_with_aggregate(conn, &product.id).await?;

        let mut row = NewMovementLog::adjustment(
            product.id.as_str(),
            input.quantity_change,
            input.adjustment_type,
            MovementStatus::Approved,
            actor,
        );
        row.reason = Some(reason);
        row.notes = input.notes;
        row.from_location_id = product.location_id.clone();
        row.to_location_id = product.location_id.clone();
        row.from_stock_level = Some(current);
        row.to_stock_level = Some(to_stock_level);

        let entry = ledger::insert(conn, row, now).await?;

        Ok(AdjustmentOutcome {
            entry,
            product: updated,
            to_stock_level,
        })
    }

    fn emit_product(&self, product_id: &str) {
        let mut invalidations = Invalidations::new();
        invalidations.add_id(Resource::Product, product_id);
        invalidations.emit(self.sink.as_ref());
    }
}

fn required_reason(reason: &str) -> StorageResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(StorageError::InvalidInput(
            "a reason is required for stock adjustments".to_string(),
        ));
    }
    Ok(reason.to_string())
}

fn ensure_stored(product: &Product) -> StorageResult<()> {
    if !product.is_stored() {
        return Err(StorageError::InvalidState(format!(
            "product {} is in {}, only stored stock can be adjusted",
            product.id, product.column_status
        )));
    }
    Ok(())
}

async fn fetch_pending_adjustment(
    conn: &mut SqliteConnection,
    adjustment_id: &str,
) -> StorageResult<MovementLog> {
    let entry = ledger::fetch(conn, adjustment_id).await?;
    if entry.movement_type != MovementType::Adjustment {
        return Err(StorageError::not_found("Adjustment", adjustment_id));
    }
    if entry.status != MovementStatus::Pending {
        return Err(StorageError::InvalidState(format!(
            "adjustment {} is {:?}; only pending adjustments can change",
            adjustment_id, entry.status
        )));
    }
    Ok(entry)
}

/// Re-read a product and its SKU aggregate at its location (its own level without one)
async fn reload_with_aggregate(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> StorageResult<(Product, i64)> {
    let product = repo::fetch_product(conn, product_id).await?;
    let aggregate = match &product.location_id {
        Some(location_id) => repo::sku_aggregate(conn, location_id, &product.sku_key()).await?,
        None => product.current_stock(),
    };
    Ok((product, aggregate))
}
