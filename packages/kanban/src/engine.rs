// ABOUTME: Kanban workflow engine
// ABOUTME: Validated column moves, draft promotion, evidence gate and board transfers

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use stockboard_catalog::storage::product_invalidations;
use stockboard_catalog::{repo, Column, KanbanType, Product};
use stockboard_core::{generate_id, InvalidationSink, Resource, DEFAULT_ACTOR};
use stockboard_storage::{begin_write, lock_product, StorageError, StorageResult, ValidationDetails};

use crate::transfer;
use crate::types::{ColumnValidation, MoveOutcome, MoveRequest, TransferLog, TransferType, ValidationInput};

const REQUIRED_EVIDENCE: &str = "photo";

pub struct WorkflowEngine {
    pool: SqlitePool,
    sink: Arc<dyn InvalidationSink>,
}

impl WorkflowEngine {
    pub fn new(pool: SqlitePool, sink: Arc<dyn InvalidationSink>) -> Self {
        Self { pool, sink }
    }

    /// Move a product to another column of its board.
    ///
    /// The product lands at the front of the target column and its column timer resets.
    /// Entering Received on a receive board needs recorded evidence unless
    /// `skip_validation` is set. Entering Purchased on an order board carries the product
    /// to its linked receive board when a verified link exists.
    pub async fn move_product(
        &self,
        product_id: &str,
        request: MoveRequest,
        actor: &str,
    ) -> StorageResult<MoveOutcome> {
        let target = request.target_column;
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        let kanban = repo::fetch_kanban(&mut tx, &product.kanban_id).await?;
        let from_column = product.column_status;
        let from_location = product.location_id.clone();

        if !kanban.kanban_type.allows(target) {
            warn!(
                "Rejected move of {} to {} on {} board",
                product_id, target, kanban.kanban_type
            );
            return Err(StorageError::InvalidTransition {
                kanban_type: kanban.kanban_type.to_string(),
                column: target.to_string(),
            });
        }

        if product.column_status == target {
            debug!("Product {} already in {}", product_id, target);
            return Ok(MoveOutcome {
                product,
                transfer: None,
            });
        }

        if kanban.kanban_type == KanbanType::Receive
            && target.requires_evidence()
            && !request.skip_validation
            && !has_validation(&mut tx, product_id, target).await?
        {
            debug!("Product {} needs evidence before {}", product_id, target);
            return Err(StorageError::ValidationRequired(ValidationDetails {
                product_id: product_id.to_string(),
                kanban_id: kanban.id.clone(),
                target_column: target.label().to_string(),
                required_evidence: REQUIRED_EVIDENCE.to_string(),
            }));
        }

        if target == Column::Purchased && product.is_rejected {
            return Err(StorageError::InvalidState(format!(
                "product {} was rejected and cannot be purchased",
                product_id
            )));
        }

        if let Some(location_id) = &request.location_id {
            repo::fetch_location(&mut tx, location_id).await?;
        }
        let location_id = request.location_id.or_else(|| product.location_id.clone());

        let position = repo::front_position(&mut tx, &kanban.id, target, Some(product_id)).await?;
        let stock_level = match (target, product.stock_level) {
            (Column::Stored, None) => Some(0),
            (_, level) => level,
        };
        let is_draft = kanban.kanban_type.is_draft_column(target);

        sqlx::query(
            r#"
            UPDATE products SET
                column_status = ?, column_position = ?, column_entered_at = ?,
                stock_level = ?, is_draft = ?, location_id = ?,
                product_group_id = NULL, group_position = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(target)
        .bind(position)
        .bind(now)
        .bind(stock_level)
        .bind(is_draft)
        .bind(&location_id)
        .bind(now)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        let moved = repo::fetch_product(&mut tx, product_id).await?;

        let mut transfer_log = None;
        if kanban.kanban_type == KanbanType::Order
            && target == Column::Purchased
            && !moved.is_draft
        {
            if let Some(target_id) = transfer::resolve_target(&moved, &kanban) {
                match transfer::verified_link(&mut tx, &kanban, &target_id).await? {
                    Some((_, receive)) => {
                        let log = transfer::apply_transfer(
                            &mut tx,
                            &moved,
                            &kanban,
                            &receive,
                            TransferType::Automatic,
                            DEFAULT_ACTOR,
                            now,
                        )
                        .await?;
                        transfer_log = Some(log);
                    }
                    None => debug!(
                        "No verified link {} -> {}; product {} stays put",
                        kanban.id, target_id, product_id
                    ),
                }
            }
        }

        let product = repo::fetch_product(&mut tx, product_id).await?;
        tx.commit().await?;

        info!(
            "Moved product {} from {} to {} by {}",
            product_id, from_column, target, actor
        );

        let mut invalidations = product_invalidations(&product);
        invalidations
            .add_opt(Resource::Location, from_location.as_deref())
            .add_id(Resource::Kanban, kanban.id.as_str());
        if let Some(log) = &transfer_log {
            invalidations
                .add_id(Resource::Kanban, log.to_kanban_id.as_str())
                .add(Resource::TransferLog);
        }
        invalidations.emit(self.sink.as_ref());

        Ok(MoveOutcome {
            product,
            transfer: transfer_log,
        })
    }

    /// Explicitly carry a purchased product to a linked receive board.
    ///
    /// Without `target_kanban_id` the product's preference, then the board default, is used.
    pub async fn transfer_product(
        &self,
        product_id: &str,
        target_kanban_id: Option<&str>,
        actor: &str,
    ) -> StorageResult<MoveOutcome> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        let kanban = repo::fetch_kanban(&mut tx, &product.kanban_id).await?;

        transfer::ensure_transferable(&product)?;

        let target_id = target_kanban_id
            .map(str::to_string)
            .or_else(|| transfer::resolve_target(&product, &kanban))
            .ok_or_else(|| {
                StorageError::InvalidTransferState(format!(
                    "no receive board configured for product {}",
                    product_id
                ))
            })?;

        let (_, receive) = transfer::verified_link(&mut tx, &kanban, &target_id)
            .await?
            .ok_or_else(|| {
                StorageError::InvalidTransferState(format!(
                    "no verified link from {} to {}",
                    kanban.id, target_id
                ))
            })?;

        let log = transfer::apply_transfer(
            &mut tx,
            &product,
            &kanban,
            &receive,
            TransferType::Manual,
            actor,
            now,
        )
        .await?;

        let product = repo::fetch_product(&mut tx, product_id).await?;
        tx.commit().await?;

        let mut invalidations = product_invalidations(&product);
        invalidations
            .add_id(Resource::Kanban, kanban.id.as_str())
            .add_id(Resource::Kanban, receive.id.as_str())
            .add(Resource::TransferLog);
        invalidations.emit(self.sink.as_ref());

        Ok(MoveOutcome {
            product,
            transfer: Some(log),
        })
    }

    /// Record evidence that opens the validation gate for one product/column pair
    pub async fn record_validation(
        &self,
        product_id: &str,
        input: ValidationInput,
        recorded_by: &str,
    ) -> StorageResult<ColumnValidation> {
        let evidence_url = input.evidence_url.trim().to_string();
        if evidence_url.is_empty() {
            return Err(StorageError::InvalidInput(
                "evidence URL is required".to_string(),
            ));
        }

        let mut tx = begin_write(&self.pool).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        let kanban = repo::fetch_kanban(&mut tx, &product.kanban_id).await?;
        if !kanban.kanban_type.allows(input.column_status) {
            return Err(StorageError::InvalidTransition {
                kanban_type: kanban.kanban_type.to_string(),
                column: input.column_status.to_string(),
            });
        }

        let validation = ColumnValidation {
            id: generate_id("val"),
            product_id: product_id.to_string(),
            column_status: input.column_status,
            evidence_url,
            notes: input.notes,
            recorded_by: recorded_by.to_string(),
            recorded_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO column_validations (id, product_id, column_status, evidence_url, notes, recorded_by, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&validation.id)
        .bind(&validation.product_id)
        .bind(validation.column_status)
        .bind(&validation.evidence_url)
        .bind(&validation.notes)
        .bind(&validation.recorded_by)
        .bind(validation.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Recorded {} evidence for product {} by {}",
            validation.column_status, product_id, recorded_by
        );

        let mut invalidations = product_invalidations(&product);
        invalidations.add_id(Resource::Kanban, kanban.id.as_str());
        invalidations.emit(self.sink.as_ref());

        Ok(validation)
    }

    /// Board-to-board history of one product
    pub async fn list_transfers(&self, product_id: &str) -> StorageResult<Vec<TransferLog>> {
        let mut conn = self.pool.acquire().await?;
        transfer::list_transfers(&mut conn, product_id).await
    }

    pub async fn get_product(&self, product_id: &str) -> StorageResult<Product> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_product(&mut conn, product_id).await
    }
}

async fn has_validation(
    conn: &mut SqliteConnection,
    product_id: &str,
    column: Column,
) -> StorageResult<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM column_validations WHERE product_id = ? AND column_status = ?",
    )
    .bind(product_id)
    .bind(column)
    .fetch_one(&mut *conn)
    .await?;

    let count: i64 = row.try_get("n")?;
    Ok(count > 0)
}
