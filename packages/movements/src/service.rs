// ABOUTME: Movement service: direct moves, batch distribution and public confirmation
// ABOUTME: Each operation is one transaction around the executor plus its ledger rows

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use stockboard_catalog::storage::product_invalidations;
use stockboard_catalog::{repo, Product};
use stockboard_core::{
    generate_public_token, InvalidationSink, Invalidations, Resource, CONFIRMATION_TOKEN_TTL_DAYS,
};
use stockboard_ledger::storage::{self as ledger, Confirmation};
use stockboard_ledger::{MovementLog, MovementStatus, MovementType, NewMovementLog};
use stockboard_storage::{begin_write, lock_product, StorageError, StorageResult};

use crate::distribution::validate_distributions;
use crate::executor::{execute_single_movement, split_movement, Execution};
use crate::types::{
    ConfirmInput, Destination, Distribution, DistributionOutcome, MovementOutcome,
    MovementRequest, PublicMovement,
};

pub struct MovementService {
    pool: SqlitePool,
    sink: Arc<dyn InvalidationSink>,
    confirmation_ttl: Duration,
}

impl MovementService {
    pub fn new(pool: SqlitePool, sink: Arc<dyn InvalidationSink>) -> Self {
        Self {
            pool,
            sink,
            confirmation_ttl: Duration::days(CONFIRMATION_TOKEN_TTL_DAYS),
        }
    }

    /// Override how long public confirmation links stay valid
    pub fn with_confirmation_ttl(mut self, ttl: Duration) -> Self {
        self.confirmation_ttl = ttl;
        self
    }

    /// Move stock out of a stored product.
    ///
    /// Without confirmation the move is applied immediately. With confirmation a pending
    /// row carrying a public token is recorded and nothing moves until the recipient
    /// confirms.
    pub async fn create_movement(
        &self,
        product_id: &str,
        request: MovementRequest,
        actor: &str,
    ) -> StorageResult<MovementOutcome> {
        request.destination.validate()?;
        if request.quantity <= 0 {
            return Err(StorageError::InvalidInput(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        ensure_stored(&product)?;
        ensure_destination_exists(&mut tx, &request.destination).await?;

        let available = product.current_stock();
        if request.quantity > available {
            return Err(StorageError::InsufficientStock {
                requested: request.quantity,
                available,
            });
        }

        if request.requires_confirmation {
            let mut row = NewMovementLog::movement(
                product_id,
                request.quantity,
                MovementType::Manual,
                MovementStatus::Pending,
                actor,
            );
            row.from_location_id = product.location_id.clone();
            row.from_person_id = product.assigned_to_person_id.clone();
            row.to_location_id = request.destination.location_id.clone();
            row.to_person_id = request.destination.person_id.clone();
            row.from_stock_level = Some(available);
            row.notes = request.notes;
            row.public_token = Some(generate_public_token());
            row.token_expires_at = Some(now + self.confirmation_ttl);

            let entry = ledger::insert(&mut tx, row, now).await?;
            tx.commit().await?;

            info!(
                "Movement {} of {} units from {} awaiting confirmation",
                entry.id, entry.quantity_moved, product_id
            );

            let mut invalidations = Invalidations::new();
            invalidations.add_id(Resource::Product, product_id);
            invalidations.emit(self.sink.as_ref());

            return Ok(MovementOutcome {
                public_token: entry.public_token.clone(),
                entry,
                product,
                destination_product: None,
                to_stock_level: None,
            });
        }

        let execution = execute_single_movement(
            &mut tx,
            &product,
            request.quantity,
            &request.destination,
            actor,
            now,
        )
        .await?;

        let mut row = ledger_row(
            &product,
            request.quantity,
            MovementType::Manual,
            &execution,
            &request.destination,
            actor,
        );
        row.notes = request.notes;
        let entry = ledger::insert(&mut tx, row, now).await?;

        tx.commit().await?;

        info!(
            "Moved {} units of {} by {}, destination aggregate {}",
            request.quantity, product_id, actor, execution.to_stock_level
        );

        movement_invalidations(&product, &execution).emit(self.sink.as_ref());

        Ok(MovementOutcome {
            entry,
            to_stock_level: Some(execution.to_stock_level),
            product: execution.source,
            destination_product: Some(execution.destination_product),
            public_token: None,
        })
    }

    /// Split a product's stock across several destinations as new product rows.
    ///
    /// All lines are applied in one transaction; any failure leaves the source and the
    /// ledger untouched.
    pub async fn distribute(
        &self,
        product_id: &str,
        distributions: &[Distribution],
        actor: &str,
    ) -> StorageResult<DistributionOutcome> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;
        ensure_stored(&product)?;

        let total = validate_distributions(product.current_stock(), distributions)?;
        for line in distributions {
            ensure_destination_exists(&mut tx, &line.destination).await?;
        }

        let mut source = product.clone();
        let mut clones = Vec::with_capacity(distributions.len());
        let mut entries = Vec::with_capacity(distributions.len());
        let mut invalidations = product_invalidations(&product);

        for line in distributions {
            let execution =
                split_movement(&mut tx, &source, line.quantity, &line.destination, actor, now)
                    .await?;

            let row = ledger_row(
                &source,
                line.quantity,
                MovementType::Batch,
                &execution,
                &line.destination,
                actor,
            );
            entries.push(ledger::insert(&mut tx, row, now).await?);

            invalidations.extend(product_invalidations(&execution.destination_product));
            clones.push(execution.destination_product);
            source = execution.source;
        }

        tx.commit().await?;

        info!(
            "Distributed {} units of {} across {} destinations",
            total,
            product_id,
            clones.len()
        );

        invalidations.emit(self.sink.as_ref());

        Ok(DistributionOutcome {
            source,
            clones,
            entries,
        })
    }

    /// Resolve a public confirmation link.
    ///
    /// A pending movement past its expiry is flipped to expired as part of the read.
    pub async fn get_by_token(&self, token: &str) -> StorageResult<PublicMovement> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let mut entry = ledger::fetch_by_token(&mut tx, token).await?;
        let expired = entry.is_lapsed(now);
        if expired {
            entry = ledger::record_expiry(&mut tx, &entry.id, now).await?;
        }
        let product = fetch_any_product(&mut tx, &entry.product_id).await?;

        tx.commit().await?;

        if expired {
            warn!("Movement {} expired unconfirmed", entry.id);
            self.emit_product(&entry.product_id);
        }

        Ok(PublicMovement::new(&entry, &product))
    }

    /// Confirm receipt through a public link.
    ///
    /// A received quantity of zero closes the movement without moving stock. Otherwise
    /// the executor runs with the received quantity, which replaces the requested one
    /// on the ledger row.
    pub async fn confirm(&self, token: &str, input: ConfirmInput) -> StorageResult<MovementOutcome> {
        let confirmed_by = input.confirmed_by.trim().to_string();
        if confirmed_by.is_empty() {
            return Err(StorageError::InvalidInput(
                "confirmedBy is required".to_string(),
            ));
        }
        if input.quantity_received < 0 {
            return Err(StorageError::InvalidInput(format!(
                "received quantity cannot be negative, got {}",
                input.quantity_received
            )));
        }

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let entry = ledger::fetch_by_token(&mut tx, token).await?;
        lock_product(&mut tx, &entry.product_id).await?;
        let entry = ledger::fetch(&mut tx, &entry.id).await?;

        ensure_pending(&entry)?;
        if entry.is_lapsed(now) {
            ledger::record_expiry(&mut tx, &entry.id, now).await?;
            tx.commit().await?;
            warn!("Confirmation of {} refused: link expired", entry.id);
            self.emit_product(&entry.product_id);
            return Err(StorageError::Expired);
        }

        if input.quantity_received > entry.quantity_moved {
            return Err(StorageError::ExceedsRequested {
                requested: entry.quantity_moved,
                received: input.quantity_received,
            });
        }

        let product = repo::fetch_product(&mut tx, &entry.product_id).await?;
        ensure_stored(&product)?;

        if input.quantity_received == 0 {
            let entry = ledger::record_confirmation(
                &mut tx,
                &entry.id,
                &Confirmation {
                    quantity_received: 0,
                    destination_product_id: None,
                    from_stock_level: None,
                    to_stock_level: None,
                    confirmed_by,
                },
                now,
            )
            .await?;
            tx.commit().await?;

            info!("Movement {} confirmed with nothing received", entry.id);
            self.emit_product(&entry.product_id);

            return Ok(MovementOutcome {
                entry,
                product,
                destination_product: None,
                to_stock_level: None,
                public_token: None,
            });
        }

        let available = product.current_stock();
        if input.quantity_received > available {
            return Err(StorageError::InsufficientStock {
                requested: input.quantity_received,
                available,
            });
        }

        let destination = Destination {
            location_id: entry.to_location_id.clone(),
            person_id: entry.to_person_id.clone(),
        };
        let execution = execute_single_movement(
            &mut tx,
            &product,
            input.quantity_received,
            &destination,
            &entry.moved_by,
            now,
        )
        .await?;

        let entry = ledger::record_confirmation(
            &mut tx,
            &entry.id,
            &Confirmation {
                quantity_received: input.quantity_received,
                destination_product_id: Some(execution.destination_product.id.clone()),
                from_stock_level: Some(execution.from_stock_level),
                to_stock_level: Some(execution.to_stock_level),
                confirmed_by,
            },
            now,
        )
        .await?;

        tx.commit().await?;

        info!(
            "Movement {} confirmed: {} units received",
            entry.id, entry.quantity_moved
        );

        movement_invalidations(&product, &execution).emit(self.sink.as_ref());

        Ok(MovementOutcome {
            entry,
            to_stock_level: Some(execution.to_stock_level),
            product: execution.source,
            destination_product: Some(execution.destination_product),
            public_token: None,
        })
    }

    /// Cancel a pending movement; its link keeps resolving but reports the cancellation
    pub async fn cancel(&self, movement_id: &str, actor: &str) -> StorageResult<MovementLog> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let entry = ledger::fetch(&mut tx, movement_id).await?;
        if entry.movement_type == MovementType::Adjustment {
            return Err(StorageError::InvalidState(format!(
                "{} is an adjustment; cancel it as an adjustment",
                movement_id
            )));
        }

        ensure_pending(&entry)?;
        if entry.is_lapsed(now) {
            ledger::record_expiry(&mut tx, movement_id, now).await?;
            tx.commit().await?;
            warn!("Cancellation of {} refused: link expired", movement_id);
            self.emit_product(&entry.product_id);
            return Err(StorageError::Expired);
        }

        let entry = ledger::record_cancellation(&mut tx, movement_id, actor, now).await?;
        tx.commit().await?;

        info!("Movement {} cancelled by {}", movement_id, actor);
        self.emit_product(&entry.product_id);

        Ok(entry)
    }

    /// Movements out of a product still awaiting confirmation
    pub async fn list_pending(&self, product_id: &str) -> StorageResult<Vec<MovementLog>> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        repo::fetch_product(&mut tx, product_id).await?;
        let rows = ledger::list_pending_movements(&mut tx, product_id).await?;

        let mut pending = Vec::with_capacity(rows.len());
        let mut expired = 0;
        for entry in rows {
            if entry.is_lapsed(now) {
                ledger::record_expiry(&mut tx, &entry.id, now).await?;
                expired += 1;
            } else {
                pending.push(entry);
            }
        }

        tx.commit().await?;

        if expired > 0 {
            warn!("Expired {} lapsed movements of {}", expired, product_id);
            self.emit_product(product_id);
        }
        debug!("{} pending movements for {}", pending.len(), product_id);

        Ok(pending)
    }

    fn emit_product(&self, product_id: &str) {
        let mut invalidations = Invalidations::new();
        invalidations.add_id(Resource::Product, product_id);
        invalidations.emit(self.sink.as_ref());
    }
}

fn ensure_stored(product: &Product) -> StorageResult<()> {
    if !product.is_stored() {
        return Err(StorageError::InvalidState(format!(
            "product {} is in {}, only stored stock can move",
            product.id, product.column_status
        )));
    }
    Ok(())
}

/// Map a terminal status to the error the confirmation flow reports for it
fn ensure_pending(entry: &MovementLog) -> StorageResult<()> {
    match entry.status {
        MovementStatus::Pending => Ok(()),
        MovementStatus::Received => Err(StorageError::AlreadyConfirmed),
        MovementStatus::Cancelled => Err(StorageError::AlreadyCancelled),
        MovementStatus::Expired => Err(StorageError::Expired),
        MovementStatus::Approved => Err(StorageError::InvalidState(format!(
            "movement {} is an approved adjustment",
            entry.id
        ))),
    }
}

async fn ensure_destination_exists(
    conn: &mut SqliteConnection,
    destination: &Destination,
) -> StorageResult<()> {
    if let Some(location_id) = &destination.location_id {
        repo::fetch_location(conn, location_id).await?;
    }
    if let Some(person_id) = &destination.person_id {
        repo::fetch_person(conn, person_id).await?;
    }
    Ok(())
}

/// Product row including archived ones; a link outlives its product's archival
async fn fetch_any_product(conn: &mut SqliteConnection, id: &str) -> StorageResult<Product> {
    let row = sqlx::query("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::not_found("Product", id))?;

    repo::row_to_product(&row)
}

/// Applied ledger row for an executed movement
fn ledger_row(
    source: &Product,
    quantity: i64,
    movement_type: MovementType,
    execution: &Execution,
    destination: &Destination,
    moved_by: &str,
) -> NewMovementLog {
    let mut row = NewMovementLog::movement(
        source.id.as_str(),
        quantity,
        movement_type,
        MovementStatus::Received,
        moved_by,
    );
    row.destination_product_id = Some(execution.destination_product.id.clone());
    row.from_location_id = source.location_id.clone();
    row.from_person_id = source.assigned_to_person_id.clone();
    row.to_location_id = execution.to_location_id.clone();
    row.to_person_id = destination.person_id.clone();
    row.from_stock_level = Some(execution.from_stock_level);
    row.to_stock_level = Some(execution.to_stock_level);
    row
}

/// Both ends of a movement: where the units left and where they landed
fn movement_invalidations(before: &Product, execution: &Execution) -> Invalidations {
    let mut invalidations = product_invalidations(before);
    invalidations.extend(product_invalidations(&execution.destination_product));
    invalidations
}
