// ABOUTME: Catalog storage layer using SQLite
// ABOUTME: CRUD for boards, links, locations, persons and product records

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use stockboard_core::{generate_id, normalize_sku, InvalidationSink, Invalidations, Resource};
use stockboard_ledger::storage as ledger;
use stockboard_ledger::{AdjustmentType, MovementStatus, NewMovementLog};
use stockboard_storage::{begin_write, lock_product, StorageError, StorageResult};

use crate::board::{Column, KanbanType};
use crate::repo;
use crate::types::{
    Kanban, KanbanCreateInput, KanbanLink, Location, LocationCreateInput, Person,
    PersonCreateInput, Product, ProductCreateInput, ProductDetailsUpdate,
};

pub struct CatalogStorage {
    pool: SqlitePool,
    sink: Arc<dyn InvalidationSink>,
}

impl CatalogStorage {
    pub fn new(pool: SqlitePool, sink: Arc<dyn InvalidationSink>) -> Self {
        Self { pool, sink }
    }

    // ==================== Boards ====================

    /// Create a new board
    pub async fn create_kanban(&self, input: KanbanCreateInput) -> StorageResult<Kanban> {
        let id = generate_id("kan");
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        if let Some(location_id) = &input.location_id {
            repo::fetch_location(&mut tx, location_id).await?;
        }

        sqlx::query(
            "INSERT INTO kanbans (id, name, kanban_type, location_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(input.kanban_type)
        .bind(&input.location_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let kanban = repo::fetch_kanban(&mut tx, &id).await?;
        tx.commit().await?;

        info!("Created {} board {} ({})", kanban.kanban_type, kanban.name, kanban.id);

        let mut invalidations = Invalidations::new();
        invalidations.add(Resource::Kanban);
        invalidations.emit(self.sink.as_ref());

        Ok(kanban)
    }

    pub async fn get_kanban(&self, id: &str) -> StorageResult<Kanban> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_kanban(&mut conn, id).await
    }

    pub async fn list_kanbans(&self) -> StorageResult<Vec<Kanban>> {
        let rows = sqlx::query("SELECT * FROM kanbans ORDER BY created_at, name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(repo::row_to_kanban).collect()
    }

    /// Link an order board to a receive board. New links start unverified.
    pub async fn create_link(
        &self,
        order_kanban_id: &str,
        receive_kanban_id: &str,
    ) -> StorageResult<KanbanLink> {
        let mut tx = begin_write(&self.pool).await?;

        let order = repo::fetch_kanban(&mut tx, order_kanban_id).await?;
        let receive = repo::fetch_kanban(&mut tx, receive_kanban_id).await?;
        if order.kanban_type != KanbanType::Order || receive.kanban_type != KanbanType::Receive {
            return Err(StorageError::InvalidInput(format!(
                "links go from an order board to a receive board, got {} -> {}",
                order.kanban_type, receive.kanban_type
            )));
        }

        let id = generate_id("link");
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO kanban_links (id, order_kanban_id, receive_kanban_id, verified, created_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(order_kanban_id)
        .bind(receive_kanban_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT * FROM kanban_links WHERE id = ?")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;
        let link = repo::row_to_link(&row)?;
        tx.commit().await?;

        debug!("Linked {} -> {} ({})", order_kanban_id, receive_kanban_id, id);

        let mut invalidations = Invalidations::new();
        invalidations
            .add_id(Resource::Kanban, order_kanban_id)
            .add_id(Resource::Kanban, receive_kanban_id);
        invalidations.emit(self.sink.as_ref());

        Ok(link)
    }

    /// Mark a link verified so transfers may use it
    pub async fn verify_link(&self, link_id: &str, verified_by: &str) -> StorageResult<KanbanLink> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE kanban_links SET verified = 1, verified_by = ?, verified_at = ? WHERE id = ?",
        )
        .bind(verified_by)
        .bind(now)
        .bind(link_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Kanban link", link_id));
        }

        let row = sqlx::query("SELECT * FROM kanban_links WHERE id = ?")
            .bind(link_id)
            .fetch_one(&self.pool)
            .await?;
        let link = repo::row_to_link(&row)?;

        info!("Link {} verified by {}", link_id, verified_by);

        let mut invalidations = Invalidations::new();
        invalidations
            .add_id(Resource::Kanban, link.order_kanban_id.as_str())
            .add_id(Resource::Kanban, link.receive_kanban_id.as_str());
        invalidations.emit(self.sink.as_ref());

        Ok(link)
    }

    /// Set (or clear) the receive board an order board transfers to by default
    pub async fn set_default_link(
        &self,
        order_kanban_id: &str,
        receive_kanban_id: Option<&str>,
    ) -> StorageResult<Kanban> {
        let mut tx = begin_write(&self.pool).await?;

        let order = repo::fetch_kanban(&mut tx, order_kanban_id).await?;
        if order.kanban_type != KanbanType::Order {
            return Err(StorageError::InvalidInput(format!(
                "board {} is not an order board",
                order_kanban_id
            )));
        }
        if let Some(receive_id) = receive_kanban_id {
            let receive = repo::fetch_kanban(&mut tx, receive_id).await?;
            if receive.kanban_type != KanbanType::Receive {
                return Err(StorageError::InvalidInput(format!(
                    "board {} is not a receive board",
                    receive_id
                )));
            }
        }

        sqlx::query("UPDATE kanbans SET default_linked_kanban_id = ?, updated_at = ? WHERE id = ?")
            .bind(receive_kanban_id)
            .bind(Utc::now())
            .bind(order_kanban_id)
            .execute(&mut *tx)
            .await?;

        let kanban = repo::fetch_kanban(&mut tx, order_kanban_id).await?;
        tx.commit().await?;

        let mut invalidations = Invalidations::new();
        invalidations.add_id(Resource::Kanban, order_kanban_id);
        invalidations.emit(self.sink.as_ref());

        Ok(kanban)
    }

    // ==================== Locations & Persons ====================

    pub async fn create_location(&self, input: LocationCreateInput) -> StorageResult<Location> {
        let id = generate_id("loc");
        sqlx::query("INSERT INTO locations (id, name, department_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(input.name.trim())
            .bind(&input.department_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let mut invalidations = Invalidations::new();
        invalidations
            .add(Resource::Location)
            .add_opt(Resource::Department, input.department_id.as_deref());
        invalidations.emit(self.sink.as_ref());

        self.get_location(&id).await
    }

    pub async fn get_location(&self, id: &str) -> StorageResult<Location> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_location(&mut conn, id).await
    }

    pub async fn create_person(&self, input: PersonCreateInput) -> StorageResult<Person> {
        let id = generate_id("per");
        sqlx::query(
            "INSERT INTO persons (id, name, email, department_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.department_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let mut invalidations = Invalidations::new();
        invalidations
            .add(Resource::Person)
            .add_opt(Resource::Department, input.department_id.as_deref());
        invalidations.emit(self.sink.as_ref());

        self.get_person(&id).await
    }

    pub async fn get_person(&self, id: &str) -> StorageResult<Person> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_person(&mut conn, id).await
    }

    // ==================== Products ====================

    /// Create a product at the front of its column.
    ///
    /// Products created directly in Stored may carry an opening stock level, which is
    /// recorded in the ledger as an approved initial count.
    pub async fn create_product(
        &self,
        input: ProductCreateInput,
        created_by: &str,
    ) -> StorageResult<Product> {
        let product_details = input.product_details.trim().to_string();
        if product_details.is_empty() {
            return Err(StorageError::InvalidInput(
                "product details are required".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let kanban = repo::fetch_kanban(&mut tx, &input.kanban_id).await?;
        let column = input
            .column_status
            .unwrap_or_else(|| kanban.kanban_type.initial_column());
        if !kanban.kanban_type.allows(column) {
            return Err(StorageError::InvalidTransition {
                kanban_type: kanban.kanban_type.to_string(),
                column: column.to_string(),
            });
        }

        let stock_level = match (column, input.stock_level) {
            (Column::Stored, Some(level)) if level < 0 => {
                return Err(StorageError::NegativeStock {
                    current: 0,
                    change: level,
                })
            }
            (Column::Stored, level) => Some(level.unwrap_or(0)),
            (_, Some(_)) => {
                return Err(StorageError::InvalidInput(
                    "stock level can only be set on stored products".to_string(),
                ))
            }
            (_, None) => None,
        };

        let location_id = input.location_id.or_else(|| kanban.location_id.clone());
        if let Some(location_id) = &location_id {
            repo::fetch_location(&mut tx, location_id).await?;
        }
        if let Some(person_id) = &input.assigned_to_person_id {
            repo::fetch_person(&mut tx, person_id).await?;
        }
        if let Some(preferred) = &input.preferred_receive_kanban_id {
            ensure_receive_board(&mut tx, preferred).await?;
        }

        let position = repo::front_position(&mut tx, &kanban.id, column, None).await?;

        let product = Product {
            id: generate_id("prod"),
            kanban_id: kanban.id.clone(),
            column_status: column,
            product_details,
            category: input.category,
            supplier: input.supplier,
            sku: normalize_sku(input.sku.as_deref()),
            dimensions: input.dimensions,
            price: input.price,
            tags: input.tags,
            image_url: input.image_url,
            location_id,
            assigned_to_person_id: input.assigned_to_person_id,
            stock_level,
            source_product_id: None,
            is_draft: kanban.kanban_type.is_draft_column(column),
            is_rejected: false,
            product_group_id: None,
            group_position: None,
            column_position: position,
            preferred_receive_kanban_id: input.preferred_receive_kanban_id,
            column_entered_at: now,
            archived_at: None,
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        };

        repo::insert_product(&mut tx, &product).await?;

        let opening = product.current_stock();
        if opening > 0 {
            let aggregate = match &product.location_id {
                Some(location_id) => {
                    Some(repo::sku_aggregate(&mut tx, location_id, &product.sku_key()).await?)
                }
                None => Some(opening),
            };

            let mut entry = NewMovementLog::adjustment(
                product.id.as_str(),
                opening,
                AdjustmentType::InitialCount,
                MovementStatus::Approved,
                created_by,
            );
            entry.from_stock_level = Some(0);
            entry.to_stock_level = aggregate;
            entry.to_location_id = product.location_id.clone();
            entry.reason = Some("Opening stock".to_string());
            ledger::insert(&mut tx, entry, now).await?;
        }

        tx.commit().await?;

        info!(
            "Created product {} in {} / {}",
            product.id, kanban.name, product.column_status
        );

        let mut invalidations = product_invalidations(&product);
        invalidations.add_id(Resource::Kanban, kanban.id.as_str());
        invalidations.emit(self.sink.as_ref());

        Ok(product)
    }

    /// Get an active product by ID
    pub async fn get_product(&self, id: &str) -> StorageResult<Product> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_product(&mut conn, id).await
    }

    /// Products of one column, front first
    pub async fn list_column(&self, kanban_id: &str, column: Column) -> StorageResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_kanban(&mut conn, kanban_id).await?;
        repo::list_column(&mut conn, kanban_id, column).await
    }

    /// SKU aggregate at a location, recomputed from product rows
    pub async fn sku_aggregate(&self, location_id: &str, sku: &str) -> StorageResult<i64> {
        let key = normalize_sku(Some(sku))
            .map(repo::SkuKey::Sku)
            .ok_or_else(|| StorageError::InvalidInput("SKU is required".to_string()))?;

        let mut conn = self.pool.acquire().await?;
        repo::fetch_location(&mut conn, location_id).await?;
        repo::sku_aggregate(&mut conn, location_id, &key).await
    }

    /// Update descriptive fields only
    pub async fn update_product_details(
        &self,
        id: &str,
        update: ProductDetailsUpdate,
    ) -> StorageResult<Product> {
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        lock_product(&mut tx, id).await?;
        let before = repo::fetch_product(&mut tx, id).await?;

        if let Some(details) = &update.product_details {
            if details.trim().is_empty() {
                return Err(StorageError::InvalidInput(
                    "product details cannot be blank".to_string(),
                ));
            }
        }

        let tags = update.tags.as_ref().map(serde_json::to_string).transpose()?;
        // An explicitly blank SKU clears it
        let sku = update.sku.as_deref().map(|raw| normalize_sku(Some(raw)));

        sqlx::query(
            r#"
            UPDATE products SET
                product_details = COALESCE(?, product_details),
                category = COALESCE(?, category),
                supplier = COALESCE(?, supplier),
                sku = CASE WHEN ? THEN ? ELSE sku END,
                dimensions = COALESCE(?, dimensions),
                price = COALESCE(?, price),
                tags = COALESCE(?, tags),
                image_url = COALESCE(?, image_url),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.product_details.as_deref().map(str::trim))
        .bind(&update.category)
        .bind(&update.supplier)
        .bind(sku.is_some())
        .bind(sku.flatten())
        .bind(&update.dimensions)
        .bind(update.price)
        .bind(tags)
        .bind(&update.image_url)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let product = repo::fetch_product(&mut tx, id).await?;
        tx.commit().await?;

        debug!("Updated details of product {}", id);

        let mut invalidations = product_invalidations(&product);
        invalidations.add_opt(Resource::Sku, before.sku.as_deref());
        invalidations.emit(self.sink.as_ref());

        Ok(product)
    }

    /// Override (or clear) the receive board this product transfers to
    pub async fn set_preferred_receive_kanban(
        &self,
        id: &str,
        receive_kanban_id: Option<&str>,
    ) -> StorageResult<Product> {
        let mut tx = begin_write(&self.pool).await?;
        lock_product(&mut tx, id).await?;
        repo::fetch_product(&mut tx, id).await?;

        if let Some(receive_id) = receive_kanban_id {
            ensure_receive_board(&mut tx, receive_id).await?;
        }

        sqlx::query(
            "UPDATE products SET preferred_receive_kanban_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(receive_kanban_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let product = repo::fetch_product(&mut tx, id).await?;
        tx.commit().await?;

        let mut invalidations = Invalidations::new();
        invalidations.add_id(Resource::Product, id);
        invalidations.emit(self.sink.as_ref());

        Ok(product)
    }

    /// Reject (or restore) a request still under review on an order board
    pub async fn set_rejected(&self, id: &str, rejected: bool) -> StorageResult<Product> {
        let mut tx = begin_write(&self.pool).await?;
        lock_product(&mut tx, id).await?;
        let product = repo::fetch_product(&mut tx, id).await?;
        let kanban = repo::fetch_kanban(&mut tx, &product.kanban_id).await?;

        if !kanban.kanban_type.is_draft_column(product.column_status) {
            return Err(StorageError::InvalidState(format!(
                "only requests in review can be rejected; product {} is in {}",
                id, product.column_status
            )));
        }

        sqlx::query("UPDATE products SET is_rejected = ?, updated_at = ? WHERE id = ?")
            .bind(rejected)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let product = repo::fetch_product(&mut tx, id).await?;
        tx.commit().await?;

        info!("Product {} rejected = {}", id, rejected);

        let mut invalidations = Invalidations::new();
        invalidations
            .add_id(Resource::Product, id)
            .add_id(Resource::Kanban, product.kanban_id.as_str());
        invalidations.emit(self.sink.as_ref());

        Ok(product)
    }

    /// Delete a product.
    ///
    /// Products referenced by the ledger, a transfer or a distribution split are
    /// archived instead so the audit trail stays intact. Returns true on a hard delete.
    pub async fn delete_product(&self, id: &str) -> StorageResult<bool> {
        let mut tx = begin_write(&self.pool).await?;
        lock_product(&mut tx, id).await?;
        let product = repo::fetch_product(&mut tx, id).await?;

        let references = repo::ledger_reference_count(&mut tx, id).await?;
        let hard_delete = references == 0;

        if hard_delete {
            sqlx::query("DELETE FROM column_validations WHERE product_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM products WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        } else {
            let now = Utc::now();
            sqlx::query(
                "UPDATE products SET archived_at = ?, product_group_id = NULL, group_position = NULL, updated_at = ? WHERE id = ?",
            )
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "{} product {} ({} ledger references)",
            if hard_delete { "Deleted" } else { "Archived" },
            id,
            references
        );

        let mut invalidations = product_invalidations(&product);
        invalidations.add_id(Resource::Kanban, product.kanban_id.as_str());
        invalidations.emit(self.sink.as_ref());

        Ok(hard_delete)
    }
}

async fn ensure_receive_board(
    conn: &mut sqlx::SqliteConnection,
    kanban_id: &str,
) -> StorageResult<()> {
    let kanban = repo::fetch_kanban(conn, kanban_id).await?;
    if kanban.kanban_type != KanbanType::Receive {
        return Err(StorageError::InvalidInput(format!(
            "board {} is not a receive board",
            kanban_id
        )));
    }
    Ok(())
}

/// Descriptors every change to a product's state touches
pub fn product_invalidations(product: &Product) -> Invalidations {
    let mut invalidations = Invalidations::new();
    invalidations
        .add(Resource::Inventory)
        .add(Resource::InventoryStats)
        .add_id(Resource::Product, product.id.as_str())
        .add_opt(Resource::Sku, product.sku.as_deref())
        .add_opt(Resource::Location, product.location_id.as_deref())
        .add_opt(Resource::Person, product.assigned_to_person_id.as_deref());
    invalidations
}
