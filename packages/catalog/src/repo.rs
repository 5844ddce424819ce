// ABOUTME: Connection-level catalog queries used inside service transactions
// ABOUTME: Product reads/writes, column positions, links and SKU aggregates

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use stockboard_core::generate_id;
use stockboard_storage::{StorageError, StorageResult};

use crate::board::Column;
use crate::types::{Kanban, KanbanLink, Location, Person, Product, ProductGroup};

/// Identity under which stock rows at one location are summed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkuKey {
    Sku(String),
    /// Rows without a SKU aggregate by board and description
    Details {
        kanban_id: String,
        product_details: String,
    },
}

impl SkuKey {
    pub fn sku(&self) -> Option<&str> {
        match self {
            SkuKey::Sku(sku) => Some(sku),
            SkuKey::Details { .. } => None,
        }
    }
}

/// Sum of stored, non-draft stock sharing `key` at `location_id`
pub async fn sku_aggregate(
    conn: &mut SqliteConnection,
    location_id: &str,
    key: &SkuKey,
) -> StorageResult<i64> {
    let total: i64 = match key {
        SkuKey::Sku(sku) => {
            sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(stock_level), 0) FROM products
                WHERE location_id = ? AND sku = ?
                  AND column_status = 'stored' AND is_draft = 0 AND archived_at IS NULL
                "#,
            )
            .bind(location_id)
            .bind(sku)
            .fetch_one(&mut *conn)
            .await?
        }
        SkuKey::Details {
            kanban_id,
            product_details,
        } => {
            sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(stock_level), 0) FROM products
                WHERE location_id = ? AND sku IS NULL AND kanban_id = ? AND product_details = ?
                  AND column_status = 'stored' AND is_draft = 0 AND archived_at IS NULL
                "#,
            )
            .bind(location_id)
            .bind(kanban_id)
            .bind(product_details)
            .fetch_one(&mut *conn)
            .await?
        }
    };

    debug!("SKU aggregate at {} for {:?}: {}", location_id, key, total);
    Ok(total)
}

/// Get an active (not archived) product
pub async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> StorageResult<Product> {
    let row = sqlx::query("SELECT * FROM products WHERE id = ? AND archived_at IS NULL")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::not_found("Product", id))?;

    row_to_product(&row)
}

pub async fn fetch_kanban(conn: &mut SqliteConnection, id: &str) -> StorageResult<Kanban> {
    let row = sqlx::query("SELECT * FROM kanbans WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::not_found("Kanban", id))?;

    row_to_kanban(&row)
}

pub async fn fetch_location(conn: &mut SqliteConnection, id: &str) -> StorageResult<Location> {
    let row = sqlx::query("SELECT * FROM locations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::not_found("Location", id))?;

    Ok(Location {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        department_id: row.try_get("department_id")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn fetch_person(conn: &mut SqliteConnection, id: &str) -> StorageResult<Person> {
    let row = sqlx::query("SELECT * FROM persons WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::not_found("Person", id))?;

    Ok(Person {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        department_id: row.try_get("department_id")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn fetch_group(conn: &mut SqliteConnection, id: &str) -> StorageResult<ProductGroup> {
    let row = sqlx::query("SELECT * FROM product_groups WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StorageError::not_found("Product group", id))?;

    row_to_group(&row)
}

/// Verified link between an order board and a receive board, if any
pub async fn find_verified_link(
    conn: &mut SqliteConnection,
    order_kanban_id: &str,
    receive_kanban_id: &str,
) -> StorageResult<Option<KanbanLink>> {
    let row = sqlx::query(
        "SELECT * FROM kanban_links WHERE order_kanban_id = ? AND receive_kanban_id = ? AND verified = 1",
    )
    .bind(order_kanban_id)
    .bind(receive_kanban_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_link).transpose()
}

/// Position that puts an item at the front of a column: one below the current minimum.
///
/// Products and groups share the ordering space; an empty column starts at zero.
pub async fn front_position(
    conn: &mut SqliteConnection,
    kanban_id: &str,
    column: Column,
    exclude_product_id: Option<&str>,
) -> StorageResult<i64> {
    let min: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT MIN(pos) FROM (
            SELECT column_position AS pos FROM products
            WHERE kanban_id = ? AND column_status = ? AND archived_at IS NULL AND id != ?
            UNION ALL
            SELECT column_position AS pos FROM product_groups
            WHERE kanban_id = ? AND column_status = ?
        )
        "#,
    )
    .bind(kanban_id)
    .bind(column)
    .bind(exclude_product_id.unwrap_or(""))
    .bind(kanban_id)
    .bind(column)
    .fetch_one(&mut *conn)
    .await?;

    Ok(min.map(|m| m - 1).unwrap_or(0))
}

/// Insert a fully-formed product row
pub async fn insert_product(conn: &mut SqliteConnection, product: &Product) -> StorageResult<()> {
    let tags = serde_json::to_string(&product.tags)?;

    sqlx::query(
        r#"
        INSERT INTO products (
            id, kanban_id, column_status,
            product_details, category, supplier, sku, dimensions, price, tags, image_url,
            location_id, assigned_to_person_id, stock_level, source_product_id,
            is_draft, is_rejected, product_group_id, group_position, column_position,
            preferred_receive_kanban_id, column_entered_at,
            archived_at, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&product.id)
    .bind(&product.kanban_id)
    .bind(product.column_status)
    .bind(&product.product_details)
    .bind(&product.category)
    .bind(&product.supplier)
    .bind(&product.sku)
    .bind(&product.dimensions)
    .bind(product.price)
    .bind(tags)
    .bind(&product.image_url)
    .bind(&product.location_id)
    .bind(&product.assigned_to_person_id)
    .bind(product.stock_level)
    .bind(&product.source_product_id)
    .bind(product.is_draft)
    .bind(product.is_rejected)
    .bind(&product.product_group_id)
    .bind(product.group_position)
    .bind(product.column_position)
    .bind(&product.preferred_receive_kanban_id)
    .bind(product.column_entered_at)
    .bind(product.archived_at)
    .bind(&product.created_by)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Create a stored split of `source` holding `quantity` units at a new placement.
///
/// Descriptive fields are copied; the clone points back at its source and lands at
/// the front of the Stored column.
pub async fn insert_clone(
    conn: &mut SqliteConnection,
    source: &Product,
    location_id: Option<&str>,
    person_id: Option<&str>,
    quantity: i64,
    created_by: &str,
    now: DateTime<Utc>,
) -> StorageResult<Product> {
    let position = front_position(conn, &source.kanban_id, Column::Stored, None).await?;

    let clone = Product {
        id: generate_id("prod"),
        kanban_id: source.kanban_id.clone(),
        column_status: Column::Stored,
        product_details: source.product_details.clone(),
        category: source.category.clone(),
        supplier: source.supplier.clone(),
        sku: source.sku.clone(),
        dimensions: source.dimensions.clone(),
        price: source.price,
        tags: source.tags.clone(),
        image_url: source.image_url.clone(),
        location_id: location_id.map(str::to_string),
        assigned_to_person_id: person_id.map(str::to_string),
        stock_level: Some(quantity),
        source_product_id: Some(source.id.clone()),
        is_draft: false,
        is_rejected: false,
        product_group_id: None,
        group_position: None,
        column_position: position,
        preferred_receive_kanban_id: None,
        column_entered_at: now,
        archived_at: None,
        created_by: Some(created_by.to_string()),
        created_at: now,
        updated_at: now,
    };

    debug!(
        "Cloning product {} into {} with {} units",
        source.id, clone.id, quantity
    );

    insert_product(conn, &clone).await?;
    Ok(clone)
}

pub async fn set_stock_level(
    conn: &mut SqliteConnection,
    product_id: &str,
    stock_level: i64,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    sqlx::query("UPDATE products SET stock_level = ?, updated_at = ? WHERE id = ?")
        .bind(stock_level)
        .bind(now)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_placement(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: Option<&str>,
    person_id: Option<&str>,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    sqlx::query(
        "UPDATE products SET location_id = ?, assigned_to_person_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(location_id)
    .bind(person_id)
    .bind(now)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Active products of a column, front first
pub async fn list_column(
    conn: &mut SqliteConnection,
    kanban_id: &str,
    column: Column,
) -> StorageResult<Vec<Product>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM products
        WHERE kanban_id = ? AND column_status = ? AND archived_at IS NULL
        ORDER BY column_position, created_at
        "#,
    )
    .bind(kanban_id)
    .bind(column)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_product).collect()
}

/// Groups of a column, front first
pub async fn list_groups(
    conn: &mut SqliteConnection,
    kanban_id: &str,
    column: Column,
) -> StorageResult<Vec<ProductGroup>> {
    let rows = sqlx::query(
        "SELECT * FROM product_groups WHERE kanban_id = ? AND column_status = ? ORDER BY column_position, created_at",
    )
    .bind(kanban_id)
    .bind(column)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_group).collect()
}

/// Number of ledger rows referencing a product on either side
pub async fn ledger_reference_count(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> StorageResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT
            (SELECT COUNT(*) FROM movement_logs WHERE product_id = ?1 OR destination_product_id = ?1)
          + (SELECT COUNT(*) FROM transfer_logs WHERE product_id = ?1)
          + (SELECT COUNT(*) FROM products WHERE source_product_id = ?1)
        "#,
    )
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

pub fn row_to_product(row: &SqliteRow) -> StorageResult<Product> {
    let tags: Option<String> = row.try_get("tags")?;
    let tags = match tags {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Vec::new(),
    };

    Ok(Product {
        id: row.try_get("id")?,
        kanban_id: row.try_get("kanban_id")?,
        column_status: row.try_get("column_status")?,
        product_details: row.try_get("product_details")?,
        category: row.try_get("category")?,
        supplier: row.try_get("supplier")?,
        sku: row.try_get("sku")?,
        dimensions: row.try_get("dimensions")?,
        price: row.try_get("price")?,
        tags,
        image_url: row.try_get("image_url")?,
        location_id: row.try_get("location_id")?,
        assigned_to_person_id: row.try_get("assigned_to_person_id")?,
        stock_level: row.try_get("stock_level")?,
        source_product_id: row.try_get("source_product_id")?,
        is_draft: row.try_get("is_draft")?,
        is_rejected: row.try_get("is_rejected")?,
        product_group_id: row.try_get("product_group_id")?,
        group_position: row.try_get("group_position")?,
        column_position: row.try_get("column_position")?,
        preferred_receive_kanban_id: row.try_get("preferred_receive_kanban_id")?,
        column_entered_at: row.try_get("column_entered_at")?,
        archived_at: row.try_get("archived_at")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn row_to_kanban(row: &SqliteRow) -> StorageResult<Kanban> {
    Ok(Kanban {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kanban_type: row.try_get("kanban_type")?,
        location_id: row.try_get("location_id")?,
        default_linked_kanban_id: row.try_get("default_linked_kanban_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn row_to_link(row: &SqliteRow) -> StorageResult<KanbanLink> {
    Ok(KanbanLink {
        id: row.try_get("id")?,
        order_kanban_id: row.try_get("order_kanban_id")?,
        receive_kanban_id: row.try_get("receive_kanban_id")?,
        verified: row.try_get("verified")?,
        verified_by: row.try_get("verified_by")?,
        verified_at: row.try_get("verified_at")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn row_to_group(row: &SqliteRow) -> StorageResult<ProductGroup> {
    Ok(ProductGroup {
        id: row.try_get("id")?,
        kanban_id: row.try_get("kanban_id")?,
        column_status: row.try_get("column_status")?,
        name: row.try_get("name")?,
        column_position: row.try_get("column_position")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
