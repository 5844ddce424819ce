// ABOUTME: The movement executor: the one quantity-bearing stock primitive
// ABOUTME: Takes units off a stored product, places them, and recomputes the destination aggregate

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use stockboard_catalog::{repo, Product};
use stockboard_storage::{StorageError, StorageResult};

use crate::types::Destination;

/// Result of one executed movement
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Source stock level before the move
    pub from_stock_level: i64,
    /// Source product after the move
    pub source: Product,
    /// Row now holding the moved units: a fresh split, or the source itself when all of
    /// its stock moved
    pub destination_product: Product,
    /// Placement the units were given
    pub to_location_id: Option<String>,
    /// SKU aggregate at the destination location, or the destination row's own level
    /// when no location is involved
    pub to_stock_level: i64,
}

/// Move `quantity` units of a stored product to `destination`.
///
/// Runs on the caller's transaction and writes no ledger row; callers record the
/// returned levels. Moving the product's whole stock relocates the row itself;
/// anything less splits the units into a new row at the destination. A person-only
/// destination keeps the units at the source location, earmarked for that person.
///
/// Callers validate `quantity` against stock; any error here must abort the
/// enclosing transaction.
pub async fn execute_single_movement(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
    destination: &Destination,
    moved_by: &str,
    now: DateTime<Utc>,
) -> StorageResult<Execution> {
    let current = check_movable(product, quantity, destination)?;

    let to_location_id = destination
        .location_id
        .clone()
        .or_else(|| product.location_id.clone());
    let to_person_id = destination.person_id.as_deref();

    let destination_product = if quantity == current {
        repo::set_placement(conn, &product.id, to_location_id.as_deref(), to_person_id, now)
            .await?;
        repo::fetch_product(conn, &product.id).await?
    } else {
        repo::set_stock_level(conn, &product.id, current - quantity, now).await?;
        repo::insert_clone(
            conn,
            product,
            to_location_id.as_deref(),
            to_person_id,
            quantity,
            moved_by,
            now,
        )
        .await?
    };

    finish(conn, product, current, destination_product, to_location_id).await
}

/// Like [`execute_single_movement`] but always splits the units into a new row, even
/// when they are the product's whole stock. Batch distribution uses this per line.
pub async fn split_movement(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
    destination: &Destination,
    moved_by: &str,
    now: DateTime<Utc>,
) -> StorageResult<Execution> {
    let current = check_movable(product, quantity, destination)?;

    let to_location_id = destination
        .location_id
        .clone()
        .or_else(|| product.location_id.clone());

    repo::set_stock_level(conn, &product.id, current - quantity, now).await?;
    let clone = repo::insert_clone(
        conn,
        product,
        to_location_id.as_deref(),
        destination.person_id.as_deref(),
        quantity,
        moved_by,
        now,
    )
    .await?;

    finish(conn, product, current, clone, to_location_id).await
}

fn check_movable(product: &Product, quantity: i64, destination: &Destination) -> StorageResult<i64> {
    if !product.is_stored() {
        return Err(StorageError::InvalidState(format!(
            "product {} is in {}, only stored stock can move",
            product.id, product.column_status
        )));
    }
    destination.validate()?;

    let current = product.current_stock();
    if quantity <= 0 || quantity > current {
        return Err(StorageError::InsufficientStock {
            requested: quantity,
            available: current,
        });
    }
    Ok(current)
}

/// Recompute the destination aggregate and re-read the source
async fn finish(
    conn: &mut SqliteConnection,
    product: &Product,
    from_stock_level: i64,
    destination_product: Product,
    to_location_id: Option<String>,
) -> StorageResult<Execution> {
    let to_stock_level = match &to_location_id {
        Some(location_id) => {
            repo::sku_aggregate(conn, location_id, &destination_product.sku_key()).await?
        }
        None => destination_product.current_stock(),
    };

    let source = repo::fetch_product(conn, &product.id).await?;

    debug!(
        "Executed movement from {} ({} -> {}) into {}, destination aggregate {}",
        product.id,
        from_stock_level,
        source.current_stock(),
        destination_product.id,
        to_stock_level
    );

    Ok(Execution {
        from_stock_level,
        source,
        destination_product,
        to_location_id,
        to_stock_level,
    })
}
