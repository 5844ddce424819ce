// ABOUTME: Column ordering and product groups
// ABOUTME: Exact-set reorders of a column and membership/ordering of groups

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use stockboard_catalog::{repo, Column, ProductGroup};
use stockboard_core::{generate_id, InvalidationSink, Invalidations, Resource};
use stockboard_storage::{begin_write, lock_product, StorageError, StorageResult};

use crate::types::{GroupCreateInput, ItemType, ReorderItem};

/// Check that `submitted` is an exact permutation of `current`.
///
/// Same cardinality, no duplicates and identical membership; anything else is a
/// `MismatchedSet` naming the `kind` of item.
pub fn check_permutation(current: &[String], submitted: &[String], kind: &str) -> StorageResult<()> {
    let mut seen = HashSet::with_capacity(submitted.len());
    for id in submitted {
        if !seen.insert(id.as_str()) {
            return Err(StorageError::MismatchedSet(format!(
                "{} {} appears more than once",
                kind, id
            )));
        }
    }

    if submitted.len() != current.len() {
        return Err(StorageError::MismatchedSet(format!(
            "expected {} {}s, got {}",
            current.len(),
            kind,
            submitted.len()
        )));
    }

    if let Some(missing) = current.iter().find(|id| !seen.contains(id.as_str())) {
        return Err(StorageError::MismatchedSet(format!(
            "{} {} is missing from the submitted order",
            kind, missing
        )));
    }

    Ok(())
}

pub struct OrderingService {
    pool: SqlitePool,
    sink: Arc<dyn InvalidationSink>,
}

impl OrderingService {
    pub fn new(pool: SqlitePool, sink: Arc<dyn InvalidationSink>) -> Self {
        Self { pool, sink }
    }

    /// Rewrite the order of a column.
    ///
    /// `items` partitioned by type must match the column's ungrouped products and its
    /// groups exactly; each item then takes its index within its partition.
    pub async fn reorder(
        &self,
        kanban_id: &str,
        column: Column,
        items: &[ReorderItem],
    ) -> StorageResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        let kanban = repo::fetch_kanban(&mut tx, kanban_id).await?;
        if !kanban.kanban_type.allows(column) {
            return Err(StorageError::InvalidTransition {
                kanban_type: kanban.kanban_type.to_string(),
                column: column.to_string(),
            });
        }

        let (products, groups): (Vec<_>, Vec<_>) = items
            .iter()
            .partition(|item| item.item_type == ItemType::Product);
        let products: Vec<String> = products.into_iter().map(|i| i.id.clone()).collect();
        let groups: Vec<String> = groups.into_iter().map(|i| i.id.clone()).collect();

        let current_products = ungrouped_product_ids(&mut tx, kanban_id, column).await?;
        let current_groups = group_ids(&mut tx, kanban_id, column).await?;

        check_permutation(&current_products, &products, "product")?;
        check_permutation(&current_groups, &groups, "group")?;

        let now = Utc::now();
        for (index, id) in products.iter().enumerate() {
            sqlx::query("UPDATE products SET column_position = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        for (index, id) in groups.iter().enumerate() {
            sqlx::query("UPDATE product_groups SET column_position = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            "Reordered {} / {}: {} products, {} groups",
            kanban.name,
            column,
            products.len(),
            groups.len()
        );

        let mut invalidations = Invalidations::new();
        invalidations
            .add(Resource::Inventory)
            .add_id(Resource::Kanban, kanban_id);
        invalidations.emit(self.sink.as_ref());

        Ok(())
    }

    /// Create a group at the front of a column, optionally with initial members
    pub async fn create_group(&self, input: GroupCreateInput) -> StorageResult<ProductGroup> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(StorageError::InvalidInput("group name is required".to_string()));
        }

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let kanban = repo::fetch_kanban(&mut tx, &input.kanban_id).await?;
        if !kanban.kanban_type.allows(input.column_status) {
            return Err(StorageError::InvalidTransition {
                kanban_type: kanban.kanban_type.to_string(),
                column: input.column_status.to_string(),
            });
        }

        let id = generate_id("grp");
        let position = repo::front_position(&mut tx, &kanban.id, input.column_status, None).await?;

        sqlx::query(
            "INSERT INTO product_groups (id, kanban_id, column_status, name, column_position, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&kanban.id)
        .bind(input.column_status)
        .bind(&name)
        .bind(position)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let group = repo::fetch_group(&mut tx, &id).await?;

        let mut seen = HashSet::new();
        for (index, product_id) in input.product_ids.iter().enumerate() {
            if !seen.insert(product_id.as_str()) {
                return Err(StorageError::InvalidInput(format!(
                    "product {} listed twice",
                    product_id
                )));
            }
            join_group(&mut tx, &group, product_id, index as i64).await?;
        }

        tx.commit().await?;

        info!("Created group {} ({}) in {} / {}", name, id, kanban.name, group.column_status);

        let mut invalidations = Invalidations::new();
        invalidations.add_id(Resource::Kanban, kanban.id.as_str());
        for product_id in &input.product_ids {
            invalidations.add_id(Resource::Product, product_id.as_str());
        }
        invalidations.emit(self.sink.as_ref());

        Ok(group)
    }

    /// Add a product to the end of a group in its own column
    pub async fn add_to_group(&self, group_id: &str, product_id: &str) -> StorageResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        let group = repo::fetch_group(&mut tx, group_id).await?;

        let next: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(group_position) FROM products WHERE product_group_id = ? AND id != ?",
        )
        .bind(group_id)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        join_group(&mut tx, &group, product_id, next.map(|n| n + 1).unwrap_or(0)).await?;
        tx.commit().await?;

        debug!("Product {} joined group {}", product_id, group_id);

        let mut invalidations = Invalidations::new();
        invalidations
            .add_id(Resource::Kanban, group.kanban_id.as_str())
            .add_id(Resource::Product, product_id);
        invalidations.emit(self.sink.as_ref());

        Ok(())
    }

    /// Take a product out of its group; it reappears at the front of its column
    pub async fn remove_from_group(&self, product_id: &str) -> StorageResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        lock_product(&mut tx, product_id).await?;
        let product = repo::fetch_product(&mut tx, product_id).await?;

        if product.product_group_id.is_none() {
            return Err(StorageError::InvalidState(format!(
                "product {} is not in a group",
                product_id
            )));
        }

        let position = repo::front_position(
            &mut tx,
            &product.kanban_id,
            product.column_status,
            Some(product_id),
        )
        .await?;

        sqlx::query(
            "UPDATE products SET product_group_id = NULL, group_position = NULL, column_position = ?, updated_at = ? WHERE id = ?",
        )
        .bind(position)
        .bind(Utc::now())
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!("Product {} left its group", product_id);

        let mut invalidations = Invalidations::new();
        invalidations
            .add_id(Resource::Kanban, product.kanban_id.as_str())
            .add_id(Resource::Product, product_id);
        invalidations.emit(self.sink.as_ref());

        Ok(())
    }

    /// Delete a group; its members stay in the column, ungrouped
    pub async fn delete_group(&self, group_id: &str) -> StorageResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        let group = repo::fetch_group(&mut tx, group_id).await?;

        let members = member_ids(&mut tx, group_id).await?;
        sqlx::query(
            "UPDATE products SET product_group_id = NULL, group_position = NULL, updated_at = ? WHERE product_group_id = ?",
        )
        .bind(Utc::now())
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM product_groups WHERE id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Deleted group {} ({} members released)", group_id, members.len());

        let mut invalidations = Invalidations::new();
        invalidations.add_id(Resource::Kanban, group.kanban_id.as_str());
        for id in &members {
            invalidations.add_id(Resource::Product, id.as_str());
        }
        invalidations.emit(self.sink.as_ref());

        Ok(())
    }

    /// Rewrite member order within a group; must name every member exactly once
    pub async fn reorder_group(&self, group_id: &str, product_ids: &[String]) -> StorageResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        let group = repo::fetch_group(&mut tx, group_id).await?;

        let members = member_ids(&mut tx, group_id).await?;
        check_permutation(&members, product_ids, "member")?;

        let now = Utc::now();
        for (index, id) in product_ids.iter().enumerate() {
            sqlx::query("UPDATE products SET group_position = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let mut invalidations = Invalidations::new();
        invalidations.add_id(Resource::Kanban, group.kanban_id.as_str());
        invalidations.emit(self.sink.as_ref());

        Ok(())
    }

    pub async fn list_groups(&self, kanban_id: &str, column: Column) -> StorageResult<Vec<ProductGroup>> {
        let mut conn = self.pool.acquire().await?;
        repo::list_groups(&mut conn, kanban_id, column).await
    }

    /// Members of a group in group order
    pub async fn list_members(&self, group_id: &str) -> StorageResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        repo::fetch_group(&mut conn, group_id).await?;
        member_ids(&mut conn, group_id).await
    }
}

/// Put a product into `group` at `group_position`; it must share the group's column
async fn join_group(
    conn: &mut SqliteConnection,
    group: &ProductGroup,
    product_id: &str,
    group_position: i64,
) -> StorageResult<()> {
    lock_product(conn, product_id).await?;
    let product = repo::fetch_product(conn, product_id).await?;

    if product.kanban_id != group.kanban_id || product.column_status != group.column_status {
        return Err(StorageError::InvalidInput(format!(
            "product {} is not in the column of group {}",
            product_id, group.id
        )));
    }

    sqlx::query(
        "UPDATE products SET product_group_id = ?, group_position = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&group.id)
    .bind(group_position)
    .bind(Utc::now())
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn ungrouped_product_ids(
    conn: &mut SqliteConnection,
    kanban_id: &str,
    column: Column,
) -> StorageResult<Vec<String>> {
    let ids = sqlx::query_scalar(
        r#"
        SELECT id FROM products
        WHERE kanban_id = ? AND column_status = ? AND archived_at IS NULL AND product_group_id IS NULL
        ORDER BY column_position
        "#,
    )
    .bind(kanban_id)
    .bind(column)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

async fn group_ids(
    conn: &mut SqliteConnection,
    kanban_id: &str,
    column: Column,
) -> StorageResult<Vec<String>> {
    let ids = sqlx::query_scalar(
        "SELECT id FROM product_groups WHERE kanban_id = ? AND column_status = ? ORDER BY column_position",
    )
    .bind(kanban_id)
    .bind(column)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

async fn member_ids(conn: &mut SqliteConnection, group_id: &str) -> StorageResult<Vec<String>> {
    let ids = sqlx::query_scalar(
        "SELECT id FROM products WHERE product_group_id = ? AND archived_at IS NULL ORDER BY group_position",
    )
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_permutation_accepts_any_order() {
        let current = ids(&["a", "b", "c"]);
        assert!(check_permutation(&current, &ids(&["c", "a", "b"]), "product").is_ok());
        assert!(check_permutation(&[], &[], "group").is_ok());
    }

    #[test]
    fn test_permutation_rejects_omission() {
        let current = ids(&["a", "b", "c"]);
        let err = check_permutation(&current, &ids(&["a", "b"]), "product").unwrap_err();
        assert!(matches!(err, StorageError::MismatchedSet(_)));
    }

    #[test]
    fn test_permutation_rejects_duplicates_even_with_matching_count() {
        let current = ids(&["a", "b"]);
        let err = check_permutation(&current, &ids(&["a", "a"]), "product").unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_permutation_rejects_foreign_ids() {
        let current = ids(&["a", "b"]);
        let err = check_permutation(&current, &ids(&["a", "z"]), "product").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
