// ABOUTME: Write transactions and row-level write locks
// ABOUTME: SQLite analogue of SELECT ... FOR UPDATE via a no-op self-update

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::error::{StorageError, StorageResult};

/// Open a transaction that holds the database write lock from its first statement.
///
/// A deferred `BEGIN` that reads before writing cannot upgrade its WAL snapshot once
/// another connection has committed (SQLITE_BUSY_SNAPSHOT), and busy_timeout does not
/// retry that. `BEGIN IMMEDIATE` waits for the lock up front instead.
pub async fn begin_write(pool: &SqlitePool) -> StorageResult<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(StorageError::Sqlx)
}

/// Take the write lock for a product inside the current transaction.
///
/// SQLite has no row locks; the first write of a transaction takes the database-wide
/// reserved lock, so every read-validate-write sequence that starts here runs
/// serialized against other writers. Fails with `NotFound` when the row is missing.
pub async fn lock_product(conn: &mut SqliteConnection, product_id: &str) -> StorageResult<()> {
    let result = sqlx::query("UPDATE products SET id = id WHERE id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await
        .map_err(StorageError::Sqlx)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("Product", product_id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect, DbOptions};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn seed(pool: &SqlitePool) {
        let now = "2025-01-01T00:00:00Z";
        sqlx::query("INSERT INTO kanbans (id, name, kanban_type, created_at, updated_at) VALUES ('k', 'Main', 'receive', ?, ?)")
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO products (id, kanban_id, column_status, product_details, stock_level, column_entered_at, created_at, updated_at) VALUES ('p', 'k', 'stored', 'Bolts', 5, ?, ?, ?)")
            .bind(now)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_transaction_serializes_concurrent_writer() {
        let dir = TempDir::new().unwrap();
        let mut options = DbOptions::new(dir.path().join("stock.db"));
        options.max_connections = 2;
        options.busy_timeout = Duration::from_secs(5);
        let pool = connect(&options).await.unwrap();
        seed(&pool).await;

        // Read first, as confirm and approve do, then write after a competing commit
        let mut tx = begin_write(&pool).await.unwrap();
        let before: i64 = sqlx::query_scalar("SELECT stock_level FROM products WHERE id = 'p'")
            .fetch_one(&mut *tx)
            .await
            .unwrap();

        let competing = tokio::spawn({
            let pool = pool.clone();
            async move {
                sqlx::query("UPDATE products SET stock_level = stock_level + 1 WHERE id = 'p'")
                    .execute(&pool)
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        lock_product(&mut tx, "p").await.unwrap();
        sqlx::query("UPDATE products SET stock_level = ? WHERE id = 'p'")
            .bind(before - 2)
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        competing.await.unwrap().unwrap();

        let after: i64 = sqlx::query_scalar("SELECT stock_level FROM products WHERE id = 'p'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(after, 4);
    }

    #[tokio::test]
    async fn test_lock_missing_product_is_not_found() {
        let dir = TempDir::new().unwrap();
        let pool = connect(&DbOptions::new(dir.path().join("stock.db"))).await.unwrap();

        let mut tx = begin_write(&pool).await.unwrap();
        let result = lock_product(&mut tx, "missing").await;

        assert!(matches!(result, Err(StorageError::NotFound { entity: "Product", .. })));
    }
}
