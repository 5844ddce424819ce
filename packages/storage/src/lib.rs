// ABOUTME: Data layer bootstrap and persistence primitives for Stockboard
// ABOUTME: Pool setup, embedded migrations, row locking and the shared error type

pub mod db;
pub mod error;
pub mod lock;

pub use db::{connect, DbOptions, MIGRATOR};
pub use error::{StorageError, StorageResult, ValidationDetails};
pub use lock::{begin_write, lock_product};

#[cfg(any(test, feature = "test-utils"))]
pub use db::test_pool;
