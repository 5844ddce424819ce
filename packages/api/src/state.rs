// ABOUTME: Shared service state for API handlers
// ABOUTME: One instance of every service over a single SQLite pool

use std::sync::Arc;

use chrono::Duration;
use sqlx::SqlitePool;

use stockboard_adjustments::AdjustmentService;
use stockboard_catalog::CatalogStorage;
use stockboard_core::InvalidationSink;
use stockboard_kanban::{OrderingService, WorkflowEngine};
use stockboard_ledger::LedgerStorage;
use stockboard_movements::MovementService;

#[derive(Clone)]
pub struct DbState {
    pub pool: SqlitePool,
    pub catalog: Arc<CatalogStorage>,
    pub engine: Arc<WorkflowEngine>,
    pub ordering: Arc<OrderingService>,
    pub movements: Arc<MovementService>,
    pub adjustments: Arc<AdjustmentService>,
    pub ledger: Arc<LedgerStorage>,
}

impl DbState {
    pub fn new(
        pool: SqlitePool,
        sink: Arc<dyn InvalidationSink>,
        confirmation_ttl: Duration,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogStorage::new(pool.clone(), sink.clone())),
            engine: Arc::new(WorkflowEngine::new(pool.clone(), sink.clone())),
            ordering: Arc::new(OrderingService::new(pool.clone(), sink.clone())),
            movements: Arc::new(
                MovementService::new(pool.clone(), sink.clone())
                    .with_confirmation_ttl(confirmation_ttl),
            ),
            adjustments: Arc::new(AdjustmentService::new(pool.clone(), sink)),
            ledger: Arc::new(LedgerStorage::new(pool.clone())),
            pool,
        }
    }
}
