// ABOUTME: Integration tests for the stock adjustment reconciler
// ABOUTME: Direct corrections, absolute counts and the pending approval lifecycle

use pretty_assertions::assert_eq;

use stockboard_adjustments::{AdjustmentInput, AdjustmentService, SetStockInput};
use stockboard_catalog::fixtures::Fixture;
use stockboard_catalog::Column;
use stockboard_ledger::{AdjustmentType, LedgerStorage, MovementStatus, MovementType};
use stockboard_storage::StorageError;

fn service(fx: &Fixture) -> AdjustmentService {
    AdjustmentService::new(fx.pool.clone(), fx.sink())
}

fn delta(change: i64, adjustment_type: AdjustmentType) -> AdjustmentInput {
    AdjustmentInput {
        quantity_change: change,
        adjustment_type,
        reason: "cycle count".to_string(),
        notes: None,
    }
}

async fn stock(fx: &Fixture, product_id: &str) -> Option<i64> {
    fx.catalog.get_product(product_id).await.unwrap().stock_level
}

async fn assert_consistent(fx: &Fixture, product_id: &str) {
    let verification = LedgerStorage::new(fx.pool.clone())
        .verify_product(product_id)
        .await
        .unwrap();
    assert!(
        verification.consistent,
        "recorded {} replayed {}",
        verification.recorded, verification.replayed
    );
}

#[tokio::test]
async fn test_direct_adjustment_is_auto_approved() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    fx.stored_product(Some("x"), &fx.shelf_a.id, 5).await;

    let outcome = service(&fx)
        .adjust(&p.id, delta(-2, AdjustmentType::Damage), "manager")
        .await
        .unwrap();

    assert_eq!(outcome.product.stock_level, Some(8));
    assert_eq!(outcome.to_stock_level, 13);
    assert_eq!(outcome.entry.movement_type, MovementType::Adjustment);
    assert_eq!(outcome.entry.status, MovementStatus::Approved);
    assert_eq!(outcome.entry.approved_by.as_deref(), Some("manager"));
    assert_eq!(outcome.entry.from_stock_level, Some(10));
    assert_eq!(outcome.entry.reason.as_deref(), Some("cycle count"));
    assert_consistent(&fx, &p.id).await;
}

#[tokio::test]
async fn test_adjustment_below_zero_is_rejected_with_both_numbers() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 3).await;

    let result = service(&fx)
        .adjust(&p.id, delta(-5, AdjustmentType::Loss), "manager")
        .await;

    match result {
        Err(StorageError::NegativeStock { current, change }) => {
            assert_eq!(current, 3);
            assert_eq!(change, -5);
        }
        other => panic!("expected NegativeStock, got {:?}", other),
    }
    assert_eq!(stock(&fx, &p.id).await, Some(3));
    assert!(fx.sink.batches().is_empty());
}

#[tokio::test]
async fn test_zero_and_reasonless_adjustments_are_rejected() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 3).await;
    let service = service(&fx);

    assert!(matches!(
        service.adjust(&p.id, delta(0, AdjustmentType::Recount), "manager").await,
        Err(StorageError::InvalidInput(_))
    ));

    let mut blank = delta(1, AdjustmentType::Found);
    blank.reason = "  ".to_string();
    assert!(matches!(
        service.adjust(&p.id, blank, "manager").await,
        Err(StorageError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_only_stored_products_adjust() {
    let fx = Fixture::new().await;
    let p = fx.order_product(Column::InReview).await;

    let result = service(&fx)
        .adjust(&p.id, delta(1, AdjustmentType::Found), "manager")
        .await;

    assert!(matches!(result, Err(StorageError::InvalidState(_))));
}

#[tokio::test]
async fn test_adjust_to_derives_the_delta() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let service = service(&fx);

    let outcome = service
        .adjust_to(
            &p.id,
            SetStockInput {
                new_quantity: 7,
                adjustment_type: AdjustmentType::Recount,
                reason: "annual stocktake".to_string(),
                notes: None,
            },
            "manager",
        )
        .await
        .unwrap();

    assert_eq!(outcome.entry.quantity_moved, -3);
    assert_eq!(outcome.product.stock_level, Some(7));

    assert_consistent(&fx, &p.id).await;
}

#[tokio::test]
async fn test_matching_count_records_zero_change() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let service = service(&fx);

    let outcome = service
        .adjust_to(
            &p.id,
            SetStockInput {
                new_quantity: 10,
                adjustment_type: AdjustmentType::Recount,
                reason: "cycle count".to_string(),
                notes: None,
            },
            "manager",
        )
        .await
        .unwrap();

    assert_eq!(outcome.entry.quantity_moved, 0);
    assert_eq!(outcome.entry.status, MovementStatus::Approved);
    assert_eq!(outcome.entry.from_stock_level, Some(10));
    assert_eq!(outcome.product.stock_level, Some(10));
    assert_eq!(outcome.to_stock_level, 10);

    // The signed path still refuses a no-op
    assert!(matches!(
        service.adjust(&p.id, delta(0, AdjustmentType::Recount), "manager").await,
        Err(StorageError::InvalidInput(_))
    ));
    assert_consistent(&fx, &p.id).await;
}

#[tokio::test]
async fn test_pending_adjustment_applies_only_on_approval() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let service = service(&fx);

    let pending = service
        .request_adjustment(&p.id, delta(-4, AdjustmentType::Damage), "clerk")
        .await
        .unwrap();
    assert_eq!(pending.status, MovementStatus::Pending);
    assert_eq!(stock(&fx, &p.id).await, Some(10));
    assert_consistent(&fx, &p.id).await;

    let edited = service
        .update_pending_adjustment(&pending.id, delta(-3, AdjustmentType::Damage))
        .await
        .unwrap();
    assert_eq!(edited.quantity_moved, -3);

    let approved = service
        .approve_adjustment(&pending.id, "manager")
        .await
        .unwrap();
    assert_eq!(approved.entry.status, MovementStatus::Approved);
    assert_eq!(approved.entry.approved_by.as_deref(), Some("manager"));
    assert_eq!(approved.entry.from_stock_level, Some(10));
    assert_eq!(approved.product.stock_level, Some(7));
    assert_consistent(&fx, &p.id).await;

    // Approved rows are final
    assert!(matches!(
        service.cancel_adjustment(&pending.id, "clerk").await,
        Err(StorageError::InvalidState(_))
    ));
    assert!(matches!(
        service
            .update_pending_adjustment(&pending.id, delta(-1, AdjustmentType::Damage))
            .await,
        Err(StorageError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_approval_rechecks_current_stock() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 5).await;
    let service = service(&fx);

    let pending = service
        .request_adjustment(&p.id, delta(-4, AdjustmentType::Loss), "clerk")
        .await
        .unwrap();
    service
        .adjust(&p.id, delta(-3, AdjustmentType::Damage), "manager")
        .await
        .unwrap();

    let result = service.approve_adjustment(&pending.id, "manager").await;
    assert!(matches!(result, Err(StorageError::NegativeStock { .. })));
    assert_eq!(stock(&fx, &p.id).await, Some(2));
    assert_consistent(&fx, &p.id).await;
}

#[tokio::test]
async fn test_cancelled_adjustment_is_listed_but_never_applied() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 5).await;
    let service = service(&fx);

    let pending = service
        .request_adjustment(&p.id, delta(2, AdjustmentType::Found), "clerk")
        .await
        .unwrap();
    let cancelled = service.cancel_adjustment(&pending.id, "manager").await.unwrap();
    assert_eq!(cancelled.status, MovementStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("manager"));

    assert!(matches!(
        service.approve_adjustment(&pending.id, "manager").await,
        Err(StorageError::InvalidState(_))
    ));

    let all = service.list_adjustments(&p.id, None).await.unwrap();
    // Opening count plus the cancelled request
    assert_eq!(all.len(), 2);
    let cancelled_only = service
        .list_adjustments(&p.id, Some(MovementStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled_only.len(), 1);
    assert_eq!(stock(&fx, &p.id).await, Some(5));
    assert_consistent(&fx, &p.id).await;
}

#[test]
fn test_set_stock_input_defaults_to_recount() {
    let input: SetStockInput =
        serde_json::from_str(r#"{"newQuantity": 4, "reason": "count"}"#).unwrap();
    assert_eq!(input.adjustment_type, AdjustmentType::Recount);
}
