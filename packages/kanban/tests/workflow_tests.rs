// ABOUTME: Integration tests for the kanban workflow engine
// ABOUTME: Transition rules, evidence gate, draft promotion and board transfers

use pretty_assertions::assert_eq;

use stockboard_catalog::fixtures::Fixture;
use stockboard_catalog::{Column, ProductCreateInput};
use stockboard_core::{Resource, DEFAULT_ACTOR};
use stockboard_kanban::{MoveRequest, TransferType, ValidationInput, WorkflowEngine};
use stockboard_ledger::LedgerStorage;
use stockboard_storage::StorageError;

fn engine(fx: &Fixture) -> WorkflowEngine {
    WorkflowEngine::new(fx.pool.clone(), fx.sink())
}

async fn receive_product(fx: &Fixture, column: Column) -> stockboard_catalog::Product {
    let product = fx
        .catalog
        .create_product(
            ProductCreateInput {
                kanban_id: fx.receive_board.id.clone(),
                column_status: Some(column),
                product_details: "Pallet wrap".to_string(),
                sku: Some("wrap".to_string()),
                ..Default::default()
            },
            "tester",
        )
        .await
        .unwrap();
    fx.sink.clear();
    product
}

#[tokio::test]
async fn test_column_outside_board_type_is_invalid_transition() {
    let fx = Fixture::new().await;
    let product = fx.order_product(Column::NewRequest).await;

    let result = engine(&fx)
        .move_product(&product.id, MoveRequest::to(Column::Stored), "alice")
        .await;

    assert!(matches!(result, Err(StorageError::InvalidTransition { .. })));
    let unchanged = fx.catalog.get_product(&product.id).await.unwrap();
    assert_eq!(unchanged.column_status, Column::NewRequest);
    assert!(fx.sink.batches().is_empty());
}

#[tokio::test]
async fn test_move_lands_at_front_and_resets_timer() {
    let fx = Fixture::new().await;
    let first = fx.order_product(Column::InReview).await;
    let second = fx.order_product(Column::InReview).await;
    let mover = fx.order_product(Column::NewRequest).await;

    let outcome = engine(&fx)
        .move_product(&mover.id, MoveRequest::to(Column::InReview), "alice")
        .await
        .unwrap();

    assert_eq!(first.column_position, 0);
    assert_eq!(second.column_position, -1);
    assert_eq!(outcome.product.column_position, -2);
    assert!(outcome.product.column_entered_at >= mover.column_entered_at);
    assert!(outcome.product.is_draft);
    assert!(outcome.transfer.is_none());

    let column = fx
        .catalog
        .list_column(&fx.order_board.id, Column::InReview)
        .await
        .unwrap();
    assert_eq!(column[0].id, mover.id);
}

#[tokio::test]
async fn test_same_column_is_a_no_op() {
    let fx = Fixture::new().await;
    let product = fx.order_product(Column::InReview).await;

    let outcome = engine(&fx)
        .move_product(&product.id, MoveRequest::to(Column::InReview), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.product.id, product.id);
    assert_eq!(outcome.product.column_position, product.column_position);
    assert!(fx.sink.batches().is_empty());
}

#[tokio::test]
async fn test_purchase_clears_draft_without_link() {
    let fx = Fixture::new().await;
    let product = fx.order_product(Column::InReview).await;
    assert!(product.is_draft);

    let outcome = engine(&fx)
        .move_product(&product.id, MoveRequest::to(Column::Purchased), "alice")
        .await
        .unwrap();

    assert!(!outcome.product.is_draft);
    assert_eq!(outcome.product.kanban_id, fx.order_board.id);
    assert!(outcome.transfer.is_none());
}

#[tokio::test]
async fn test_purchase_transfers_over_verified_default_link() {
    let fx = Fixture::new().await;
    fx.link_boards().await;
    let product = fx.order_product(Column::InReview).await;

    let outcome = engine(&fx)
        .move_product(&product.id, MoveRequest::to(Column::Purchased), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.product.kanban_id, fx.receive_board.id);
    assert_eq!(outcome.product.column_status, Column::Purchased);
    assert_eq!(
        outcome.product.location_id.as_deref(),
        Some(fx.shelf_a.id.as_str())
    );
    assert!(!outcome.product.is_draft);

    let transfer = outcome.transfer.unwrap();
    assert_eq!(transfer.transfer_type, TransferType::Automatic);
    assert_eq!(transfer.transferred_by, DEFAULT_ACTOR);
    assert_eq!(transfer.from_kanban_id, fx.order_board.id);
    assert_eq!(transfer.to_kanban_id, fx.receive_board.id);

    let history = engine(&fx).list_transfers(&product.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, transfer.id);

    let batch = fx.sink.last().unwrap();
    assert!(batch.iter().any(|i| i.resource == Resource::TransferLog));
    assert!(batch
        .iter()
        .any(|i| i.resource == Resource::Kanban && i.id.as_deref() == Some(fx.receive_board.id.as_str())));
}

#[tokio::test]
async fn test_unverified_link_does_not_transfer() {
    let fx = Fixture::new().await;
    fx.catalog
        .create_link(&fx.order_board.id, &fx.receive_board.id)
        .await
        .unwrap();
    fx.catalog
        .set_default_link(&fx.order_board.id, Some(&fx.receive_board.id))
        .await
        .unwrap();
    let product = fx.order_product(Column::InReview).await;

    let outcome = engine(&fx)
        .move_product(&product.id, MoveRequest::to(Column::Purchased), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.product.kanban_id, fx.order_board.id);
    assert!(outcome.transfer.is_none());
}

#[tokio::test]
async fn test_rejected_request_cannot_be_purchased() {
    let fx = Fixture::new().await;
    let product = fx.order_product(Column::InReview).await;
    fx.catalog.set_rejected(&product.id, true).await.unwrap();

    let result = engine(&fx)
        .move_product(&product.id, MoveRequest::to(Column::Purchased), "alice")
        .await;

    assert!(matches!(result, Err(StorageError::InvalidState(_))));
}

#[tokio::test]
async fn test_received_requires_evidence_unless_skipped() {
    let fx = Fixture::new().await;
    let product = receive_product(&fx, Column::Purchased).await;
    let engine = engine(&fx);

    let err = engine
        .move_product(&product.id, MoveRequest::to(Column::Received), "alice")
        .await
        .unwrap_err();
    match err {
        StorageError::ValidationRequired(details) => {
            assert_eq!(details.product_id, product.id);
            assert_eq!(details.kanban_id, fx.receive_board.id);
            assert_eq!(details.target_column, "Received");
        }
        other => panic!("expected ValidationRequired, got {:?}", other),
    }

    let skipped = engine
        .move_product(
            &product.id,
            MoveRequest {
                target_column: Column::Received,
                location_id: None,
                skip_validation: true,
            },
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(skipped.product.column_status, Column::Received);
}

#[tokio::test]
async fn test_recorded_evidence_opens_the_gate() {
    let fx = Fixture::new().await;
    let product = receive_product(&fx, Column::Purchased).await;
    let engine = engine(&fx);

    let validation = engine
        .record_validation(
            &product.id,
            ValidationInput {
                column_status: Column::Received,
                evidence_url: "https://photos.example.com/p/1.jpg".to_string(),
                notes: Some("box intact".to_string()),
            },
            "dock-1",
        )
        .await
        .unwrap();
    assert_eq!(validation.recorded_by, "dock-1");

    let outcome = engine
        .move_product(&product.id, MoveRequest::to(Column::Received), "dock-1")
        .await
        .unwrap();
    assert_eq!(outcome.product.column_status, Column::Received);
}

#[tokio::test]
async fn test_first_time_stored_starts_at_zero() {
    let fx = Fixture::new().await;
    let product = receive_product(&fx, Column::Received).await;
    assert_eq!(product.stock_level, None);

    let outcome = engine(&fx)
        .move_product(
            &product.id,
            MoveRequest {
                target_column: Column::Stored,
                location_id: Some(fx.shelf_b.id.clone()),
                skip_validation: false,
            },
            "alice",
        )
        .await
        .unwrap();

    assert_eq!(outcome.product.stock_level, Some(0));
    assert_eq!(outcome.product.location_id.as_deref(), Some(fx.shelf_b.id.as_str()));

    let verification = LedgerStorage::new(fx.pool.clone())
        .verify_product(&product.id)
        .await
        .unwrap();
    assert!(verification.consistent);
}

#[tokio::test]
async fn test_stock_survives_leaving_and_reentering_stored() {
    let fx = Fixture::new().await;
    let product = fx.stored_product(Some("x"), &fx.shelf_a.id, 8).await;
    let engine = engine(&fx);

    engine
        .move_product(&product.id, MoveRequest::to(Column::Purchased), "alice")
        .await
        .unwrap();
    let back = engine
        .move_product(&product.id, MoveRequest::to(Column::Stored), "alice")
        .await
        .unwrap();

    assert_eq!(back.product.stock_level, Some(8));
}

#[tokio::test]
async fn test_manual_transfer_requires_purchased_and_link() {
    let fx = Fixture::new().await;
    let engine = engine(&fx);

    let draft = fx.order_product(Column::InReview).await;
    let result = engine.transfer_product(&draft.id, None, "alice").await;
    assert!(matches!(result, Err(StorageError::InvalidTransferState(_))));

    let purchased = fx.order_product(Column::Purchased).await;
    let result = engine
        .transfer_product(&purchased.id, Some(&fx.receive_board.id), "alice")
        .await;
    assert!(matches!(result, Err(StorageError::InvalidTransferState(_))));

    fx.link_boards().await;
    let outcome = engine
        .transfer_product(&purchased.id, None, "alice")
        .await
        .unwrap();
    assert_eq!(outcome.product.kanban_id, fx.receive_board.id);
    let transfer = outcome.transfer.unwrap();
    assert_eq!(transfer.transfer_type, TransferType::Manual);
    assert_eq!(transfer.transferred_by, "alice");
}

#[tokio::test]
async fn test_leaving_a_column_leaves_the_group() {
    let fx = Fixture::new().await;
    let product = fx.order_product(Column::InReview).await;
    let ordering = stockboard_kanban::OrderingService::new(fx.pool.clone(), fx.sink());

    ordering
        .create_group(stockboard_kanban::GroupCreateInput {
            kanban_id: fx.order_board.id.clone(),
            column_status: Column::InReview,
            name: "Office refit".to_string(),
            product_ids: vec![product.id.clone()],
        })
        .await
        .unwrap();

    let outcome = engine(&fx)
        .move_product(&product.id, MoveRequest::to(Column::NewRequest), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.product.product_group_id, None);
    assert_eq!(outcome.product.group_position, None);
}
