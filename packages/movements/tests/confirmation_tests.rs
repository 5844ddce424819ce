// ABOUTME: Integration tests for the public confirmation flow
// ABOUTME: Pending creation, confirm, lazy expiry, cancellation and retry safety

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use stockboard_catalog::fixtures::Fixture;
use stockboard_catalog::Product;
use stockboard_ledger::{LedgerStorage, MovementStatus};
use stockboard_movements::{ConfirmInput, Destination, MovementRequest, MovementService};
use stockboard_storage::StorageError;

fn service(fx: &Fixture) -> MovementService {
    MovementService::new(fx.pool.clone(), fx.sink())
}

/// Service whose links are already past their expiry when issued
fn lapsed_service(fx: &Fixture) -> MovementService {
    MovementService::new(fx.pool.clone(), fx.sink()).with_confirmation_ttl(Duration::seconds(-1))
}

fn pending(quantity: i64, fx: &Fixture) -> MovementRequest {
    MovementRequest {
        quantity,
        destination: Destination::location(fx.shelf_b.id.as_str()),
        requires_confirmation: true,
        notes: Some("for the night shift".to_string()),
    }
}

fn receipt(quantity: i64) -> ConfirmInput {
    ConfirmInput {
        quantity_received: quantity,
        confirmed_by: "Dock B".to_string(),
    }
}

async fn pending_token(service: &MovementService, product: &Product, quantity: i64, fx: &Fixture) -> (String, String) {
    let outcome = service
        .create_movement(&product.id, pending(quantity, fx), "alice")
        .await
        .unwrap();
    let token = outcome.entry.public_token.clone().unwrap();
    (outcome.entry.id, token)
}

async fn stock(fx: &Fixture, product_id: &str) -> Option<i64> {
    fx.catalog.get_product(product_id).await.unwrap().stock_level
}

#[tokio::test]
async fn test_pending_movement_moves_nothing_until_confirmed() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;

    let outcome = service(&fx)
        .create_movement(&p.id, pending(4, &fx), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.entry.status, MovementStatus::Pending);
    assert!(outcome.destination_product.is_none());
    let token = outcome.entry.public_token.as_deref().unwrap();
    assert_eq!(token.len(), 43);

    let expires = outcome.entry.token_expires_at.unwrap();
    let ttl = expires - Utc::now();
    assert!(ttl > Duration::days(6) && ttl <= Duration::days(7));

    assert_eq!(stock(&fx, &p.id).await, Some(10));

    let view = service(&fx).get_by_token(token).await.unwrap();
    assert_eq!(view.status, MovementStatus::Pending);
    assert_eq!(view.quantity, 4);
    assert_eq!(view.product_details, "M8 hex bolt");
}

#[tokio::test]
async fn test_confirm_applies_received_quantity() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (movement_id, token) = pending_token(&service, &p, 4, &fx).await;

    let outcome = service.confirm(&token, receipt(3)).await.unwrap();

    assert_eq!(outcome.entry.id, movement_id);
    assert_eq!(outcome.entry.status, MovementStatus::Received);
    // The requested quantity is replaced by what actually arrived
    assert_eq!(outcome.entry.quantity_moved, 3);
    assert_eq!(outcome.entry.confirmed_by.as_deref(), Some("Dock B"));
    assert!(outcome.entry.confirmed_at.is_some());
    assert_eq!(outcome.product.stock_level, Some(7));
    assert_eq!(outcome.to_stock_level, Some(3));
    assert_eq!(outcome.entry.from_stock_level, Some(10));

    let verification = LedgerStorage::new(fx.pool.clone())
        .verify_product(&p.id)
        .await
        .unwrap();
    assert!(verification.consistent);
}

#[tokio::test]
async fn test_second_confirm_fails_and_changes_nothing() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (_, token) = pending_token(&service, &p, 4, &fx).await;

    service.confirm(&token, receipt(4)).await.unwrap();
    assert_eq!(stock(&fx, &p.id).await, Some(6));
    fx.sink.clear();

    let again = service.confirm(&token, receipt(4)).await;
    assert!(matches!(again, Err(StorageError::AlreadyConfirmed)));
    assert_eq!(stock(&fx, &p.id).await, Some(6));
    assert!(fx.sink.batches().is_empty());
}

#[tokio::test]
async fn test_confirm_more_than_requested_is_rejected() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (_, token) = pending_token(&service, &p, 4, &fx).await;

    let result = service.confirm(&token, receipt(5)).await;
    match result {
        Err(StorageError::ExceedsRequested {
            requested,
            received,
        }) => {
            assert_eq!(requested, 4);
            assert_eq!(received, 5);
        }
        other => panic!("expected ExceedsRequested, got {:?}", other),
    }
    assert_eq!(
        service.get_by_token(&token).await.unwrap().status,
        MovementStatus::Pending
    );
}

#[tokio::test]
async fn test_zero_receipt_closes_without_moving_stock() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (_, token) = pending_token(&service, &p, 4, &fx).await;

    let outcome = service.confirm(&token, receipt(0)).await.unwrap();

    assert_eq!(outcome.entry.status, MovementStatus::Received);
    assert_eq!(outcome.entry.quantity_moved, 0);
    assert!(outcome.destination_product.is_none());
    assert_eq!(stock(&fx, &p.id).await, Some(10));
    assert_eq!(fx.catalog.sku_aggregate(&fx.shelf_b.id, "x").await.unwrap(), 0);
}

#[tokio::test]
async fn test_lapsed_link_self_heals_on_read() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (movement_id, token) = pending_token(&lapsed_service(&fx), &p, 4, &fx).await;

    let view = service(&fx).get_by_token(&token).await.unwrap();
    assert_eq!(view.status, MovementStatus::Expired);

    let stored = LedgerStorage::new(fx.pool.clone())
        .get_entry(&movement_id)
        .await
        .unwrap();
    assert_eq!(stored.status, MovementStatus::Expired);

    let result = service(&fx).confirm(&token, receipt(4)).await;
    assert!(matches!(result, Err(StorageError::Expired)));
    assert_eq!(stock(&fx, &p.id).await, Some(10));
}

#[tokio::test]
async fn test_confirm_on_lapsed_link_expires_it() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (movement_id, token) = pending_token(&lapsed_service(&fx), &p, 4, &fx).await;

    let result = service(&fx).confirm(&token, receipt(4)).await;
    assert!(matches!(result, Err(StorageError::Expired)));

    // The flip to expired is kept even though the confirm failed
    let stored = LedgerStorage::new(fx.pool.clone())
        .get_entry(&movement_id)
        .await
        .unwrap();
    assert_eq!(stored.status, MovementStatus::Expired);
}

#[tokio::test]
async fn test_cancelled_link_still_resolves() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (movement_id, token) = pending_token(&service, &p, 4, &fx).await;

    let cancelled = service.cancel(&movement_id, "alice").await.unwrap();
    assert_eq!(cancelled.status, MovementStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("alice"));
    assert!(cancelled.token_expires_at.unwrap() < Utc::now());

    let view = service.get_by_token(&token).await.unwrap();
    assert_eq!(view.status, MovementStatus::Cancelled);

    assert!(matches!(
        service.confirm(&token, receipt(4)).await,
        Err(StorageError::AlreadyCancelled)
    ));
    assert!(matches!(
        service.cancel(&movement_id, "alice").await,
        Err(StorageError::AlreadyCancelled)
    ));
    assert_eq!(stock(&fx, &p.id).await, Some(10));
}

#[tokio::test]
async fn test_confirm_requires_stored_product_and_stock() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;
    let (_, first) = pending_token(&service, &p, 8, &fx).await;

    // Stock drawn down after the link was issued
    service
        .create_movement(
            &p.id,
            MovementRequest {
                quantity: 5,
                destination: Destination::location(fx.shelf_b.id.as_str()),
                requires_confirmation: false,
                notes: None,
            },
            "alice",
        )
        .await
        .unwrap();

    assert!(matches!(
        service.confirm(&first, receipt(8)).await,
        Err(StorageError::InsufficientStock { .. })
    ));

    let (_, second) = pending_token(&service, &p, 2, &fx).await;
    sqlx::query("UPDATE products SET column_status = 'received' WHERE id = ?")
        .bind(&p.id)
        .execute(&fx.pool)
        .await
        .unwrap();

    assert!(matches!(
        service.confirm(&second, receipt(2)).await,
        Err(StorageError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_list_pending_expires_lapsed_rows() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;

    let (live_id, _) = pending_token(&service, &p, 2, &fx).await;
    let (lapsed_id, _) = pending_token(&lapsed_service(&fx), &p, 3, &fx).await;

    let pending = service.list_pending(&p.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, live_id);

    let lapsed = LedgerStorage::new(fx.pool.clone())
        .get_entry(&lapsed_id)
        .await
        .unwrap();
    assert_eq!(lapsed.status, MovementStatus::Expired);
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let fx = Fixture::new().await;

    assert!(matches!(
        service(&fx).get_by_token("no-such-token").await,
        Err(StorageError::NotFound { .. })
    ));
}
