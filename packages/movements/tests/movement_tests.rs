// ABOUTME: Integration tests for direct movements and batch distribution
// ABOUTME: Executor effects, SKU aggregates, non-negativity, atomicity and ledger replay

use pretty_assertions::assert_eq;

use stockboard_catalog::fixtures::Fixture;
use stockboard_catalog::Column;
use stockboard_core::Resource;
use stockboard_ledger::{LedgerStorage, MovementStatus, MovementType};
use stockboard_movements::{Destination, Distribution, MovementRequest, MovementService};
use stockboard_storage::StorageError;

fn service(fx: &Fixture) -> MovementService {
    MovementService::new(fx.pool.clone(), fx.sink())
}

fn direct(quantity: i64, destination: Destination) -> MovementRequest {
    MovementRequest {
        quantity,
        destination,
        requires_confirmation: false,
        notes: None,
    }
}

async fn assert_ledger_consistent(fx: &Fixture) {
    let all = LedgerStorage::new(fx.pool.clone()).verify_all().await.unwrap();
    for verification in all {
        assert!(
            verification.consistent,
            "ledger drift for {}: recorded {}, replayed {}",
            verification.product_id, verification.recorded, verification.replayed
        );
    }
}

#[tokio::test]
async fn test_partial_move_recomputes_destination_aggregate() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("X"), &fx.shelf_a.id, 10).await;
    fx.stored_product(Some("X"), &fx.shelf_b.id, 2).await;

    let outcome = service(&fx)
        .create_movement(&p.id, direct(4, Destination::location(fx.shelf_b.id.as_str())), "alice")
        .await
        .unwrap();

    assert_eq!(outcome.product.stock_level, Some(6));
    assert_eq!(outcome.to_stock_level, Some(6));
    assert_eq!(outcome.entry.from_stock_level, Some(10));
    assert_eq!(outcome.entry.to_stock_level, Some(6));
    assert_eq!(outcome.entry.quantity_moved, 4);
    assert_eq!(outcome.entry.status, MovementStatus::Received);
    assert_eq!(outcome.entry.movement_type, MovementType::Manual);

    let split = outcome.destination_product.unwrap();
    assert_eq!(split.stock_level, Some(4));
    assert_eq!(split.location_id.as_deref(), Some(fx.shelf_b.id.as_str()));
    assert_eq!(split.source_product_id.as_deref(), Some(p.id.as_str()));
    assert_eq!(split.sku.as_deref(), Some("X"));

    assert_eq!(fx.catalog.sku_aggregate(&fx.shelf_b.id, "X").await.unwrap(), 6);
    assert_eq!(fx.catalog.sku_aggregate(&fx.shelf_a.id, "X").await.unwrap(), 6);
    assert_ledger_consistent(&fx).await;

    let batch = fx.sink.last().unwrap();
    for location in [&fx.shelf_a.id, &fx.shelf_b.id] {
        assert!(batch.iter().any(
            |i| i.resource == Resource::Location && i.id.as_deref() == Some(location.as_str())
        ));
    }
}

#[tokio::test]
async fn test_moving_all_stock_relocates_the_row() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 5).await;

    let outcome = service(&fx)
        .create_movement(&p.id, direct(5, Destination::location(fx.shelf_b.id.as_str())), "alice")
        .await
        .unwrap();

    let moved = outcome.destination_product.unwrap();
    assert_eq!(moved.id, p.id);
    assert_eq!(moved.stock_level, Some(5));
    assert_eq!(moved.location_id.as_deref(), Some(fx.shelf_b.id.as_str()));
    assert_eq!(outcome.entry.destination_product_id.as_deref(), Some(p.id.as_str()));
    assert_eq!(outcome.to_stock_level, Some(5));
    assert_ledger_consistent(&fx).await;
}

#[tokio::test]
async fn test_person_destination_keeps_location() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(None, &fx.shelf_a.id, 5).await;

    let outcome = service(&fx)
        .create_movement(&p.id, direct(2, Destination::person(fx.person.id.as_str())), "alice")
        .await
        .unwrap();

    let split = outcome.destination_product.unwrap();
    assert_eq!(split.assigned_to_person_id.as_deref(), Some(fx.person.id.as_str()));
    assert_eq!(split.location_id.as_deref(), Some(fx.shelf_a.id.as_str()));
    // No SKU: aggregated by board and description at the shelf
    assert_eq!(outcome.to_stock_level, Some(5));
}

#[tokio::test]
async fn test_overdraw_fails_without_side_effects() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 3).await;

    let result = service(&fx)
        .create_movement(&p.id, direct(4, Destination::location(fx.shelf_b.id.as_str())), "alice")
        .await;

    match result {
        Err(StorageError::InsufficientStock {
            requested,
            available,
        }) => {
            assert_eq!(requested, 4);
            assert_eq!(available, 3);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }
    assert_eq!(fx.catalog.get_product(&p.id).await.unwrap().stock_level, Some(3));
    let entries = LedgerStorage::new(fx.pool.clone())
        .list_for_product(&p.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(fx.sink.batches().is_empty());
}

#[tokio::test]
async fn test_only_stored_products_move() {
    let fx = Fixture::new().await;
    let p = fx.order_product(Column::InReview).await;

    let result = service(&fx)
        .create_movement(&p.id, direct(1, Destination::location(fx.shelf_b.id.as_str())), "alice")
        .await;

    assert!(matches!(result, Err(StorageError::InvalidState(_))));
}

#[tokio::test]
async fn test_unknown_destination_is_not_found() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 3).await;

    let result = service(&fx)
        .create_movement(&p.id, direct(1, Destination::location("loc-missing")), "alice")
        .await;

    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

#[tokio::test]
async fn test_distribute_clones_rows_and_reduces_source() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;

    let outcome = service(&fx)
        .distribute(
            &p.id,
            &[
                Distribution {
                    destination: Destination::location(fx.shelf_b.id.as_str()),
                    quantity: 3,
                },
                Distribution {
                    destination: Destination {
                        location_id: Some(fx.shelf_b.id.clone()),
                        person_id: Some(fx.person.id.clone()),
                    },
                    quantity: 2,
                },
            ],
            "alice",
        )
        .await
        .unwrap();

    assert_eq!(outcome.source.stock_level, Some(5));
    assert_eq!(outcome.clones.len(), 2);
    assert_eq!(outcome.entries.len(), 2);
    assert!(outcome
        .entries
        .iter()
        .all(|e| e.movement_type == MovementType::Batch));
    assert_eq!(outcome.entries[0].from_stock_level, Some(10));
    assert_eq!(outcome.entries[1].from_stock_level, Some(7));

    let earmarked = &outcome.clones[1];
    assert_eq!(earmarked.assigned_to_person_id.as_deref(), Some(fx.person.id.as_str()));
    assert_eq!(earmarked.category.as_deref(), Some("Fasteners"));
    assert_eq!(earmarked.tags, vec!["hardware".to_string()]);
    assert_eq!(earmarked.source_product_id.as_deref(), Some(p.id.as_str()));

    assert_eq!(fx.catalog.sku_aggregate(&fx.shelf_b.id, "x").await.unwrap(), 5);
    assert_ledger_consistent(&fx).await;
}

#[tokio::test]
async fn test_distribute_whole_stock_still_splits() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 4).await;

    let outcome = service(&fx)
        .distribute(
            &p.id,
            &[Distribution {
                destination: Destination::location(fx.shelf_b.id.as_str()),
                quantity: 4,
            }],
            "alice",
        )
        .await
        .unwrap();

    assert_eq!(outcome.source.stock_level, Some(0));
    assert_ne!(outcome.clones[0].id, p.id);
    assert_ledger_consistent(&fx).await;
}

#[tokio::test]
async fn test_distribute_rejects_shape_errors() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 4).await;
    let service = service(&fx);

    let result = service
        .distribute(
            &p.id,
            &[
                Distribution {
                    destination: Destination::location(fx.shelf_b.id.as_str()),
                    quantity: 1,
                },
                Distribution {
                    destination: Destination::location(fx.shelf_b.id.as_str()),
                    quantity: 1,
                },
            ],
            "alice",
        )
        .await;
    assert!(matches!(result, Err(StorageError::DuplicateDestination(_))));

    let result = service
        .distribute(
            &p.id,
            &[Distribution {
                destination: Destination::person("per-missing"),
                quantity: 1,
            }],
            "alice",
        )
        .await;
    assert!(matches!(result, Err(StorageError::NotFound { .. })));

    let result = service
        .distribute(
            &p.id,
            &[Distribution {
                destination: Destination::location(fx.shelf_b.id.as_str()),
                quantity: 5,
            }],
            "alice",
        )
        .await;
    assert!(matches!(result, Err(StorageError::InsufficientStock { .. })));
}

#[tokio::test]
async fn test_distribute_failure_mid_batch_rolls_back_everything() {
    let fx = Fixture::new().await;
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 10).await;

    // Any clone earmarked for this person fails to insert
    sqlx::query(&format!(
        "CREATE TEMP TRIGGER fail_clone BEFORE INSERT ON products WHEN NEW.assigned_to_person_id = '{}' BEGIN SELECT RAISE(ABORT, 'simulated failure'); END",
        fx.person.id
    ))
    .execute(&fx.pool)
    .await
    .unwrap();

    let result = service(&fx)
        .distribute(
            &p.id,
            &[
                Distribution {
                    destination: Destination::location(fx.shelf_b.id.as_str()),
                    quantity: 2,
                },
                Distribution {
                    destination: Destination::person(fx.person.id.as_str()),
                    quantity: 3,
                },
                Distribution {
                    destination: Destination::location(fx.shelf_a.id.as_str()),
                    quantity: 1,
                },
            ],
            "alice",
        )
        .await;

    assert!(matches!(result, Err(StorageError::Sqlx(_))));

    let source = fx.catalog.get_product(&p.id).await.unwrap();
    assert_eq!(source.stock_level, Some(10));

    let clones: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE source_product_id = ?")
        .bind(&p.id)
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(clones, 0);

    let entries = LedgerStorage::new(fx.pool.clone())
        .list_for_product(&p.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert!(fx.sink.batches().is_empty());
}

#[tokio::test]
async fn test_ledger_replays_after_mixed_operations() {
    let fx = Fixture::new().await;
    let service = service(&fx);
    let p = fx.stored_product(Some("x"), &fx.shelf_a.id, 20).await;

    let first = service
        .create_movement(&p.id, direct(5, Destination::location(fx.shelf_b.id.as_str())), "alice")
        .await
        .unwrap();
    let split = first.destination_product.unwrap();

    service
        .create_movement(&split.id, direct(2, Destination::location(fx.shelf_a.id.as_str())), "bob")
        .await
        .unwrap();
    service
        .distribute(
            &p.id,
            &[
                Distribution {
                    destination: Destination::person(fx.person.id.as_str()),
                    quantity: 4,
                },
                Distribution {
                    destination: Destination::location(fx.shelf_b.id.as_str()),
                    quantity: 4,
                },
            ],
            "alice",
        )
        .await
        .unwrap();
    service
        .create_movement(&split.id, direct(3, Destination::location(fx.shelf_a.id.as_str())), "bob")
        .await
        .unwrap();

    assert_eq!(fx.catalog.get_product(&p.id).await.unwrap().stock_level, Some(7));
    assert_ledger_consistent(&fx).await;
}
