// ABOUTME: Shared test fixture: an in-memory database seeded with boards and places
// ABOUTME: Used by the integration tests of every package above the catalog

use std::sync::Arc;

use sqlx::SqlitePool;

use stockboard_core::{InvalidationSink, RecordingSink};
use stockboard_storage::test_pool;

use crate::board::{Column, KanbanType};
use crate::storage::CatalogStorage;
use crate::types::{
    Kanban, KanbanCreateInput, KanbanLink, Location, LocationCreateInput, Person,
    PersonCreateInput, Product, ProductCreateInput,
};

pub struct Fixture {
    pub pool: SqlitePool,
    pub sink: Arc<RecordingSink>,
    pub catalog: CatalogStorage,
    pub shelf_a: Location,
    pub shelf_b: Location,
    pub person: Person,
    pub order_board: Kanban,
    /// Receive board whose default location is `shelf_a`
    pub receive_board: Kanban,
}

impl Fixture {
    pub async fn new() -> Self {
        let pool = test_pool().await;
        let sink = Arc::new(RecordingSink::new());
        let catalog = CatalogStorage::new(pool.clone(), sink.clone());

        let shelf_a = catalog
            .create_location(LocationCreateInput {
                name: "Shelf A".to_string(),
                department_id: Some("dept-ops".to_string()),
            })
            .await
            .expect("shelf a");
        let shelf_b = catalog
            .create_location(LocationCreateInput {
                name: "Shelf B".to_string(),
                department_id: None,
            })
            .await
            .expect("shelf b");
        let person = catalog
            .create_person(PersonCreateInput {
                name: "Sam Rivera".to_string(),
                email: Some("sam@example.com".to_string()),
                department_id: None,
            })
            .await
            .expect("person");
        let order_board = catalog
            .create_kanban(KanbanCreateInput {
                name: "Purchasing".to_string(),
                kanban_type: KanbanType::Order,
                location_id: None,
            })
            .await
            .expect("order board");
        let receive_board = catalog
            .create_kanban(KanbanCreateInput {
                name: "Warehouse".to_string(),
                kanban_type: KanbanType::Receive,
                location_id: Some(shelf_a.id.clone()),
            })
            .await
            .expect("receive board");

        sink.clear();

        Self {
            pool,
            sink,
            catalog,
            shelf_a,
            shelf_b,
            person,
            order_board,
            receive_board,
        }
    }

    pub fn sink(&self) -> Arc<dyn InvalidationSink> {
        self.sink.clone()
    }

    /// Verified order -> receive link, also set as the order board's default
    pub async fn link_boards(&self) -> KanbanLink {
        let link = self
            .catalog
            .create_link(&self.order_board.id, &self.receive_board.id)
            .await
            .expect("link");
        let link = self
            .catalog
            .verify_link(&link.id, "admin")
            .await
            .expect("verify link");
        self.catalog
            .set_default_link(&self.order_board.id, Some(&self.receive_board.id))
            .await
            .expect("default link");
        self.sink.clear();
        link
    }

    /// Stored product on the receive board with opening stock
    pub async fn stored_product(&self, sku: Option<&str>, location_id: &str, stock: i64) -> Product {
        let product = self
            .catalog
            .create_product(
                ProductCreateInput {
                    kanban_id: self.receive_board.id.clone(),
                    column_status: Some(Column::Stored),
                    product_details: "M8 hex bolt".to_string(),
                    category: Some("Fasteners".to_string()),
                    supplier: Some("Acme".to_string()),
                    sku: sku.map(str::to_string),
                    price: Some(0.25),
                    tags: vec!["hardware".to_string()],
                    location_id: Some(location_id.to_string()),
                    stock_level: Some(stock),
                    ..Default::default()
                },
                "tester",
            )
            .await
            .expect("stored product");
        self.sink.clear();
        product
    }

    /// Product on the order board in the given column
    pub async fn order_product(&self, column: Column) -> Product {
        let product = self
            .catalog
            .create_product(
                ProductCreateInput {
                    kanban_id: self.order_board.id.clone(),
                    column_status: Some(column),
                    product_details: "Label printer".to_string(),
                    sku: Some("lp-200".to_string()),
                    ..Default::default()
                },
                "tester",
            )
            .await
            .expect("order product");
        self.sink.clear();
        product
    }
}
