// ABOUTME: Catalog and product state for Stockboard
// ABOUTME: Boards and their column tables, locations, persons, products

pub mod board;
pub mod repo;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;


pub use board::{Column, KanbanType};
pub use repo::SkuKey;
pub use storage::CatalogStorage;
pub use types::{
    Kanban, KanbanCreateInput, KanbanLink, Location, LocationCreateInput, Person,
    PersonCreateInput, Product, ProductCreateInput, ProductDetailsUpdate, ProductGroup,
};
