// ABOUTME: Catalog type definitions
// ABOUTME: Boards, links, locations, persons, products and product groups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::{Column, KanbanType};
use crate::repo::SkuKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kanban {
    pub id: String,
    pub name: String,
    pub kanban_type: KanbanType,
    /// Location products take when they arrive on this board
    pub location_id: Option<String>,
    /// Receive board purchased products transfer to by default
    pub default_linked_kanban_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanCreateInput {
    pub name: String,
    pub kanban_type: KanbanType,
    pub location_id: Option<String>,
}

/// Order board -> receive board link; only verified links carry transfers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanLink {
    pub id: String,
    pub order_kanban_id: String,
    pub receive_kanban_id: String,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub department_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCreateInput {
    pub name: String,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub department_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonCreateInput {
    pub name: String,
    pub email: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub kanban_id: String,
    pub column_status: Column,

    // Descriptive fields
    pub product_details: String,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub sku: Option<String>,
    pub dimensions: Option<String>,
    pub price: Option<f64>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,

    // Placement
    pub location_id: Option<String>,
    pub assigned_to_person_id: Option<String>,

    // Stock
    pub stock_level: Option<i64>,
    pub source_product_id: Option<String>,

    // Workflow
    pub is_draft: bool,
    pub is_rejected: bool,
    pub product_group_id: Option<String>,
    pub group_position: Option<i64>,
    pub column_position: i64,
    pub preferred_receive_kanban_id: Option<String>,
    pub column_entered_at: DateTime<Utc>,

    pub archived_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Stock level treating "never stored" as zero
    pub fn current_stock(&self) -> i64 {
        self.stock_level.unwrap_or(0)
    }

    pub fn is_stored(&self) -> bool {
        self.column_status == Column::Stored
    }

    /// Identity used to aggregate stock across rows at one location
    pub fn sku_key(&self) -> SkuKey {
        match &self.sku {
            Some(sku) => SkuKey::Sku(sku.clone()),
            None => SkuKey::Details {
                kanban_id: self.kanban_id.clone(),
                product_details: self.product_details.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreateInput {
    pub kanban_id: String,
    /// Defaults to the board's first column
    pub column_status: Option<Column>,
    pub product_details: String,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub sku: Option<String>,
    pub dimensions: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    /// Defaults to the board's location
    pub location_id: Option<String>,
    pub assigned_to_person_id: Option<String>,
    /// Only accepted for products created directly in Stored
    pub stock_level: Option<i64>,
    pub preferred_receive_kanban_id: Option<String>,
}

/// Descriptive fields only; stock and workflow fields change through the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetailsUpdate {
    pub product_details: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub sku: Option<String>,
    pub dimensions: Option<String>,
    pub price: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductGroup {
    pub id: String,
    pub kanban_id: String,
    pub column_status: Column,
    pub name: String,
    pub column_position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
