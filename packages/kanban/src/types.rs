// ABOUTME: Workflow type definitions
// ABOUTME: Move requests and outcomes, transfer log rows, evidence and ordering items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockboard_catalog::{Column, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Automatic,
    Manual,
}

/// One board-to-board reassignment of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLog {
    pub id: String,
    pub product_id: String,
    pub from_kanban_id: String,
    pub to_kanban_id: String,
    pub from_column: Column,
    pub to_column: Column,
    pub transfer_type: TransferType,
    pub transferred_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub target_column: Column,
    pub location_id: Option<String>,
    #[serde(default)]
    pub skip_validation: bool,
}

impl MoveRequest {
    pub fn to(target_column: Column) -> Self {
        Self {
            target_column,
            location_id: None,
            skip_validation: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub product: Product,
    /// Set when entering Purchased carried the product onto a linked receive board
    pub transfer: Option<TransferLog>,
}

/// Evidence recorded for one product/column pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnValidation {
    pub id: String,
    pub product_id: String,
    pub column_status: Column,
    pub evidence_url: String,
    pub notes: Option<String>,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationInput {
    pub column_status: Column,
    pub evidence_url: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Product,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

impl ReorderItem {
    pub fn product(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: ItemType::Product,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: ItemType::Group,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCreateInput {
    pub kanban_id: String,
    pub column_status: Column,
    pub name: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
}
