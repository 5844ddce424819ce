// ABOUTME: Movement type definitions
// ABOUTME: Destinations, requests, distribution lines and operation outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockboard_catalog::Product;
use stockboard_ledger::{MovementLog, MovementStatus};
use stockboard_storage::{StorageError, StorageResult};

/// Where moved units end up: a location, a person, or a person at a location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub location_id: Option<String>,
    pub person_id: Option<String>,
}

impl Destination {
    pub fn location(id: impl Into<String>) -> Self {
        Self {
            location_id: Some(id.into()),
            person_id: None,
        }
    }

    pub fn person(id: impl Into<String>) -> Self {
        Self {
            location_id: None,
            person_id: Some(id.into()),
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.location_id.is_none() && self.person_id.is_none() {
            return Err(StorageError::InvalidInput(
                "destination needs a location or a person".to_string(),
            ));
        }
        Ok(())
    }

    /// Identity used to spot duplicate destinations: the person if any, else the location
    pub fn key(&self) -> Option<&str> {
        self.person_id.as_deref().or(self.location_id.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub quantity: i64,
    #[serde(flatten)]
    pub destination: Destination,
    /// Defer the move until the recipient confirms through a public link
    #[serde(default)]
    pub requires_confirmation: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    #[serde(flatten)]
    pub destination: Destination,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmInput {
    pub quantity_received: i64,
    pub confirmed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementOutcome {
    pub entry: MovementLog,
    /// Source product after the move
    pub product: Product,
    /// Row that holds the moved units; absent while pending or for an empty receipt
    pub destination_product: Option<Product>,
    /// Destination SKU aggregate after the move
    pub to_stock_level: Option<i64>,
    /// Confirmation token, present only on the response that created a pending movement
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub public_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionOutcome {
    pub source: Product,
    pub clones: Vec<Product>,
    pub entries: Vec<MovementLog>,
}

/// What a token holder may see of a movement.
///
/// No internal ids beyond the movement's own; the token is never echoed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMovement {
    pub id: String,
    pub status: MovementStatus,
    pub product_details: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub to_location_id: Option<String>,
    pub to_person_id: Option<String>,
    pub moved_by: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PublicMovement {
    pub fn new(entry: &MovementLog, product: &Product) -> Self {
        Self {
            id: entry.id.clone(),
            status: entry.status,
            product_details: product.product_details.clone(),
            sku: product.sku.clone(),
            quantity: entry.quantity_moved,
            to_location_id: entry.to_location_id.clone(),
            to_person_id: entry.to_person_id.clone(),
            moved_by: entry.moved_by.clone(),
            token_expires_at: entry.token_expires_at,
            confirmed_by: entry.confirmed_by.clone(),
            confirmed_at: entry.confirmed_at,
            cancelled_at: entry.cancelled_at,
            created_at: entry.created_at,
        }
    }
}
