// ABOUTME: Ledger type definitions
// ABOUTME: Movement log rows, their kinds and status lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Manual,
    Automatic,
    Adjustment,
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    Pending,
    Received,
    Approved,
    Cancelled,
    Expired,
}

impl MovementStatus {
    /// Whether the row's quantity has been applied to product stock
    pub fn is_applied(self) -> bool {
        matches!(self, MovementStatus::Received | MovementStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Recount,
    Damage,
    Loss,
    Found,
    Correction,
    InitialCount,
}

/// One immutable ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementLog {
    pub id: String,
    pub product_id: String,
    pub destination_product_id: Option<String>,

    pub from_location_id: Option<String>,
    pub to_location_id: Option<String>,
    pub from_person_id: Option<String>,
    pub to_person_id: Option<String>,

    pub from_stock_level: Option<i64>,
    pub to_stock_level: Option<i64>,
    pub quantity_moved: i64,

    pub movement_type: MovementType,
    pub status: MovementStatus,

    // Adjustment rows only
    pub adjustment_type: Option<AdjustmentType>,
    pub reason: Option<String>,
    pub notes: Option<String>,

    // Deferred confirmation; the token is handed out once, by the create response
    #[serde(skip_serializing, default)]
    pub public_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,

    pub moved_by: String,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MovementLog {
    /// A pending row whose link is past its expiry
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == MovementStatus::Pending
            && self
                .token_expires_at
                .map(|expires| now > expires)
                .unwrap_or(false)
    }
}

/// Insert payload for a new ledger row
#[derive(Debug, Clone)]
pub struct NewMovementLog {
    pub product_id: String,
    pub destination_product_id: Option<String>,
    pub from_location_id: Option<String>,
    pub to_location_id: Option<String>,
    pub from_person_id: Option<String>,
    pub to_person_id: Option<String>,
    pub from_stock_level: Option<i64>,
    pub to_stock_level: Option<i64>,
    pub quantity_moved: i64,
    pub movement_type: MovementType,
    pub status: MovementStatus,
    pub adjustment_type: Option<AdjustmentType>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub public_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub moved_by: String,
}

impl NewMovementLog {
    /// Skeleton for a movement of `quantity` out of `product_id`
    pub fn movement(
        product_id: impl Into<String>,
        quantity: i64,
        movement_type: MovementType,
        status: MovementStatus,
        moved_by: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            destination_product_id: None,
            from_location_id: None,
            to_location_id: None,
            from_person_id: None,
            to_person_id: None,
            from_stock_level: None,
            to_stock_level: None,
            quantity_moved: quantity,
            movement_type,
            status,
            adjustment_type: None,
            reason: None,
            notes: None,
            public_token: None,
            token_expires_at: None,
            moved_by: moved_by.into(),
        }
    }

    /// Skeleton for a signed adjustment against `product_id`
    pub fn adjustment(
        product_id: impl Into<String>,
        change: i64,
        adjustment_type: AdjustmentType,
        status: MovementStatus,
        moved_by: impl Into<String>,
    ) -> Self {
        let mut row = Self::movement(
            product_id,
            change,
            MovementType::Adjustment,
            status,
            moved_by,
        );
        row.adjustment_type = Some(adjustment_type);
        row
    }
}
