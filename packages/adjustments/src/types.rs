// ABOUTME: Adjustment type definitions
// ABOUTME: Delta and absolute-count inputs and the applied outcome

use serde::{Deserialize, Serialize};

use stockboard_catalog::Product;
use stockboard_ledger::{AdjustmentType, MovementLog};

/// A signed correction, e.g. -2 for two damaged units
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentInput {
    pub quantity_change: i64,
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub notes: Option<String>,
}

/// A counted quantity; the delta is derived from the current level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStockInput {
    pub new_quantity: i64,
    #[serde(default = "default_count_type")]
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub notes: Option<String>,
}

fn default_count_type() -> AdjustmentType {
    AdjustmentType::Recount
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentOutcome {
    pub entry: MovementLog,
    pub product: Product,
    /// SKU aggregate at the product's location after the change
    pub to_stock_level: i64,
}
