// ABOUTME: Ledger replay: rebuild a product's stock level from its movement history
// ABOUTME: Pure fold used by consistency checks and repair tooling

use serde::Serialize;

use crate::types::{MovementLog, MovementType};

/// Net effect of one ledger row on one product's stock.
///
/// Adjustment rows are signed deltas on `product_id`. Every other row takes
/// `quantity_moved` from `product_id` and gives it to `destination_product_id`;
/// a full relocation names the same product on both sides and nets to zero.
/// Rows that were never applied (pending, cancelled, expired) contribute nothing.
pub fn effect_on(entry: &MovementLog, product_id: &str) -> i64 {
    if !entry.status.is_applied() {
        return 0;
    }

    if entry.movement_type == MovementType::Adjustment {
        return if entry.product_id == product_id {
            entry.quantity_moved
        } else {
            0
        };
    }

    let mut delta = 0;
    if entry.product_id == product_id {
        delta -= entry.quantity_moved;
    }
    if entry.destination_product_id.as_deref() == Some(product_id) {
        delta += entry.quantity_moved;
    }
    delta
}

/// Fold rows (in creation order) into the stock level they imply
pub fn replay_stock_level<'a, I>(entries: I, product_id: &str) -> i64
where
    I: IntoIterator<Item = &'a MovementLog>,
{
    entries
        .into_iter()
        .fold(0, |level, entry| level + effect_on(entry, product_id))
}

/// Outcome of comparing a product's recorded stock with its replayed ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerVerification {
    pub product_id: String,
    pub recorded: i64,
    pub replayed: i64,
    pub entries: usize,
    pub consistent: bool,
}

impl LedgerVerification {
    pub fn new(product_id: impl Into<String>, recorded: i64, replayed: i64, entries: usize) -> Self {
        Self {
            product_id: product_id.into(),
            recorded,
            replayed,
            entries,
            consistent: recorded == replayed,
        }
    }
}
