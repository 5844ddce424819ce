// ABOUTME: Stock ledger: immutable movement and adjustment records
// ABOUTME: Source of truth for audit and for recomputing stock levels

pub mod replay;
pub mod storage;
pub mod types;

pub use replay::{effect_on, replay_stock_level, LedgerVerification};
pub use storage::LedgerStorage;
pub use types::{
    AdjustmentType, MovementLog, MovementStatus, MovementType, NewMovementLog,
};
