// ABOUTME: Stock adjustment reconciler for Stockboard
// ABOUTME: Signed corrections to stored stock, applied directly or through approval

pub mod service;
pub mod types;

pub use service::{apply_change, AdjustmentService};
pub use types::{AdjustmentInput, AdjustmentOutcome, SetStockInput};
