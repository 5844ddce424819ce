// ABOUTME: Kanban workflow engine for Stockboard
// ABOUTME: Column transitions, validation gate, board transfers, reordering and groups

pub mod engine;
pub mod ordering;
pub mod transfer;
pub mod types;

pub use engine::WorkflowEngine;
pub use ordering::{check_permutation, OrderingService};
pub use types::{
    ColumnValidation, GroupCreateInput, ItemType, MoveOutcome, MoveRequest, ReorderItem,
    TransferLog, TransferType, ValidationInput,
};
