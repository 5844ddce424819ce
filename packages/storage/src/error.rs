// ABOUTME: Storage error taxonomy shared by every Stockboard package
// ABOUTME: Infrastructure failures plus the domain rejections surfaced to callers

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable payload for the soft validation gate.
///
/// Callers branch into an evidence-capture step with it instead of showing an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDetails {
    pub product_id: String,
    pub kanban_id: String,
    pub target_column: String,
    pub required_evidence: String,
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Column '{column}' is not valid for a {kanban_type} board")]
    InvalidTransition { kanban_type: String, column: String },
    #[error("Invalid transfer state: {0}")]
    InvalidTransferState(String),
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },
    #[error("Stock cannot go negative: current {current}, change {change}")]
    NegativeStock { current: i64, change: i64 },
    #[error("Validation evidence required before entering '{}'", .0.target_column)]
    ValidationRequired(ValidationDetails),
    #[error("Duplicate destination: {0}")]
    DuplicateDestination(String),
    #[error("Submitted items do not match the column contents: {0}")]
    MismatchedSet(String),
    #[error("Confirmation link has expired")]
    Expired,
    #[error("Movement has already been confirmed")]
    AlreadyConfirmed,
    #[error("Movement has been cancelled")]
    AlreadyCancelled,
    #[error("Received quantity {received} exceeds requested quantity {requested}")]
    ExceedsRequested { requested: i64, received: i64 },
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Short machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Io(_)
            | StorageError::Migration(_)
            | StorageError::Sqlx(_)
            | StorageError::Json(_) => "INTERNAL",
            StorageError::NotFound { .. } => "NOT_FOUND",
            StorageError::InvalidInput(_) => "INVALID_INPUT",
            StorageError::InvalidState(_) => "INVALID_STATE",
            StorageError::InvalidTransition { .. } => "INVALID_TRANSITION",
            StorageError::InvalidTransferState(_) => "INVALID_TRANSFER_STATE",
            StorageError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            StorageError::NegativeStock { .. } => "NEGATIVE_STOCK",
            StorageError::ValidationRequired(_) => "VALIDATION_REQUIRED",
            StorageError::DuplicateDestination(_) => "DUPLICATE_DESTINATION",
            StorageError::MismatchedSet(_) => "MISMATCHED_SET",
            StorageError::Expired => "EXPIRED",
            StorageError::AlreadyConfirmed => "ALREADY_CONFIRMED",
            StorageError::AlreadyCancelled => "ALREADY_CANCELLED",
            StorageError::ExceedsRequested { .. } => "EXCEEDS_REQUESTED",
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall_messages_carry_both_quantities() {
        let err = StorageError::NegativeStock {
            current: 3,
            change: -5,
        };
        assert_eq!(err.to_string(), "Stock cannot go negative: current 3, change -5");
        assert_eq!(err.code(), "NEGATIVE_STOCK");

        let err = StorageError::InsufficientStock {
            requested: 12,
            available: 10,
        };
        assert!(err.to_string().contains("requested 12"));
        assert!(err.to_string().contains("available 10"));
    }

    #[test]
    fn test_validation_required_names_column() {
        let err = StorageError::ValidationRequired(ValidationDetails {
            product_id: "prod-1".to_string(),
            kanban_id: "kan-1".to_string(),
            target_column: "Received".to_string(),
            required_evidence: "photo".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Validation evidence required before entering 'Received'"
        );
    }
}
