// ABOUTME: Batch distribution request checks
// ABOUTME: Quantities, destination uniqueness and the stock total, before any write

use std::collections::HashSet;

use stockboard_storage::{StorageError, StorageResult};

use crate::types::Distribution;

/// Validate a distribution request against the source's available stock.
///
/// Returns the total quantity requested. Destinations are keyed by person when one is
/// given, else by location, so one shelf may appear twice only for two different people.
pub fn validate_distributions(available: i64, distributions: &[Distribution]) -> StorageResult<i64> {
    if distributions.is_empty() {
        return Err(StorageError::InvalidInput(
            "at least one distribution is required".to_string(),
        ));
    }

    let mut keys = HashSet::with_capacity(distributions.len());
    let mut total: i64 = 0;

    for line in distributions {
        line.destination.validate()?;
        if line.quantity <= 0 {
            return Err(StorageError::InvalidInput(format!(
                "distribution quantity must be positive, got {}",
                line.quantity
            )));
        }

        if let Some(key) = line.destination.key() {
            if !keys.insert(key) {
                return Err(StorageError::DuplicateDestination(key.to_string()));
            }
        }

        total = total.checked_add(line.quantity).ok_or_else(|| {
            StorageError::InvalidInput("distribution total overflows".to_string())
        })?;
    }

    if total > available {
        return Err(StorageError::InsufficientStock {
            requested: total,
            available,
        });
    }

    Ok(total)
}
