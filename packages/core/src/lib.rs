// ABOUTME: Core constants, identifiers and shared contracts for Stockboard
// ABOUTME: Foundational package used by every other Stockboard package

pub mod constants;
pub mod invalidation;
pub mod utils;

// Re-export constants
pub use constants::{
    stockboard_dir, CONFIRMATION_TOKEN_TTL_DAYS, DEFAULT_ACTOR, PUBLIC_TOKEN_BYTES,
};

// Re-export invalidation contract
pub use invalidation::{
    Invalidation, InvalidationSink, Invalidations, LoggingSink, RecordingSink, Resource,
};

// Re-export utilities
pub use utils::{generate_id, generate_public_token, normalize_sku};
