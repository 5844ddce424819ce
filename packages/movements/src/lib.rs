// ABOUTME: Stock movements for Stockboard
// ABOUTME: The movement executor and the direct, batch and token-confirmed flows built on it

pub mod distribution;
pub mod executor;
pub mod service;
pub mod types;

pub use distribution::validate_distributions;
pub use executor::{execute_single_movement, split_movement, Execution};
pub use service::MovementService;
pub use types::{
    ConfirmInput, Destination, Distribution, DistributionOutcome, MovementOutcome,
    MovementRequest, PublicMovement,
};
