// ABOUTME: Stockboard server library used by the `stockboard` binary
// ABOUTME: Configuration loading, server startup and maintenance commands

pub mod config;
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Config, ConfigError};
pub use server::{migrate, run_server, verify_ledger};
