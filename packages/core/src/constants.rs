// ABOUTME: Shared constants for Stockboard
// ABOUTME: Confirmation link lifetime, token size, the system actor and the data directory

use std::env;
use std::path::PathBuf;

/// Days a public confirmation link stays valid after creation
pub const CONFIRMATION_TOKEN_TTL_DAYS: i64 = 7;

/// Random bytes behind a public confirmation token
pub const PUBLIC_TOKEN_BYTES: usize = 32;

/// Actor recorded for engine-initiated changes (automatic transfers)
pub const DEFAULT_ACTOR: &str = "system";

/// Get the path to the Stockboard directory (~/.stockboard)
pub fn stockboard_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".stockboard")
    } else {
        dirs::home_dir()
            .unwrap_or_else(env::temp_dir)
            .join(".stockboard")
    }
}
