// ABOUTME: Shared utility functions for Stockboard
// ABOUTME: ID generation, public token generation, SKU normalization

use base64::Engine;
use rand::Rng;

use crate::constants::PUBLIC_TOKEN_BYTES;

/// Generate a prefixed row id, e.g. `prod-V1StGXR8_Z5jdHi6B-myT`
pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, nanoid::nanoid!())
}

/// Generate an opaque URL-safe token for public confirmation links
pub fn generate_public_token() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; PUBLIC_TOKEN_BYTES];
    rng.fill(&mut bytes[..]);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Normalize a SKU for cross-product aggregation.
///
/// Surrounding whitespace is dropped, inner whitespace runs collapse to a single `-`,
/// and letters are upper-cased. Blank input yields `None` so callers fall back to the
/// location/kanban/details identity key.
pub fn normalize_sku(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let normalized = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase();

    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_has_prefix() {
        let id1 = generate_id("prod");
        let id2 = generate_id("prod");

        assert!(id1.starts_with("prod-"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_public_token_is_url_safe() {
        let token = generate_public_token();

        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_public_token());
    }

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku(Some("  ab 12  ")), Some("AB-12".to_string()));
        assert_eq!(normalize_sku(Some("x")), Some("X".to_string()));
        assert_eq!(normalize_sku(Some("bolt   m8\tzinc")), Some("BOLT-M8-ZINC".to_string()));
        assert_eq!(normalize_sku(Some("   ")), None);
        assert_eq!(normalize_sku(None), None);
    }
}
