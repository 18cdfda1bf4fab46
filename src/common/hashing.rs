use sha2::{Digest, Sha256};

/// Hashes an identity for audit logging: SHA-256, truncated to the first 12
/// hex characters. Raw session ids never appear in logs.
pub fn hash_identity(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_twelve_hex_chars() {
        let h = hash_identity("session-abc-123");
        assert_eq!(h.len(), 12);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_identity("same"), hash_identity("same"));
    }

    #[test]
    fn distinct_inputs_hash_differently() {
        assert_ne!(hash_identity("a"), hash_identity("b"));
    }
}
