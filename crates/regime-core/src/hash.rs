use serde::Serialize;
use sha2::{Digest, Sha256};

/// 16-hex-char truncation of a SHA-256 over the canonical JSON serialization
/// of `value` (§6.5 determinism contract / `inputsHash`).
///
/// `serde_json` serializes struct fields in declaration order (not sorted),
/// so the caller's type must keep a stable field order for this to be a
/// meaningful audit trail across runs; that's true of every type in this
/// workspace since none use `#[serde(flatten)]` over a `HashMap`.
pub fn inputs_hash<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Foo {
        a: i32,
        b: String,
    }

    #[test]
    fn hash_is_16_hex_chars() {
        let h = inputs_hash(&Foo { a: 1, b: "x".into() });
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_stable_for_identical_input() {
        let h1 = inputs_hash(&Foo { a: 1, b: "x".into() });
        let h2 = inputs_hash(&Foo { a: 1, b: "x".into() });
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_differs_for_different_input() {
        let h1 = inputs_hash(&Foo { a: 1, b: "x".into() });
        let h2 = inputs_hash(&Foo { a: 2, b: "x".into() });
        assert_ne!(h1, h2);
    }
}
