//! Content digest shared by blocks, transactions and signatures.
//!
//! Every input is turned into a string (strings verbatim, anything else as
//! canonical JSON), the strings are sorted and joined with a single space, and
//! the result is hashed with SHA-256. Sorting makes the digest independent of
//! the order in which callers pass the fields.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash any number of serializable values, order-independently.
///
/// ```ignore
/// let h = crypto_hash!(timestamp, last_hash, data, nonce, difficulty);
/// ```
#[macro_export]
macro_rules! crypto_hash {
    ($($input:expr),+ $(,)?) => {
        $crate::crypto::hash_parts(&[$($crate::crypto::stringify(&$input)),+])
    };
}

/// String form of a single hash input.
pub fn stringify<T: Serialize + ?Sized>(input: &T) -> String {
    match serde_json::to_value(input) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        // Only non-string map keys can fail here; none of our types have them.
        Err(e) => format!("<unserializable: {e}>"),
    }
}

/// SHA-256 (lowercase hex) of the sorted, space-joined parts.
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> String {
    let mut sorted: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sha256_hex(sorted.join(" ").as_bytes())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Raw 32-byte digest behind a hex string produced by [`hash_parts`].
pub fn digest_bytes(hash_hex: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(hash_hex).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn hashes_a_plain_string_with_sha256() {
        assert_eq!(
            crypto_hash!("foo"),
            "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"
        );
    }

    #[test]
    fn same_hash_for_any_argument_order() {
        assert_eq!(
            crypto_hash!("one", "two", "three"),
            crypto_hash!("three", "one", "two")
        );
        let data = vec!["blockchain", "data"];
        assert_eq!(
            crypto_hash!(1_700_000_000_000i64, "last", data, 7u64, 3u32),
            crypto_hash!(3u32, 7u64, "last", data, 1_700_000_000_000i64)
        );
    }

    #[test]
    fn hash_changes_when_an_input_property_changes() {
        let mut map: BTreeMap<String, u64> = BTreeMap::new();
        let original = crypto_hash!(map);
        map.insert("temp".into(), 1);
        assert_ne!(original, crypto_hash!(map));
    }

    #[test]
    fn strings_are_not_json_quoted() {
        assert_eq!(stringify("abc"), "abc");
        assert_eq!(stringify(&42u64), "42");
        assert_eq!(stringify(&vec![1, 2]), "[1,2]");
    }

    #[test]
    fn digest_bytes_round_trips_a_hash() {
        let h = crypto_hash!("foo");
        let bytes = digest_bytes(&h).unwrap();
        assert_eq!(hex::encode(bytes), h);
        assert!(digest_bytes("zz").is_none());
    }
}
