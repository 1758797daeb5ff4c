// Hashing and canonical encoding utilities

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Canonical JSON encoding of any serializable value.
///
/// The value is routed through `serde_json::Value`, whose object maps are
/// BTreeMap-backed, so keys always come out sorted. Two values with equal
/// fields therefore always encode to identical bytes, no matter how they
/// were constructed.
pub fn canonical_json<T: Serialize>(value: &T) -> Vec<u8> {
    let value = serde_json::to_value(value).expect("value always encodes to JSON");
    serde_json::to_vec(&value).expect("JSON value always encodes to bytes")
}

/// SHA256 digest of raw bytes
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// SHA256 digest of raw bytes, as a lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
