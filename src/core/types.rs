// Basic types for the ledger

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Ledger address - the hex-encoded compressed secp256k1 public key.
/// A node's identity and its spendable address are the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Get the address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the address back into a public key
    pub fn to_public_key(&self) -> Result<secp256k1::PublicKey, String> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| format!("Invalid address hex: {}", e))?;

        secp256k1::PublicKey::from_slice(&bytes)
            .map_err(|e| format!("Invalid public key: {}", e))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current UNIX time in fractional seconds
pub fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs_f64()
}
