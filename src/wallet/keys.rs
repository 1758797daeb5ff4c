// Key management and signing

use crate::core::{Address, Transaction};
use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

/// A node identity: a secp256k1 keypair. The hex-encoded compressed
/// public key doubles as the node's address on the ledger.
#[derive(Clone)]
pub struct Keypair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl Keypair {
    /// Generate a fresh keypair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = OsRng;

        let secret_key = SecretKey::new(&mut rng);
        let public_key = secret_key.public_key(&secp);

        Self {
            secret_key,
            public_key,
        }
    }

    /// Rebuild a keypair from stored secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, String> {
        let secp = Secp256k1::new();
        let secret_key =
            SecretKey::from_slice(bytes).map_err(|e| format!("Invalid secret key: {}", e))?;
        let public_key = secret_key.public_key(&secp);

        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// The ledger address derived from this keypair
    pub fn address(&self) -> Address {
        Address(hex::encode(self.public_key.serialize()))
    }

    /// Sign a 32-byte digest; the DER signature comes back hex-encoded
    pub fn sign_digest(&self, digest: &[u8; 32]) -> String {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(digest).expect("digest is 32 bytes");
        let signature = secp.sign_ecdsa(&message, &self.secret_key);
        hex::encode(signature.serialize_der())
    }

    /// Sign a transaction in place. The signature covers the canonical
    /// encoding with the signature field cleared.
    pub fn sign_transaction(&self, tx: &mut Transaction) {
        let signature = self.sign_digest(&tx.signing_digest());
        tx.signature = Some(signature);
    }
}
