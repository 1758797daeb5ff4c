// Transaction data structures

use crate::core::{Address, canonical_json, sha256, sha256_hex, unix_time};
use secp256k1::{Message, Secp256k1, ecdsa};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Location of an output in the chain: which block, which transaction
/// within it, which output within that. The UTXO set is keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub block_index: usize,
    pub transaction_index: usize,
    pub output_index: usize,
}

impl OutPoint {
    pub fn new(block_index: usize, transaction_index: usize, output_index: usize) -> Self {
        Self {
            block_index,
            transaction_index,
            output_index,
        }
    }
}

/// Transaction output - credits value to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub recipient_address: Address,
    pub value: u64,
}

impl TransactionOutput {
    pub fn new(recipient_address: Address, value: u64) -> Self {
        Self {
            recipient_address,
            value,
        }
    }

    /// An output is well-formed iff it carries positive value
    pub fn check_validity(&self) -> bool {
        self.value > 0
    }
}

/// Transaction input - a reference to an output of an earlier block.
///
/// The resolved balance is cached here during validation so fee math does
/// not re-walk the chain; it never travels on the wire. Equality and
/// hashing cover the three indices only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    pub block_index: usize,
    pub transaction_index: usize,
    pub output_index: usize,
    #[serde(skip)]
    pub balance: Option<u64>,
}

impl TransactionInput {
    pub fn new(block_index: usize, transaction_index: usize, output_index: usize) -> Self {
        Self {
            block_index,
            transaction_index,
            output_index,
            balance: None,
        }
    }

    /// An input whose balance is already known (selected from owned outputs)
    pub fn with_balance(outpoint: OutPoint, balance: u64) -> Self {
        Self {
            block_index: outpoint.block_index,
            transaction_index: outpoint.transaction_index,
            output_index: outpoint.output_index,
            balance: Some(balance),
        }
    }

    /// The output this input consumes
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.block_index, self.transaction_index, self.output_index)
    }
}

impl PartialEq for TransactionInput {
    fn eq(&self, other: &Self) -> bool {
        self.outpoint() == other.outpoint()
    }
}

impl Eq for TransactionInput {}

impl Hash for TransactionInput {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.outpoint().hash(state);
    }
}

/// Outcome of signature verification.
///
/// A malformed key is reported apart from a failing signature so callers
/// can tell a garbage identity from a forged payload; both still reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
    MalformedKey,
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Valid)
    }
}

/// Transaction - signed transfer of value from a sender's unspent outputs
/// to a list of recipients.
///
/// A coinbase transaction has no inputs and exactly one output paying the
/// miner; it mints the block reward plus collected fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub timestamp: f64,
    pub signature: Option<String>,
    /// Fee computed during validation; never on the wire
    #[serde(skip)]
    pub fee: Option<u64>,
}

impl Transaction {
    pub fn new(sender: Address, inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        Self {
            sender,
            inputs,
            outputs,
            timestamp: unix_time(),
            signature: None,
            fee: None,
        }
    }

    /// Create a coinbase transaction minting `value` to `recipient`
    pub fn coinbase(recipient: Address, value: u64) -> Self {
        Self::new(
            recipient.clone(),
            Vec::new(),
            vec![TransactionOutput::new(recipient, value)],
        )
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty() && self.outputs.len() == 1
    }

    /// Sum of output values
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|out| out.value).sum()
    }

    /// Short identifier used in log messages
    pub fn hash(&self) -> String {
        sha256_hex(&canonical_json(self))
    }

    /// Digest covered by the signature: the canonical encoding of the
    /// transaction with the signature field cleared.
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        sha256(&canonical_json(&unsigned))
    }

    /// Verify the signature against the sender's public key.
    ///
    /// A coinbase transaction is authenticated by its sole recipient - the
    /// miner who minted it - instead of the sender field.
    pub fn verify_signature(&self) -> SignatureCheck {
        let Some(signature) = &self.signature else {
            return SignatureCheck::Invalid;
        };

        let signer = if self.is_coinbase() {
            &self.outputs[0].recipient_address
        } else {
            &self.sender
        };

        let public_key = match signer.to_public_key() {
            Ok(key) => key,
            Err(_) => return SignatureCheck::MalformedKey,
        };

        let Ok(sig_bytes) = hex::decode(signature) else {
            return SignatureCheck::Invalid;
        };
        let Ok(signature) = ecdsa::Signature::from_der(&sig_bytes) else {
            return SignatureCheck::Invalid;
        };

        let digest = self.signing_digest();
        let message = Message::from_digest_slice(&digest).expect("SHA256 digest is 32 bytes");

        let secp = Secp256k1::new();
        match secp.verify_ecdsa(&message, &signature, &public_key) {
            Ok(()) => SignatureCheck::Valid,
            Err(_) => SignatureCheck::Invalid,
        }
    }

    /// Sum of resolved input balances, if every input has been resolved
    pub fn input_total(&self) -> Option<u64> {
        self.inputs.iter().map(|input| input.balance).sum()
    }

    /// Drop cached balances and fee, e.g. after the chain they were
    /// resolved against has been replaced.
    pub fn clear_caches(&mut self) {
        self.fee = None;
        for input in &mut self.inputs {
            input.balance = None;
        }
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.sender == other.sender
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.timestamp == other.timestamp
            && self.signature == other.signature
    }
}
