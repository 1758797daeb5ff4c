// Block data structures

use crate::core::{Transaction, canonical_json, sha256_hex, unix_time};
use serde::{Deserialize, Serialize};

/// Proof carried by the genesis block; nothing precedes it to verify against
pub const GENESIS_PROOF: u64 = 42;

/// Previous-hash marker carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Block - an ordered batch of transactions chained to its predecessor by
/// hash and sealed with a proof-of-work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: usize,
    pub proof: u64,
    pub transactions: Vec<Transaction>,
    #[serde(rename = "previous_hash")]
    pub previous_block_hash: String,
    pub timestamp: f64,
}

impl Block {
    pub fn new(
        index: usize,
        proof: u64,
        transactions: Vec<Transaction>,
        previous_block_hash: String,
    ) -> Self {
        Self {
            index,
            proof,
            transactions,
            previous_block_hash,
            timestamp: unix_time(),
        }
    }

    /// The genesis block: hardcoded proof and previous hash, no transactions
    pub fn genesis() -> Self {
        Self::new(
            0,
            GENESIS_PROOF,
            Vec::new(),
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Hash of the block over its canonical encoding. Identical field
    /// values always hash identically, regardless of construction order.
    pub fn calculate_hash(&self) -> String {
        sha256_hex(&canonical_json(self))
    }

    /// Mining reward for the block at `index`: drops by 5 every 4 blocks,
    /// floored at zero, so the money supply converges.
    pub fn reward_at(index: usize) -> u64 {
        let cut = 5 * ((index as u64 + 1) / 4);
        50u64.saturating_sub(cut)
    }

    /// Mining reward for this block
    pub fn reward(&self) -> u64 {
        Self::reward_at(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_block_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = Block::genesis();
        assert_eq!(block.calculate_hash(), block.calculate_hash());
    }

    #[test]
    fn test_hash_survives_round_trip() {
        let block = Block::genesis();
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block.calculate_hash(), back.calculate_hash());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let block = Block::genesis();
        let mut other = block.clone();
        other.proof += 1;
        assert_ne!(block.calculate_hash(), other.calculate_hash());
    }

    #[test]
    fn test_reward_schedule() {
        assert_eq!(Block::reward_at(0), 50);
        assert_eq!(Block::reward_at(1), 50);
        assert_eq!(Block::reward_at(2), 50);
        assert_eq!(Block::reward_at(3), 45);
        assert_eq!(Block::reward_at(6), 45);
        assert_eq!(Block::reward_at(7), 40);

        // Steps down by 5 every 4 blocks
        for index in 0..50 {
            let diff = Block::reward_at(index) - Block::reward_at(index + 4);
            assert!(diff == 5 || Block::reward_at(index + 4) == 0);
        }

        // Emission eventually reaches zero and stays there
        assert_eq!(Block::reward_at(39), 0);
        assert_eq!(Block::reward_at(1_000), 0);
    }
}
