// The block chain and its derived UTXO set

use crate::consensus::validation;
use crate::core::{Block, OutPoint};
use crate::ledger::UtxoSet;
use serde::{Deserialize, Serialize};

/// The chain of accepted blocks, index-contiguous from genesis, together
/// with the UTXO set derived from it. Both mutate only through
/// `append_block` and `replace`, so they can never drift apart.
#[derive(Debug, Clone)]
pub struct BlockChain {
    pub blocks: Vec<Block>,
    pub utxo_set: UtxoSet,
}

impl BlockChain {
    /// A new chain holding a bare genesis block
    pub fn new() -> Self {
        Self::seeded(Block::genesis())
    }

    /// A new chain seeded with the given genesis block (a mining node puts
    /// its first coinbase in here)
    pub fn seeded(genesis: Block) -> Self {
        let mut chain = Self {
            blocks: Vec::new(),
            utxo_set: UtxoSet::new(),
        };
        chain.append_block(genesis);
        chain
    }

    /// The most recently accepted block
    pub fn last_block(&self) -> &Block {
        self.blocks.last().expect("chain always holds genesis")
    }

    /// Number of blocks, genesis included
    pub fn size(&self) -> usize {
        self.blocks.len()
    }

    /// Walk backward from the tip checking every link; any invalid link
    /// rejects the chain as a whole.
    pub fn check_validity(&self) -> bool {
        validation::check_chain(self)
    }

    /// Append a block whose validity the caller has already established,
    /// and apply its UTXO effects: inputs consume entries, outputs create
    /// them, in transaction order.
    pub fn append_block(&mut self, block: Block) {
        let block_index = self.blocks.len();
        debug_assert_eq!(block.index, block_index);

        for (transaction_index, tx) in block.transactions.iter().enumerate() {
            for input in &tx.inputs {
                self.utxo_set.remove(&input.outpoint());
            }
            for (output_index, output) in tx.outputs.iter().enumerate() {
                self.utxo_set.insert(
                    OutPoint::new(block_index, transaction_index, output_index),
                    output.clone(),
                );
            }
        }

        self.blocks.push(block);
    }

    /// Wholesale replacement by a fully validated candidate. Partial
    /// adoption never happens; the old chain simply stops existing.
    pub fn replace(&mut self, other: BlockChain) {
        log::info!(
            "replacing chain of length {} with chain of length {}",
            self.size(),
            other.size()
        );
        *self = other;
    }

    /// Wire form of the chain
    pub fn to_wire(&self) -> ChainWire {
        ChainWire {
            length: self.size(),
            chain: self.blocks.clone(),
        }
    }

    /// Rebuild a chain from its wire form, re-deriving the UTXO set by
    /// replay. Structural defects are rejected here, at the boundary,
    /// before any validation runs.
    pub fn from_wire(wire: ChainWire) -> Result<BlockChain, String> {
        if wire.chain.is_empty() {
            return Err("chain has no genesis block".to_string());
        }

        let mut chain = BlockChain {
            blocks: Vec::with_capacity(wire.chain.len()),
            utxo_set: UtxoSet::new(),
        };
        for (expected, block) in wire.chain.into_iter().enumerate() {
            if block.index != expected {
                return Err(format!(
                    "block index {} out of order, expected {}",
                    block.index, expected
                ));
            }
            chain.append_block(block);
        }
        Ok(chain)
    }
}

impl Default for BlockChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire form of a chain: `{ length, chain }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainWire {
    pub length: usize,
    pub chain: Vec<Block>,
}
