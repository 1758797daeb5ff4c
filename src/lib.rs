// Minicoin - a single-node proof-of-work UTXO ledger

pub mod cli;
pub mod consensus;
pub mod core;
pub mod ledger;
pub mod network;
pub mod node;
pub mod wallet;

// Re-exports for convenience
pub use crate::core::{Address, Block, OutPoint, Transaction, TransactionInput, TransactionOutput};
pub use cli::{Cli, CliHandler};
pub use consensus::{DIFFICULTY, find_proof, verify_proof};
pub use ledger::{BlockChain, ChainWire, UtxoSet};
pub use network::{Message, NodeRole, Server};
pub use node::{Client, Miner, Node, SpendingNode};
pub use wallet::{Keypair, Keystore};
