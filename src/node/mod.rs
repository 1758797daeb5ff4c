// Node roles
//
// A node is an identity plus a shared chain handle plus a peer set. The
// two roles - Client and Miner - compose that state instead of extending
// each other; the spending capability they share lives in the
// `SpendingNode` trait.

mod client;
mod miner;

pub use client::Client;
pub use miner::{Miner, MiningJob};

use crate::core::{Address, OutPoint, Transaction};
use crate::ledger::BlockChain;
use crate::wallet::{Keypair, TransactionBuilder};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

/// Chain handle shared between the serving side and the mining side.
/// All chain and UTXO mutation happens under this one lock.
pub type SharedChain = Arc<RwLock<BlockChain>>;

/// Peer set shared with the network layer
pub type SharedPeers = Arc<RwLock<HashSet<SocketAddr>>>;

/// Common node state: an identity, the shared chain, known peers
pub struct Node {
    pub keys: Keypair,
    pub chain: SharedChain,
    pub peers: SharedPeers,
}

impl Node {
    /// A node starting from a bare genesis chain
    pub fn new(keys: Keypair) -> Self {
        Self::with_chain(keys, Arc::new(RwLock::new(BlockChain::new())))
    }

    pub fn with_chain(keys: Keypair, chain: SharedChain) -> Self {
        Self {
            keys,
            chain,
            peers: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// The node's ledger identity
    pub fn address(&self) -> Address {
        self.keys.address()
    }

    /// Record a peer; returns false if it was already known
    pub fn register_peer(&self, addr: SocketAddr) -> bool {
        self.peers.write().unwrap().insert(addr)
    }
}

/// Spending capability: any role that tracks outputs it owns and can sign
/// transactions against them.
pub trait SpendingNode {
    fn node(&self) -> &Node;
    fn owned_utxos(&self) -> &HashMap<OutPoint, u64>;
    fn owned_utxos_mut(&mut self) -> &mut HashMap<OutPoint, u64>;

    /// Total balance currently spendable by this node
    fn balance(&self) -> u64 {
        self.owned_utxos().values().sum()
    }

    /// Re-derive owned outputs from the chain's UTXO set. Run after the
    /// chain has been replaced, or to pick up outputs mined by others.
    fn refresh_utxos(&mut self) {
        let address = self.node().address();
        let outputs = self
            .node()
            .chain
            .read()
            .unwrap()
            .utxo_set
            .outputs_for(&address);

        let owned = self.owned_utxos_mut();
        owned.clear();
        owned.extend(outputs);
    }

    /// Build and sign a transaction paying `recipients` plus `fee` out of
    /// owned outputs, selected smallest-balance-first. The selected
    /// outputs leave the local set immediately; `refresh_utxos` restores
    /// them if the transaction never lands.
    fn send_coins(
        &mut self,
        recipients: &[(Address, u64)],
        fee: u64,
    ) -> Result<Transaction, String> {
        let tx = TransactionBuilder::new(&self.node().keys).build(self.owned_utxos(), recipients, fee)?;

        let owned = self.owned_utxos_mut();
        for input in &tx.inputs {
            owned.remove(&input.outpoint());
        }

        log::info!(
            "built transaction {} spending {} inputs",
            tx.hash(),
            tx.inputs.len()
        );
        Ok(tx)
    }
}
