// Client role: holds funds and submits transactions, never mines

use crate::core::{Block, OutPoint, Transaction};
use crate::node::{Node, SharedChain, SpendingNode};
use crate::wallet::Keypair;
use std::collections::HashMap;

/// A non-mining participant. It keeps a chain view for balance queries,
/// lightly inspects gossip before echoing it, and catches up by chain
/// synchronization rather than by inserting blocks itself.
pub struct Client {
    pub node: Node,
    utxos: HashMap<OutPoint, u64>,
}

impl Client {
    pub fn new(keys: Keypair) -> Self {
        Self {
            node: Node::new(keys),
            utxos: HashMap::new(),
        }
    }

    pub fn with_chain(keys: Keypair, chain: SharedChain) -> Self {
        let mut client = Self {
            node: Node::with_chain(keys, chain),
            utxos: HashMap::new(),
        };
        client.refresh_utxos();
        client
    }

    /// Light structural inspection of a relayed block: worth echoing iff
    /// it is not obviously garbage. Full validation is the miners' job.
    pub fn inspect_block(&self, block: &Block) -> bool {
        if block.transactions.is_empty() && block.index != 0 {
            log::debug!("block {}: empty, not relaying", block.index);
            return false;
        }
        true
    }

    /// Light structural inspection of a relayed transaction
    pub fn inspect_transaction(&self, tx: &Transaction) -> bool {
        if tx.signature.is_none() {
            log::debug!("transaction {}: unsigned, not relaying", tx.hash());
            return false;
        }
        if tx.outputs.is_empty() {
            log::debug!("transaction {}: no outputs, not relaying", tx.hash());
            return false;
        }
        true
    }
}

impl SpendingNode for Client {
    fn node(&self) -> &Node {
        &self.node
    }

    fn owned_utxos(&self) -> &HashMap<OutPoint, u64> {
        &self.utxos
    }

    fn owned_utxos_mut(&mut self) -> &mut HashMap<OutPoint, u64> {
        &mut self.utxos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Address, TransactionOutput};
    use std::sync::{Arc, RwLock};

    #[test]
    fn test_client_starts_broke() {
        let mut client = Client::new(Keypair::generate());
        assert_eq!(client.balance(), 0);
        assert!(client.send_coins(&[(Address("02bb".to_string()), 1)], 0).is_err());
    }

    #[test]
    fn test_refresh_picks_up_owned_outputs() {
        let keys = Keypair::generate();
        let chain = Arc::new(RwLock::new(crate::ledger::BlockChain::new()));
        {
            let mut chain = chain.write().unwrap();
            chain
                .utxo_set
                .insert(OutPoint::new(0, 0, 0), TransactionOutput::new(keys.address(), 50));
        }

        let client = Client::with_chain(keys, chain);
        assert_eq!(client.balance(), 50);
    }

    #[test]
    fn test_inspect_block() {
        let client = Client::new(Keypair::generate());

        let genesis = Block::genesis();
        assert!(client.inspect_block(&genesis));

        let empty = Block::new(3, 0, vec![], "h".to_string());
        assert!(!client.inspect_block(&empty));
    }

    #[test]
    fn test_inspect_transaction() {
        let keys = Keypair::generate();
        let client = Client::new(Keypair::generate());

        let mut tx = Transaction::coinbase(keys.address(), 50);
        assert!(!client.inspect_transaction(&tx));

        keys.sign_transaction(&mut tx);
        assert!(client.inspect_transaction(&tx));
    }
}
