// Miner role: pending pool, coinbase issuance, proof search

use crate::consensus::pow::{self, DIFFICULTY};
use crate::consensus::validation;
use crate::core::{Block, OutPoint, Transaction};
use crate::node::{Node, SharedChain, SpendingNode};
use crate::wallet::Keypair;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

/// Snapshot of the chain tip a proof search runs against. If the tip
/// moves while the search is out, the job is stale and sealing refuses it.
#[derive(Debug, Clone)]
pub struct MiningJob {
    pub index: usize,
    pub prev_proof: u64,
    pub previous_hash: String,
    pub prev_timestamp: f64,
}

/// A mining participant: a node that pools validated transactions,
/// searches for proofs and appends the blocks it seals.
pub struct Miner {
    pub node: Node,
    utxos: HashMap<OutPoint, u64>,
    pending: Vec<Transaction>,
}

impl Miner {
    /// A fresh miner seeds its own chain: the genesis block carries the
    /// first coinbase, so there is value in circulation to spend.
    pub fn new(keys: Keypair) -> Self {
        let mut genesis = Block::genesis();
        let mut coinbase = Transaction::coinbase(keys.address(), Block::reward_at(0));
        keys.sign_transaction(&mut coinbase);
        genesis.transactions.push(coinbase);

        let chain = Arc::new(RwLock::new(crate::ledger::BlockChain::seeded(genesis)));
        Self::with_chain(keys, chain)
    }

    /// A miner joining an existing chain
    pub fn with_chain(keys: Keypair, chain: SharedChain) -> Self {
        let mut miner = Self {
            node: Node::with_chain(keys, chain),
            utxos: HashMap::new(),
            pending: Vec::new(),
        };
        miner.refresh_utxos();
        miner
    }

    /// Transactions waiting to be mined
    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Validate a submitted transaction against the current chain and, on
    /// success, admit it to the pending pool. Rejected transactions are
    /// dropped; resubmission is the sender's problem.
    pub fn add_transaction(&mut self, mut tx: Transaction) -> bool {
        if tx.is_coinbase() {
            log::debug!("transaction {}: coinbase submissions not accepted", tx.hash());
            return false;
        }
        if self.pending.contains(&tx) {
            log::debug!("transaction {}: already pending", tx.hash());
            return false;
        }

        let accepted = {
            let chain = self.node.chain.read().unwrap();
            validation::check_transaction(&mut tx, &chain, true)
        };
        if !accepted {
            log::warn!("transaction {} rejected", tx.hash());
            return false;
        }

        log::info!("transaction {} admitted to pending pool", tx.hash());
        self.pending.push(tx);
        true
    }

    /// Re-validate the pool against the current chain and snapshot the
    /// tip for a proof search. None if nothing (valid) is pending.
    pub fn prepare_job(&mut self) -> Option<MiningJob> {
        let chain = self.node.chain.read().unwrap();
        self.pending
            .retain_mut(|tx| validation::check_transaction(tx, &chain, true));
        if self.pending.is_empty() {
            return None;
        }

        let last = chain.last_block();
        Some(MiningJob {
            index: chain.size(),
            prev_proof: last.proof,
            previous_hash: last.calculate_hash(),
            prev_timestamp: last.timestamp,
        })
    }

    /// Assemble, validate and append the block a finished proof search
    /// earned. Returns None if the chain moved since the job was prepared;
    /// the stale proof is discarded and the pool kept for the next round.
    pub fn seal(&mut self, job: &MiningJob, proof: u64) -> Option<Block> {
        let mut chain = self.node.chain.write().unwrap();
        if chain.size() != job.index {
            log::info!(
                "discarding stale proof for height {}; chain is at {}",
                job.index,
                chain.size()
            );
            return None;
        }

        let fees: u64 = self.pending.iter().filter_map(|tx| tx.fee).sum();
        let coinbase_total = Block::reward_at(job.index) + fees;

        let mut transactions = Vec::with_capacity(self.pending.len() + 1);
        // The emission schedule eventually reaches zero; a feeless block
        // there carries no coinbase at all
        if coinbase_total > 0 {
            let mut coinbase = Transaction::coinbase(self.node.keys.address(), coinbase_total);
            self.node.keys.sign_transaction(&mut coinbase);
            transactions.push(coinbase);
        }
        let has_coinbase = !transactions.is_empty();
        transactions.append(&mut self.pending);

        let mut block = Block::new(job.index, proof, transactions, job.previous_hash.clone());
        if block.timestamp <= job.prev_timestamp {
            // The clock may not have advanced since the previous block
            block.timestamp = job.prev_timestamp + 1e-6;
        }

        if !validation::check_block(&block, chain.last_block()) {
            log::warn!("sealed block {} failed validation, discarding", block.index);
            self.pending = block
                .transactions
                .into_iter()
                .filter(|tx| !tx.is_coinbase())
                .collect();
            return None;
        }

        chain.append_block(block.clone());
        drop(chain);

        if has_coinbase {
            self.utxos
                .insert(OutPoint::new(job.index, 0, 0), coinbase_total);
        }

        log::info!(
            "mined block {} with {} transactions (coinbase {})",
            block.index,
            block.transactions.len(),
            coinbase_total
        );
        Some(block)
    }

    /// Mine the pending pool into a block. Blocking: the proof search
    /// runs to completion on this thread. None if nothing is pending.
    pub fn mine(&mut self) -> Option<Block> {
        let job = self.prepare_job()?;
        let proof = pow::find_proof(job.prev_proof, DIFFICULTY);
        self.seal(&job, proof)
    }

    /// Like `mine`, but the proof search polls `cancel` between attempts.
    /// None if cancelled, or if the tip moved while searching.
    pub fn mine_with_cancel(&mut self, cancel: &AtomicBool) -> Option<Block> {
        let job = self.prepare_job()?;
        let proof = pow::find_proof_cancellable(job.prev_proof, DIFFICULTY, cancel)?;
        self.seal(&job, proof)
    }

    /// The chain has been replaced wholesale: cached balances resolved
    /// against the old chain are void, and owned outputs must be
    /// re-derived from the adopted UTXO set.
    pub fn on_chain_replaced(&mut self) {
        for tx in &mut self.pending {
            tx.clear_caches();
        }
        self.refresh_utxos();
    }
}

impl SpendingNode for Miner {
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
