// Node server: serves chain data, relays gossip, keeps the chain
// convergent with its peers
//
// Lock discipline (one per node): the shared chain RwLock covers chain and
// UTXO mutation together, the role mutex covers pool and owned-output
// state. Neither is ever held across an await; proof searches run on
// blocking threads with no lock at all.

use crate::consensus::pow::{DIFFICULTY, find_proof_cancellable};
use crate::consensus::validation;
use crate::core::{Block, Transaction};
use crate::ledger::BlockChain;
use crate::network::message::{Message, read_message, write_message};
use crate::network::peer::{self, Peer};
use crate::node::{Client, Miner, SharedChain, SharedPeers, SpendingNode};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// The capabilities this process runs with
pub enum NodeRole {
    Client(Client),
    Miner(Miner),
}

impl NodeRole {
    fn chain(&self) -> SharedChain {
        match self {
            NodeRole::Client(client) => Arc::clone(&client.node.chain),
            NodeRole::Miner(miner) => Arc::clone(&miner.node.chain),
        }
    }

    fn peers(&self) -> SharedPeers {
        match self {
            NodeRole::Client(client) => Arc::clone(&client.node.peers),
            NodeRole::Miner(miner) => Arc::clone(&miner.node.peers),
        }
    }
}

/// One node's serving side
pub struct Server {
    role: Mutex<NodeRole>,
    chain: SharedChain,
    peers: SharedPeers,
    listen_addr: SocketAddr,
    /// Cancellation flag of the in-flight proof search, if any
    mining_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl Server {
    pub fn new(role: NodeRole, listen_addr: SocketAddr) -> Arc<Self> {
        let chain = role.chain();
        let peers = role.peers();
        Arc::new(Self {
            role: Mutex::new(role),
            chain,
            peers,
            listen_addr,
            mining_cancel: Mutex::new(None),
        })
    }

    /// Accept connections forever
    pub async fn run(self: Arc<Self>) -> Result<(), String> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| format!("Failed to bind {}: {}", self.listen_addr, e))?;

        log::info!("node listening on {}", self.listen_addr);

        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .map_err(|e| format!("Failed to accept connection: {}", e))?;

            log::debug!("connection from {}", addr);

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                server.handle_connection(stream).await;
            });
        }
    }

    /// Serve one connection until the peer hangs up or talks garbage
    async fn handle_connection(&self, mut stream: TcpStream) {
        loop {
            let message = match read_message(&mut stream).await {
                Ok(message) => message,
                Err(e) => {
                    log::debug!("connection ended: {}", e);
                    return;
                }
            };

            if let Some(reply) = self.dispatch(message).await {
                if let Err(e) = write_message(&mut stream, &reply).await {
                    log::debug!("failed to reply: {}", e);
                    return;
                }
            }
        }
    }

    /// Handle one message, producing a reply where the protocol has one
    async fn dispatch(&self, message: Message) -> Option<Message> {
        match message {
            Message::GetLength => {
                let length = self.chain.read().unwrap().size();
                Some(Message::Length { length })
            }
            Message::GetChain => {
                let wire = self.chain.read().unwrap().to_wire();
                Some(Message::Chain(wire))
            }
            Message::Register { address } => {
                let addr: SocketAddr = match address.parse() {
                    Ok(addr) => addr,
                    Err(e) => {
                        log::debug!("register with bad address '{}': {}", address, e);
                        return None;
                    }
                };
                if self.peers.write().unwrap().insert(addr) {
                    log::info!("registered peer {}", addr);
                    // A new peer may know a longer chain than ours
                    self.synchronize().await;
                }
                Some(Message::Ack)
            }
            Message::Block(block) => {
                self.handle_block(block).await;
                None
            }
            Message::Transaction(tx) => {
                self.handle_transaction(tx).await;
                None
            }
            other => {
                log::debug!("ignoring unexpected {} message", other.kind());
                None
            }
        }
    }

    /// A block arrived from a peer: miners validate and extend, clients
    /// inspect and echo, everyone re-gossips what it accepted and chases
    /// chains it has fallen behind of.
    async fn handle_block(&self, block: Block) {
        let mut relay = false;
        let mut behind = false;

        {
            let mut role = self.role.lock().unwrap();
            match &mut *role {
                NodeRole::Miner(miner) => {
                    let mut chain = self.chain.write().unwrap();
                    let next_index = chain.size();

                    if block.index == next_index
                        && validation::check_block(&block, chain.last_block())
                    {
                        // A proof for this height is now worthless
                        self.cancel_mining();
                        chain.append_block(block.clone());
                        drop(chain);

                        log::info!("accepted block {} from peer", block.index);
                        miner.refresh_utxos();
                        relay = true;
                    } else if block.index > next_index {
                        log::info!(
                            "peer is at block {}, we are at {}; synchronizing",
                            block.index,
                            next_index.saturating_sub(1)
                        );
                        behind = true;
                    } else {
                        log::debug!("block {} rejected or already known", block.index);
                    }
                }
                NodeRole::Client(client) => {
                    let tip = self.chain.read().unwrap().size();
                    relay = client.inspect_block(&block);
                    behind = block.index >= tip;
                }
            }
        }

        if relay {
            self.broadcast(Message::Block(block)).await;
        }
        if behind {
            self.synchronize().await;
        }
    }

    /// A transaction arrived from a peer: miners pool it, clients echo it
    async fn handle_transaction(&self, tx: Transaction) {
        let relay = {
            let mut role = self.role.lock().unwrap();
            match &mut *role {
                NodeRole::Miner(miner) => miner.add_transaction(tx.clone()),
                NodeRole::Client(client) => client.inspect_transaction(&tx),
            }
        };

        if relay {
            self.broadcast(Message::Transaction(tx)).await;
        }
    }

    /// Gossip a message to every known peer, best effort
    pub async fn broadcast(&self, message: Message) {
        let peers: Vec<SocketAddr> = self.peers.read().unwrap().iter().copied().collect();
        log::debug!("broadcasting {} to {} peers", message.kind(), peers.len());
        for addr in peers {
            peer::notify(addr, &message).await;
        }
    }

    /// Register with a peer at startup and pull its chain if it is ahead
    pub async fn register_with(&self, addr: SocketAddr) {
        self.peers.write().unwrap().insert(addr);

        match Peer::connect(addr).await {
            Ok(mut peer) => {
                if let Err(e) = peer.register(self.listen_addr).await {
                    log::warn!("registration with {} failed: {}", addr, e);
                }
            }
            Err(e) => log::warn!("peer {} unreachable: {}", addr, e),
        }

        self.synchronize().await;
    }

    /// Longest-valid-chain reconciliation: ask every peer for its length,
    /// fetch the longest remote chain, and adopt it only if it is both
    /// strictly longer than ours and fully valid. A missing or erroring
    /// peer response simply means no better chain from that peer.
    pub async fn synchronize(&self) {
        let peers: Vec<SocketAddr> = self.peers.read().unwrap().iter().copied().collect();
        let our_length = self.chain.read().unwrap().size();

        let mut best: Option<(usize, SocketAddr)> = None;
        for addr in peers {
            let length = match Peer::connect(addr).await {
                Ok(mut peer) => match peer.request_length().await {
                    Ok(length) => length,
                    Err(e) => {
                        log::debug!("length query to {} failed: {}", addr, e);
                        continue;
                    }
                },
                Err(e) => {
                    log::debug!("peer {} unreachable: {}", addr, e);
                    continue;
                }
            };
            if length > our_length && best.map_or(true, |(best_len, _)| length > best_len) {
                best = Some((length, addr));
            }
        }

        let Some((length, addr)) = best else {
            log::debug!("no peer has a longer chain than {}", our_length);
            return;
        };
        log::info!("peer {} reports length {}, fetching chain", addr, length);

        let wire = match Peer::connect(addr).await {
            Ok(mut peer) => match peer.request_chain().await {
                Ok(wire) => wire,
                Err(e) => {
                    log::warn!("chain fetch from {} failed: {}", addr, e);
                    return;
                }
            },
            Err(e) => {
                log::warn!("peer {} unreachable: {}", addr, e);
                return;
            }
        };

        let candidate = match BlockChain::from_wire(wire) {
            Ok(chain) => chain,
            Err(e) => {
                log::warn!("peer {} sent a malformed chain: {}", addr, e);
                return;
            }
        };

        if adopt_if_better(&self.chain, candidate) {
            log::info!("adopted chain from {}", addr);
            self.cancel_mining();

            let mut role = self.role.lock().unwrap();
            match &mut *role {
                NodeRole::Miner(miner) => miner.on_chain_replaced(),
                NodeRole::Client(client) => client.refresh_utxos(),
            }
        } else {
            log::info!("keeping our chain over {}'s", addr);
        }
    }

    /// Abort the in-flight proof search, if one is out
    fn cancel_mining(&self) {
        if let Some(flag) = self.mining_cancel.lock().unwrap().take() {
            flag.store(true, Ordering::Relaxed);
            log::info!("cancelled in-flight proof search");
        }
    }

    /// Background mining: whenever the pool holds work, run the proof
    /// search on a blocking thread (never under a lock) and seal + gossip
    /// the result. A valid competing block cancels the search mid-flight.
    pub async fn mining_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(Duration::from_millis(250)).await;

            let job = {
                let mut role = self.role.lock().unwrap();
                match &mut *role {
                    NodeRole::Miner(miner) => miner.prepare_job(),
                    NodeRole::Client(_) => return,
                }
            };
            let Some(job) = job else { continue };

            let cancel = Arc::new(AtomicBool::new(false));
            *self.mining_cancel.lock().unwrap() = Some(Arc::clone(&cancel));

            let prev_proof = job.prev_proof;
            let search = tokio::task::spawn_blocking(move || {
                find_proof_cancellable(prev_proof, DIFFICULTY, &cancel)
            });
            let proof = match search.await {
                Ok(proof) => proof,
                Err(e) => {
                    log::error!("proof search task failed: {}", e);
                    None
                }
            };
            self.mining_cancel.lock().unwrap().take();

            let Some(proof) = proof else { continue };

            let block = {
                let mut role = self.role.lock().unwrap();
                match &mut *role {
                    NodeRole::Miner(miner) => miner.seal(&job, proof),
                    NodeRole::Client(_) => return,
                }
            };

            if let Some(block) = block {
                self.broadcast(Message::Block(block)).await;
            }
        }
    }
}

/// Swap the local chain for `candidate` iff it is strictly longer and
/// passes full validation. Never adopts a shorter or invalid chain, even
/// when asked to.
pub fn adopt_if_better(chain: &SharedChain, candidate: BlockChain) -> bool {
    if !candidate.check_validity() {
        log::warn!("candidate chain failed validation; keeping ours");
        return false;
    }

    let mut chain = chain.write().unwrap();
    if candidate.size() <= chain.size() {
        log::debug!(
            "candidate length {} does not beat ours ({})",
            candidate.size(),
            chain.size()
        );
        return false;
    }
    chain.replace(candidate);
    true
}
