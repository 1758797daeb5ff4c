// Outbound peer connections

use crate::ledger::ChainWire;
use crate::network::message::{Message, read_message, write_message};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// A connection to one peer
pub struct Peer {
    pub addr: SocketAddr,
    stream: TcpStream,
}

impl Peer {
    /// Connect to a peer
    pub async fn connect(addr: SocketAddr) -> Result<Self, String> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| format!("Failed to connect to {}: {}", addr, e))?;

        Ok(Self { addr, stream })
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), String> {
        write_message(&mut self.stream, message).await
    }

    pub async fn receive(&mut self) -> Result<Message, String> {
        read_message(&mut self.stream).await
    }

    /// Ask the peer how long its chain is
    pub async fn request_length(&mut self) -> Result<usize, String> {
        self.send(&Message::GetLength).await?;
        match self.receive().await? {
            Message::Length { length } => Ok(length),
            other => Err(format!("Expected length reply, got {}", other.kind())),
        }
    }

    /// Fetch the peer's full chain in wire form
    pub async fn request_chain(&mut self) -> Result<ChainWire, String> {
        self.send(&Message::GetChain).await?;
        match self.receive().await? {
            Message::Chain(wire) => Ok(wire),
            other => Err(format!("Expected chain reply, got {}", other.kind())),
        }
    }

    /// Announce our listening address; the peer replies with an Ack
    pub async fn register(&mut self, our_addr: SocketAddr) -> Result<(), String> {
        self.send(&Message::Register {
            address: our_addr.to_string(),
        })
        .await?;
        match self.receive().await? {
            Message::Ack => Ok(()),
            other => Err(format!("Expected ack, got {}", other.kind())),
        }
    }
}

/// Fire-and-forget delivery used by gossip: connect, send, drop. An
/// unreachable peer is logged, never an error - gossip is best effort.
pub async fn notify(addr: SocketAddr, message: &Message) {
    let result = async {
        let mut peer = Peer::connect(addr).await?;
        peer.send(message).await
    }
    .await;

    if let Err(e) = result {
        log::debug!("peer {} unreachable: {}", addr, e);
    }
}
