// Wire protocol messages
//
// Frames are a u32 little-endian length followed by the JSON encoding of
// one tagged message. The payloads reuse the ledger's own wire forms, so
// what travels between peers is exactly what gets hashed locally.

use crate::core::{Block, Transaction};
use crate::ledger::ChainWire;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Refuse frames beyond this size; a peer sending one is broken or hostile
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Protocol messages exchanged between peers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Ask a peer for its chain length
    GetLength,
    Length { length: usize },
    /// Ask a peer for its full chain
    GetChain,
    Chain(ChainWire),
    /// Gossip: a block the sender accepted
    Block(Block),
    /// Gossip: a transaction looking for a miner
    Transaction(Transaction),
    /// Announce our listening address to a peer
    Register { address: String },
    Ack,
}

impl Message {
    /// Short name for logging; avoids dumping whole chains into logs
    pub fn kind(&self) -> &'static str {
        match self {
            Message::GetLength => "get_length",
            Message::Length { .. } => "length",
            Message::GetChain => "get_chain",
            Message::Chain(_) => "chain",
            Message::Block(_) => "block",
            Message::Transaction(_) => "transaction",
            Message::Register { .. } => "register",
            Message::Ack => "ack",
        }
    }
}

/// Write one message as a length-prefixed JSON frame
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), String> {
    let payload =
        serde_json::to_vec(message).map_err(|e| format!("Failed to encode message: {}", e))?;

    writer
        .write_all(&(payload.len() as u32).to_le_bytes())
        .await
        .map_err(|e| format!("Failed to send frame header: {}", e))?;

    writer
        .write_all(&payload)
        .await
        .map_err(|e| format!("Failed to send frame: {}", e))?;

    writer
        .flush()
        .await
        .map_err(|e| format!("Failed to flush: {}", e))?;

    Ok(())
}

/// Read one length-prefixed JSON frame
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, String> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .await
        .map_err(|e| format!("Failed to read frame header: {}", e))?;

    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_BYTES {
        return Err(format!("Frame of {} bytes exceeds limit", len));
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| format!("Failed to read frame payload: {}", e))?;

    serde_json::from_slice(&payload).map_err(|e| format!("Malformed message: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Address;
    use crate::ledger::BlockChain;

    fn round_trip(message: &Message) -> Message {
        let json = serde_json::to_vec(message).unwrap();
        serde_json::from_slice(&json).unwrap()
    }

    #[test]
    fn test_query_messages_round_trip() {
        assert!(matches!(round_trip(&Message::GetLength), Message::GetLength));
        assert!(matches!(round_trip(&Message::GetChain), Message::GetChain));
        assert!(matches!(round_trip(&Message::Ack), Message::Ack));

        match round_trip(&Message::Length { length: 42 }) {
            Message::Length { length } => assert_eq!(length, 42),
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_chain_message_round_trip() {
        let chain = BlockChain::new();
        match round_trip(&Message::Chain(chain.to_wire())) {
            Message::Chain(wire) => {
                assert_eq!(wire.length, 1);
                let back = BlockChain::from_wire(wire).unwrap();
                assert_eq!(
                    back.last_block().calculate_hash(),
                    chain.last_block().calculate_hash()
                );
            }
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_transaction_message_round_trip() {
        let tx = Transaction::coinbase(Address("02aa".to_string()), 50);
        match round_trip(&Message::Transaction(tx.clone())) {
            Message::Transaction(back) => assert_eq!(back, tx),
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let result: Result<Message, _> = serde_json::from_slice(b"{\"type\":\"nonsense\"}");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_framing_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);

        let sent = Message::Length { length: 7 };
        write_message(&mut client, &sent).await.unwrap();

        match read_message(&mut server).await.unwrap() {
            Message::Length { length } => assert_eq!(length, 7),
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_framing_carries_blocks() {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);

        let block = crate::core::Block::genesis();
        write_message(&mut client, &Message::Block(block.clone()))
            .await
            .unwrap();

        match read_message(&mut server).await.unwrap() {
            Message::Block(back) => assert_eq!(back.calculate_hash(), block.calculate_hash()),
            other => panic!("wrong variant: {}", other.kind()),
        }
    }
}
