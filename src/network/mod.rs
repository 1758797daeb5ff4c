// Peer networking

pub mod message;
pub mod peer;
pub mod server;

pub use message::Message;
pub use peer::Peer;
pub use server::{NodeRole, Server, adopt_if_better};
