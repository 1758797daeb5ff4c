// Wallet: identity keys, on-disk storage, transaction building

pub mod keys;
mod keystore;
mod tx_builder;

pub use keys::Keypair;
pub use keystore::Keystore;
pub use tx_builder::TransactionBuilder;
