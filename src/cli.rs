// CLI commands

use crate::network::server::{NodeRole, Server};
use crate::node::{Client, Miner, SpendingNode};
use crate::wallet::Keystore;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "minicoin")]
#[command(about = "Proof-of-work UTXO ledger node", long_about = None)]
pub struct Cli {
    /// Data directory for wallet keys
    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Wallet commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Run a node
    Run {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:7401")]
        listen: SocketAddr,

        /// Peers to register with at startup (repeatable)
        #[arg(long = "peer")]
        peers: Vec<SocketAddr>,

        /// Run as a miner instead of a plain client
        #[arg(long)]
        mine: bool,

        /// Name of the key to run under
        #[arg(long, default_value = "default")]
        key: String,
    },

    /// Single-process walkthrough: mine blocks, move coins, print the chain
    Demo,
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new named key
    New { name: String },

    /// List stored keys
    List,
}

/// CLI handler
pub struct CliHandler {
    keystore: Keystore,
}

impl CliHandler {
    pub fn new(data_dir: &str) -> Result<Self, String> {
        let keystore = Keystore::open(format!("{}/wallets", data_dir))?;
        Ok(Self { keystore })
    }

    pub async fn handle(&mut self, cli: Cli) -> Result<(), String> {
        match cli.command {
            Commands::Wallet(cmd) => self.handle_wallet(cmd),
            Commands::Run {
                listen,
                peers,
                mine,
                key,
            } => self.run_node(listen, peers, mine, &key).await,
            Commands::Demo => self.demo(),
        }
    }

    fn handle_wallet(&mut self, cmd: WalletCommands) -> Result<(), String> {
        match cmd {
            WalletCommands::New { name } => {
                let keys = self.keystore.create(&name)?;
                println!("New key '{}'", name);
                println!("  Address: {}", keys.address());
                Ok(())
            }
            WalletCommands::List => {
                let names = self.keystore.list()?;
                println!("Keys ({}):", names.len());
                for name in names {
                    let address = self.keystore.load(&name)?.address();
                    println!("  {} {}", name, address);
                }
                Ok(())
            }
        }
    }

    async fn run_node(
        &mut self,
        listen: SocketAddr,
        peers: Vec<SocketAddr>,
        mine: bool,
        key: &str,
    ) -> Result<(), String> {
        let keys = self.keystore.load_or_create(key)?;
        log::info!("running as {}", keys.address());

        let role = if mine {
            NodeRole::Miner(Miner::new(keys))
        } else {
            NodeRole::Client(Client::new(keys))
        };

        let server = Server::new(role, listen);

        for addr in peers {
            server.register_with(addr).await;
        }

        if mine {
            tokio::spawn(Server::mining_loop(server.clone()));
        }

        server.run().await
    }

    /// End-to-end walkthrough on a single in-process chain
    fn demo(&self) -> Result<(), String> {
        let mut miner = Miner::new(crate::wallet::Keypair::generate());
        let alice = crate::wallet::Keypair::generate();

        println!("Miner:  {}", miner.node.address());
        println!("Alice:  {}", alice.address());
        println!();
        println!("Genesis seeded; miner balance: {}", miner.balance());

        // Pay alice out of the genesis coinbase, with a 5-coin fee
        let tx = miner.send_coins(&[(alice.address(), 10)], 5)?;
        if !miner.add_transaction(tx) {
            return Err("Transaction rejected".to_string());
        }
        let block = miner.mine().ok_or("Mining produced no block")?;
        println!(
            "Mined block {} (proof {}, {} transactions)",
            block.index,
            block.proof,
            block.transactions.len()
        );

        miner.refresh_utxos();
        println!("Miner balance after block 1: {}", miner.balance());

        let chain = miner.node.chain.read().unwrap();
        println!();
        println!("Chain length: {}", chain.size());
        println!("Chain valid:  {}", chain.check_validity());
        println!(
            "Alice's balance on chain: {}",
            chain.utxo_set.balance_of(&alice.address())
        );
        Ok(())
    }
}
