// Minicoin node - CLI entry point

use clap::Parser;
use minicoin::{Cli, CliHandler};

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let mut handler = match CliHandler::new(&cli.data_dir) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!("Error initializing: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = handler.handle(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
