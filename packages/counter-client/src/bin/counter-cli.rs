//! counter-cli - drive the devnet counter program from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use solana_sdk::pubkey::Pubkey;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use counter_client::{
    ClientConfig, CounterClient, KeypairWallet, ResilientRpc, WalletSigner, LAMPORTS_PER_SOL,
};

/// File that `init` appends new counter addresses to.
const COUNTER_ADDRESS_FILE: &str = "counter-address.txt";

#[derive(Debug, Parser)]
#[command(name = "counter-cli", about = "Initialize, increment and read devnet counters")]
struct Cli {
    /// Preferred RPC endpoint.
    #[arg(long, global = true, env = "COUNTER_RPC_URL")]
    rpc_url: Option<String>,

    /// Paying wallet keypair file.
    #[arg(long, global = true, env = "COUNTER_KEYPAIR")]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a counter, read it, increment it and read it again.
    Demo,
    /// Create a counter and record its address.
    Init,
    /// Increment an existing counter.
    Increment {
        #[arg(long)]
        counter: Pubkey,
    },
    /// Print the value of a counter.
    Read {
        #[arg(long)]
        counter: Pubkey,
    },
    /// Airdrop devnet SOL to the wallet.
    Airdrop {
        #[arg(long, default_value_t = LAMPORTS_PER_SOL)]
        lamports: u64,
    },
    /// Show the RPC endpoints and which one is in use.
    Endpoints,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env().context("Invalid configuration")?;
    if cli.rpc_url.is_some() {
        config.rpc_url = cli.rpc_url.clone();
    }
    if cli.keypair.is_some() {
        config.keypair_path = cli.keypair.clone();
    }
    info!("Program {}, websocket {}", config.program_id, config.ws_url);

    let (client, rpc) = config
        .counter_client()
        .context("Failed to build RPC client")?;
    rpc.health_check().await;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Command::Demo => {
            let wallet = load_wallet(&config)?;
            demo(&client, &wallet, &cancel).await
        }
        Command::Init => {
            let wallet = load_wallet(&config)?;
            init(&client, &wallet, &cancel).await
        }
        Command::Increment { counter } => {
            let wallet = load_wallet(&config)?;
            let receipt = client.increment(&wallet, &counter, &cancel).await?;
            println!("increment tx: {}", receipt.signature);
            println!("value: {}", client.read(&counter).await?);
            Ok(())
        }
        Command::Read { counter } => {
            println!("value: {}", client.read(&counter).await?);
            Ok(())
        }
        Command::Airdrop { lamports } => {
            let wallet = load_wallet(&config)?;
            let signature = client.airdrop(&wallet.pubkey(), lamports, &cancel).await?;
            println!("airdrop tx: {}", signature);
            Ok(())
        }
        Command::Endpoints => {
            print_endpoints(&rpc);
            Ok(())
        }
    }
}

fn load_wallet(config: &ClientConfig) -> Result<KeypairWallet> {
    let path = config.keypair_path();
    let wallet = KeypairWallet::from_file(&path)
        .with_context(|| format!("Failed to load wallet from {}", path.display()))?;
    info!("Wallet {}", wallet.pubkey());
    Ok(wallet)
}

async fn demo(
    client: &CounterClient,
    wallet: &KeypairWallet,
    cancel: &CancellationToken,
) -> Result<()> {
    let counter = client.initialize(wallet, cancel).await?;
    println!("initialize tx: {}", counter.receipt.signature);

    let value = client
        .read(&counter.address)
        .await
        .context("Counter account not readable after initialize")?;
    println!("After initialize: {}", value);

    let receipt = client.increment(wallet, &counter.address, cancel).await?;
    println!("increment tx: {}", receipt.signature);

    let value = client.read(&counter.address).await?;
    println!("After increment: {}", value);
    Ok(())
}

async fn init(
    client: &CounterClient,
    wallet: &KeypairWallet,
    cancel: &CancellationToken,
) -> Result<()> {
    let counter = client.initialize(wallet, cancel).await?;
    println!("Counter address: {}", counter.address);
    println!("initialize tx: {}", counter.receipt.signature);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(COUNTER_ADDRESS_FILE)
        .with_context(|| format!("Failed to open {}", COUNTER_ADDRESS_FILE))?;
    writeln!(file, "{}", counter.address)?;

    println!("value: {}", client.read(&counter.address).await?);
    Ok(())
}

fn print_endpoints(rpc: &Arc<ResilientRpc>) {
    let status = rpc.endpoint_status();
    let current = rpc.current_endpoint();
    println!("{} endpoints, {} failed", status.total, status.failed);
    println!("current: {} ({})", current.name, current.url);
}
