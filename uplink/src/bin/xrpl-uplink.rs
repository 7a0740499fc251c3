use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use xrpl_uplink::{
    config::{ConfigParams, DEFAULT_XRP_SERVER},
    plumbing,
};

#[derive(Parser, Debug)]
#[clap(about)]
struct Cli {
    /// Path of the uplink configuration file.
    #[clap(long, short, default_value = "uplink.toml")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the uplink configuration, validating the XRP account first.
    Configure(ConfigureArgs),
    /// Report payment channels and balances.
    Info,
    /// Close selected payment channels and reclaim their unused funds.
    Cleanup,
    /// Deposit additional drops into the uplink balance.
    Topup {
        /// Amount to deposit, in drops.
        amount: u64,
    },
}

#[derive(Args, Debug)]
struct ConfigureArgs {
    /// BTP host of the parent connector. Omit it to configure interactively.
    #[clap(long)]
    parent: Option<String>,

    /// Name distinguishing this channel from your other uplinks.
    #[clap(long, default_value = "")]
    name: String,

    /// XRP secret (seed) of the funding account.
    #[clap(long)]
    secret: Option<String>,

    /// XRP address. Derived from the secret when omitted.
    #[clap(long)]
    address: Option<String>,

    /// rippled JSON-RPC endpoint.
    #[clap(long, default_value = DEFAULT_XRP_SERVER)]
    xrp_server: String,

    /// Acquire a funded test-ledger account instead of validating a real one.
    #[clap(long)]
    testnet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xrpl_uplink=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Configure(args) => {
            let params = args.parent.as_ref().map(|parent| ConfigParams {
                parent_host: parent.clone(),
                name: args.name.clone(),
                secret: args.secret.clone(),
                address: args.address.clone(),
                xrp_server: args.xrp_server.clone(),
                testnet: args.testnet,
            });
            plumbing::configure(&cli.config, params).await
        }
        Commands::Info => plumbing::info(&cli.config).await,
        Commands::Cleanup => plumbing::cleanup(&cli.config).await,
        Commands::Topup { amount } => plumbing::topup(&cli.config, amount).await,
    }
}
