use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use xworld::{
    balance::BalanceService,
    config::{ClientConfig, GatewayConfig, Network, DEFAULT_MODULE_ADDRESS},
    driver::{run_demo, DemoPlan},
    gateway::{self, LedgerGateway, TransactionReceipt},
    identity::{Address, SigningIdentity},
    profile::{ActionQueryClient, ActionTransactionClient, ProfileModule, QueryResult},
};

#[derive(Parser)]
#[command(name = "xworld", version, about = "XWorld profile action lists on an Aptos ledger")]
struct Cli {
    #[command(flatten)]
    net: NetworkArgs,

    /// Repeat for more log output (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct NetworkArgs {
    #[arg(long, global = true, env = "XWORLD_NETWORK", value_enum, default_value_t = Network::Devnet)]
    network: Network,

    /// Address the `profile` module is published at.
    #[arg(long, global = true, env = "XWORLD_MODULE_ADDRESS", default_value = DEFAULT_MODULE_ADDRESS)]
    module_address: Address,

    /// Override the node REST endpoint of the selected network.
    #[arg(long, global = true, env = "XWORLD_NODE_URL")]
    node_url: Option<String>,

    /// Override the faucet endpoint of the selected network.
    #[arg(long, global = true, env = "XWORLD_FAUCET_URL")]
    faucet_url: Option<String>,

    /// Give up waiting for finality after this many seconds.
    #[arg(long, global = true, default_value_t = 60)]
    finality_timeout_secs: u64,
}

impl NetworkArgs {
    fn client_config(&self) -> ClientConfig {
        let mut gateway = GatewayConfig::new(self.network)
            .with_finality_timeout(Duration::from_secs(self.finality_timeout_secs));
        if let Some(url) = &self.node_url {
            gateway = gateway.with_node_url(url);
        }
        if let Some(url) = &self.faucet_url {
            gateway = gateway.with_faucet_url(url);
        }
        ClientConfig::new(gateway, self.module_address)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh Ed25519 identity.
    Keygen,
    /// Print the account address of a private key.
    Address {
        #[arg(long)]
        key: String,
    },
    /// Create a new action list for the key's account.
    CreateList {
        #[arg(long)]
        key: String,
    },
    /// Append an action to one of the key's action lists.
    Action {
        #[arg(long)]
        key: String,
        #[arg(long)]
        list: u64,
        #[arg(long)]
        kind: u64,
        #[arg(long)]
        message: String,
    },
    /// Number of action lists an address owns.
    Counter { address: Address },
    /// One action list of an address.
    List {
        address: Address,
        #[arg(long)]
        list: u64,
    },
    /// One action of one list.
    GetAction {
        address: Address,
        #[arg(long)]
        list: u64,
        #[arg(long)]
        action: u64,
    },
    /// Coin balance of an address (0 when it holds none).
    Balance { address: Address },
    /// Credit an address from the network faucet.
    Fund {
        address: Address,
        #[arg(long)]
        amount: u64,
    },
    /// Load two identities, create a list, record an action and read it back.
    Demo {
        /// Generated when omitted.
        #[arg(long)]
        alice_key: Option<String>,
        /// Generated when omitted.
        #[arg(long)]
        bob_key: Option<String>,
        /// Append to an existing list instead of creating one first.
        #[arg(long)]
        skip_create: bool,
        #[arg(long, default_value_t = 0)]
        list: u64,
        #[arg(long, default_value_t = 1)]
        kind: u64,
        #[arg(long, default_value = "download xworld APP")]
        message: String,
        /// Fund both identities from the faucet first.
        #[arg(long)]
        fund: Option<u64>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_identity(key: &str) -> Result<SigningIdentity> {
    SigningIdentity::from_private_key(key).context("invalid private key")
}

fn load_or_generate(name: &str, key: Option<&str>) -> Result<SigningIdentity> {
    match key {
        Some(key) => load_identity(key),
        None => {
            let identity = SigningIdentity::generate();
            tracing::info!(%name, address = %identity.address(), "generated identity");
            Ok(identity)
        }
    }
}

fn print_receipt(receipt: &TransactionReceipt) {
    println!("Transaction hash: {}", receipt.hash);
    println!(
        "  version {} gas {} ({})",
        receipt.version, receipt.gas_used, receipt.vm_status
    );
}

fn print_query<T: std::fmt::Debug>(label: &str, result: &QueryResult<T>) {
    match result {
        QueryResult::Found(value) => println!("{label}: {value:?}"),
        QueryResult::NotFound(diag) => println!("{label}: no data ({diag})"),
        QueryResult::Failed(diag) => println!("{label}: failed ({diag})"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.net.client_config();
    let module = ProfileModule::new(config.module_address);

    // commands that never touch the network
    match &cli.command {
        Command::Keygen => {
            let identity = SigningIdentity::generate();
            println!("private key: {}", identity.private_key_string());
            println!("public key:  {}", identity.public_key_hex());
            println!("address:     {}", identity.address());
            return Ok(());
        }
        Command::Address { key } => {
            println!("{}", load_identity(key)?.address());
            return Ok(());
        }
        _ => {}
    }

    let ledger: Box<dyn LedgerGateway> =
        gateway::connect(&config).context("connecting to the ledger")?;
    let gateway = &*ledger;

    match cli.command {
        Command::Keygen | Command::Address { .. } => {}
        Command::CreateList { key } => {
            let identity = load_identity(&key)?;
            let receipt = ActionTransactionClient::new(gateway, module)
                .create_action_list(&identity)
                .await?;
            print_receipt(&receipt);
        }
        Command::Action {
            key,
            list,
            kind,
            message,
        } => {
            let identity = load_identity(&key)?;
            let receipt = ActionTransactionClient::new(gateway, module)
                .record_action(list, kind, &message, &identity)
                .await?;
            print_receipt(&receipt);
        }
        Command::Counter { address } => {
            let result = ActionQueryClient::new(gateway, module)
                .get_action_list_counter(address)
                .await;
            print_query("get_action_list_counter", &result);
        }
        Command::List { address, list } => {
            let result = ActionQueryClient::new(gateway, module)
                .get_action_list(address, list)
                .await;
            print_query("get_action_list", &result);
        }
        Command::GetAction {
            address,
            list,
            action,
        } => {
            let result = ActionQueryClient::new(gateway, module)
                .get_action(address, list, action)
                .await;
            print_query("get_action", &result);
        }
        Command::Balance { address } => {
            let balance = BalanceService::new(gateway).get_balance(address).await;
            println!("{address}'s balance is: {balance}");
        }
        Command::Fund { address, amount } => {
            let balance = BalanceService::new(gateway).fund(address, amount).await?;
            println!("{address}'s balance is: {balance}");
        }
        Command::Demo {
            alice_key,
            bob_key,
            skip_create,
            list,
            kind,
            message,
            fund,
        } => {
            let alice = load_or_generate("alice", alice_key.as_deref())?;
            let bob = load_or_generate("bob", bob_key.as_deref())?;
            println!("Alice's address is: {}", alice.address());
            println!("Bob's address is: {}", bob.address());
            let plan = DemoPlan {
                create_list: !skip_create,
                list_index: list,
                kind,
                message,
                fund_amount: fund,
            };
            let report = run_demo(gateway, module, &alice, &bob, &plan).await?;
            if let Some(created) = &report.created {
                print_receipt(created);
            }
            print_receipt(&report.recorded);
            print_query("get_action_list_counter", &report.counter);
            match &report.action {
                Some(action) => print_query("get_action", action),
                None => println!("get_action: skipped, action count was unknown"),
            }
            println!("{}'s balance is: {}", report.alice.address, report.alice.balance);
            println!("{}'s balance is: {}", report.bob.address, report.bob.balance);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli).await
}
