// src/main.rs
//! Torus bridge command line.
//! `simulate` runs a full two-leg transfer against in-memory chains and prints
//! every session event; `config` prints the effective configuration.
use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use ethers::types::U256;
use std::path::PathBuf;
use torus_bridge::blockchain::bridge::mock::{
    simulated_providers, MockChain, MockLedger, RelayBehavior,
};
use torus_bridge::blockchain::bridge::{BridgeStepExecutor, Direction, SessionEvent, StepOutcome};
use torus_bridge::core::config::BridgeConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "torus-bridge")]
#[command(about = "Torus cross-chain bridge orchestrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Path to a TOML configuration file (falls back to BRIDGE_CONFIG_PATH)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full transfer against simulated chains
    Simulate(SimulateArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(ClapArgs)]
struct SimulateArgs {
    #[arg(long, value_enum)]
    direction: DirectionArg,
    /// Decimal TORUS amount, e.g. 10 or 0.5
    #[arg(long)]
    amount: String,
    /// Make the relay reject (as the user) or fail
    #[arg(long, value_enum)]
    fail_relay: Option<RelayFailure>,
    /// Never credit destination balances, so confirmation runs out of polls
    #[arg(long)]
    stall_balance: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    BaseToNative,
    NativeToBase,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::BaseToNative => Direction::BaseToNative,
            DirectionArg::NativeToBase => Direction::NativeToBase,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RelayFailure {
    Reject,
    Error,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    let config = load_config(args.config)?;

    match args.command {
        Commands::Config => {
            println!("{}", config.to_toml_string()?);
        }
        Commands::Simulate(simulate) => run_simulation(config, simulate).await?,
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// `--config`, then `BRIDGE_CONFIG_PATH`, then defaults.
fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig> {
    let path = path.or_else(|| std::env::var("BRIDGE_CONFIG_PATH").ok().map(PathBuf::from));
    match path {
        Some(path) if path.exists() => Ok(BridgeConfig::load(&path)?),
        Some(path) => {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(BridgeConfig::default())
        }
        None => Ok(BridgeConfig::default()),
    }
}

async fn run_simulation(config: BridgeConfig, args: SimulateArgs) -> Result<()> {
    let direction = Direction::from(args.direction);
    let starting_balance = U256::exp10(config.chains.decimals as usize) * U256::from(1_000u64);
    let ledger = MockLedger::new()
        .with_balance(MockChain::Base, starting_balance)
        .with_balance(MockChain::Native, starting_balance);
    if args.stall_balance {
        ledger.freeze();
    }

    let relay = match args.fail_relay {
        None => RelayBehavior::Deliver,
        Some(RelayFailure::Reject) => RelayBehavior::Reject,
        Some(RelayFailure::Error) => {
            RelayBehavior::Fail("execution reverted: relay unavailable".into())
        }
    };
    let wallet_chain = match direction {
        Direction::BaseToNative => config.chains.base_chain_id,
        Direction::NativeToBase => config.chains.torus_evm_chain_id,
    };

    let providers = simulated_providers(&ledger, relay, wallet_chain)?;
    let executor = BridgeStepExecutor::new(config, providers);

    let mut events = executor.session().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let line = match &event {
                SessionEvent::StateChanged(state) => serde_json::to_string(state),
                SessionEvent::RecordUpserted(record) => serde_json::to_string(record),
                SessionEvent::Reset => Ok("\"reset\"".to_string()),
            };
            match line {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Could not render session event: {}", e),
            }
        }
    });

    let result = executor.execute_transfer(direction, &args.amount).await;
    let state = executor.state();
    drop(executor);
    let _ = printer.await;

    for chain in [MockChain::Base, MockChain::TorusEvm, MockChain::Native] {
        info!("{:?} balance: {}", chain, ledger.balance(chain));
    }

    match result {
        Ok(StepOutcome::Completed) => info!("Transfer finished in {}", state.step),
        Ok(StepOutcome::Rejected) => {
            warn!("Transfer stopped: {}", state.error_message.unwrap_or_default())
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
