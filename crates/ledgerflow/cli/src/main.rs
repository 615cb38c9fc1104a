//! Ledgerflow CLI
//!
//! Runs the dependent transaction workflows against a JSON-RPC ledger
//! endpoint:
//! - `mpt`: issue a multi-purpose token, authorize a holder, send it units
//! - `escrow`: lock XRP behind a time and crypto condition, then release it
//! - `pay`: a single confirmed payment
//! - `amm`: a single-asset deposit into a token/XRP pool

use anyhow::Context;
use clap::{Parser, Subcommand};
use ledgerflow_adapters::{Endpoint, JsonRpcLedgerClient};
use ledgerflow_engine::{
    cancel_pair, CancelSignal, DependencyOrchestrator, EngineConfig, ErrorKind, FlowError,
    StageKind,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod render;

use commands::{AmmArgs, EscrowArgs, MptArgs, PayArgs, RetryOverrides};
use render::OutputFormat;

#[derive(Parser)]
#[command(name = "ledgerflow")]
#[command(about = "Submit and confirm dependent ledger transactions", long_about = None)]
#[command(version)]
struct Cli {
    /// Ledger endpoint: devnet, testnet, or an http(s) URL
    #[arg(short, long, env = "LEDGERFLOW_ENDPOINT", default_value = "devnet")]
    endpoint: String,

    /// Engine configuration file (JSON)
    #[arg(short, long, env = "LEDGERFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[command(flatten)]
    retry: RetryOverrides,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue an MPT, authorize the holder and transfer units to it
    Mpt(MptArgs),

    /// Create a conditional escrow and finish it once it matures
    Escrow(EscrowArgs),

    /// Send one payment and wait for validation
    Pay(PayArgs),

    /// Deposit an issued token into its AMM pool and wait for validation
    Amm(AmmArgs),
}

/// Process exit status for a failure class.
fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Rejection | ErrorKind::NotFound | ErrorKind::Timeout => 2,
        ErrorKind::Transport | ErrorKind::Observability => 3,
        ErrorKind::Configuration | ErrorKind::Precondition => 4,
        ErrorKind::Cancelled => 130,
    }
}

fn load_config(path: Option<&Path>, retry: &RetryOverrides) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    retry.apply(&mut config);
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "ledgerflow=debug,info"
    } else {
        "ledgerflow=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match load_config(cli.config.as_deref(), &cli.retry) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(exit_code(ErrorKind::Configuration));
        }
    };

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping at the next wait");
            handle.cancel();
        }
    });

    match run(cli, config, cancel).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(err.kind()))
        }
    }
}

/// Build the orchestrator and run the chosen workflow. Errors returned here
/// happen before any workflow starts.
async fn run(cli: Cli, config: EngineConfig, cancel: CancelSignal) -> Result<ExitCode, FlowError> {
    let endpoint: Endpoint = cli.endpoint.parse()?;
    let client = JsonRpcLedgerClient::new(&endpoint, Duration::from_secs(cli.timeout_secs))?;
    tracing::debug!(url = client.url(), "Using ledger endpoint");

    let format = cli.output;
    let orchestrator =
        DependencyOrchestrator::new(Arc::new(client), config)?.with_event_sink(format.sink());

    let halted = match cli.command {
        Commands::Mpt(args) => {
            let plan = args.plan()?;
            match orchestrator.run_mpt(&plan, &cancel).await {
                Ok(report) => {
                    render::print_report(&report, format);
                    return Ok(ExitCode::SUCCESS);
                }
                Err(halted) => halted,
            }
        }
        Commands::Escrow(args) => {
            let plan = args.plan()?;
            match orchestrator.run_escrow(&plan, &cancel).await {
                Ok(report) => {
                    render::print_report(&report, format);
                    return Ok(ExitCode::SUCCESS);
                }
                Err(halted) => halted,
            }
        }
        Commands::Pay(args) => {
            let (descriptor, sender) = args.payment()?;
            let result = orchestrator
                .run_single("payment", StageKind::Transfer, &descriptor, sender.as_ref(), &cancel)
                .await;
            match result {
                Ok(state) => {
                    render::print_state(&state, format);
                    return Ok(ExitCode::SUCCESS);
                }
                Err(halted) => halted,
            }
        }
        Commands::Amm(args) => {
            let (descriptor, depositor) = args.deposit()?;
            let result = orchestrator
                .run_single(
                    "amm-deposit",
                    StageKind::Deposit,
                    &descriptor,
                    depositor.as_ref(),
                    &cancel,
                )
                .await;
            match result {
                Ok(state) => {
                    render::print_state(&state, format);
                    return Ok(ExitCode::SUCCESS);
                }
                Err(halted) => halted,
            }
        }
    };

    render::print_halted(&halted, format);
    Ok(ExitCode::from(exit_code(halted.kind())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use ledgerflow_engine::SigningIdentity;

    const ISSUER: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";
    const HOLDER: &str = "rNB4HFHi7Cqoz9Uv8x6JzBrn4xLBKeQLTt";
    const SEED: &str = "sEdTM1uX8pu2do5XvTnutH6HsouMaM2";

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mpt_arguments_build_a_plan() {
        let cli = Cli::try_parse_from([
            "ledgerflow",
            "--endpoint",
            "testnet",
            "mpt",
            "--issuer-address",
            ISSUER,
            "--issuer-seed",
            SEED,
            "--holder-address",
            HOLDER,
            "--holder-seed",
            SEED,
            "--transfer-units",
            "250",
            "--ticker",
            "TST",
        ])
        .unwrap();
        assert_eq!(cli.endpoint.parse::<Endpoint>().unwrap(), Endpoint::Testnet);
        let Commands::Mpt(args) = cli.command else {
            panic!("expected the mpt command");
        };
        let plan = args.plan().unwrap();
        assert_eq!(plan.transfer_units, 250);
        assert_eq!(plan.params.metadata.as_ref().unwrap().ticker, "TST");
    }

    #[test]
    fn retry_overrides_are_global() {
        let cli = Cli::try_parse_from([
            "ledgerflow",
            "pay",
            "--sender-address",
            ISSUER,
            "--sender-seed",
            SEED,
            "--destination",
            HOLDER,
            "--amount",
            "2",
            "--confirm-attempts",
            "3",
            "--no-preflight",
        ])
        .unwrap();
        let config = load_config(None, &cli.retry).unwrap();
        assert_eq!(config.confirmation.max_attempts, 3);
        assert!(!config.preflight_accounts);
    }

    #[test]
    fn currency_without_issuer_is_refused_by_the_parser() {
        let parsed = Cli::try_parse_from([
            "ledgerflow",
            "pay",
            "--sender-address",
            ISSUER,
            "--sender-seed",
            SEED,
            "--destination",
            HOLDER,
            "--amount",
            "2",
            "--currency",
            "USD",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn amm_defaults_to_half_an_rlusd() {
        let cli = Cli::try_parse_from([
            "ledgerflow",
            "amm",
            "--depositor-address",
            ISSUER,
            "--depositor-seed",
            SEED,
            "--issuer",
            HOLDER,
        ])
        .unwrap();
        let Commands::Amm(args) = cli.command else {
            panic!("expected the amm command");
        };
        let (descriptor, depositor) = args.deposit().unwrap();
        assert_eq!(depositor.account().as_str(), ISSUER);
        assert_eq!(descriptor.to_tx_json()["Amount"]["value"], "0.5");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(
            Some(Path::new("/nonexistent/ledgerflow.json")),
            &RetryOverrides::default(),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("reading config"));
    }

    #[test]
    fn exit_codes_group_failure_classes() {
        assert_eq!(exit_code(ErrorKind::Rejection), 2);
        assert_eq!(exit_code(ErrorKind::Timeout), 2);
        assert_eq!(exit_code(ErrorKind::Transport), 3);
        assert_eq!(exit_code(ErrorKind::Precondition), 4);
        assert_eq!(exit_code(ErrorKind::Cancelled), 130);
    }
}
