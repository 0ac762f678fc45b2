//! Degen CLI - Command-line interface for Degen USDC subscriptions
//!
//! Subscribe a Telegram username, renew it, and inspect subscriptions on the
//! Degen Solana subscription program.

#![forbid(unsafe_code)]

mod commands;
mod config;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::DegenCliConfig;
use degen_sdk::{
    ata::TokenProgram, load_keypair, parse_address, solana_sdk::signature::Keypair, RpcLedger,
    SubscriptionSession,
};
use tracing_subscriber::EnvFilter;
use utils::formatting::Report;

#[derive(Parser, Debug)]
#[command(
    name = "degen-cli",
    version,
    about = "Command-line interface for Degen USDC subscriptions",
    author = "Degen Team"
)]
struct Cli {
    /// RPC endpoint URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,

    /// Program ID of the subscription program
    #[arg(long)]
    program_id: Option<String>,

    /// USDC mint address (read from the program config when omitted)
    #[arg(long)]
    usdc_mint: Option<String>,

    /// Subscriber keypair file (defaults to the Solana CLI wallet)
    #[arg(long)]
    keypair: Option<String>,

    /// USDC mint is owned by the Token-2022 program
    #[arg(long)]
    token_2022: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the wallet's subscription, balance and authorization
    Status,

    /// Show the subscription fee for a Telegram username
    Fee {
        /// Telegram username, with or without the leading @
        #[arg(long)]
        identity: String,
    },

    /// Subscribe a Telegram username, approving USDC first if needed
    Subscribe {
        /// Telegram username, with or without the leading @
        #[arg(long)]
        identity: String,
    },

    /// Renew the wallet's subscription for its stored username
    Renew,

    /// Look up another account's subscription
    Lookup {
        /// Account address (base58 or 0x-prefixed hex)
        #[arg(long)]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DegenCliConfig::new();

    // Use configuration with CLI overrides
    let default_output_format = parse_output_format(&config.default_output_format)?;
    let output_format = cli.output.as_ref().unwrap_or(&default_output_format);

    let result = match build_session(&cli, &config) {
        Ok(mut session) => execute_command(&cli, &mut session, &config).await,
        Err(e) => Err(e),
    };

    // Handle output formatting
    match result {
        Ok(report) => match output_format {
            OutputFormat::Human => println!("{}", report.human),
            OutputFormat::Json => {
                let json_output = serde_json::json!({
                    "success": true,
                    "data": report.data
                });
                println!("{}", serde_json::to_string_pretty(&json_output)?);
            }
        },
        Err(e) => {
            match output_format {
                OutputFormat::Human => eprintln!("Error: {e}"),
                OutputFormat::Json => {
                    let json_output = serde_json::json!({
                        "success": false,
                        "error": e.to_string()
                    });
                    println!("{}", serde_json::to_string_pretty(&json_output)?);
                }
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Parse output format from string
fn parse_output_format(format_str: &str) -> Result<OutputFormat> {
    match format_str.to_lowercase().as_str() {
        "human" => Ok(OutputFormat::Human),
        "json" => Ok(OutputFormat::Json),
        _ => Err(anyhow::anyhow!("Invalid output format: {format_str}")),
    }
}

fn build_session(
    cli: &Cli,
    config: &DegenCliConfig,
) -> Result<SubscriptionSession<RpcLedger<Keypair>>> {
    let rpc_url = cli.rpc_url.as_deref().unwrap_or(&config.default_rpc_url);
    let keypair = load_keypair(cli.keypair.as_deref())?;

    let mut builder = RpcLedger::builder(rpc_url, keypair);
    if let Some(program_id) = &cli.program_id {
        builder = builder.program_id(parse_address(program_id).context("Invalid --program-id")?);
    }
    if let Some(usdc_mint) = &cli.usdc_mint {
        builder = builder.usdc_mint(parse_address(usdc_mint).context("Invalid --usdc-mint")?);
    }
    if cli.token_2022 {
        builder = builder.token_program(TokenProgram::Token2022);
    }

    Ok(SubscriptionSession::new(
        builder.build()?,
        config.session_config(),
    ))
}

async fn execute_command(
    cli: &Cli,
    session: &mut SubscriptionSession<RpcLedger<Keypair>>,
    config: &DegenCliConfig,
) -> Result<Report> {
    match &cli.command {
        Commands::Status => {
            let period_secs = session
                .ledger()
                .config()
                .await
                .ok()
                .map(|ledger_config| ledger_config.period_secs);
            commands::execute_status(session, period_secs, config).await
        }
        Commands::Fee { identity } => commands::execute_fee(session, identity, config).await,
        Commands::Subscribe { identity } => {
            commands::execute_subscribe(session, identity, config).await
        }
        Commands::Renew => commands::execute_renew(session).await,
        Commands::Lookup { address } => commands::execute_lookup(session, address, config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_format() {
        assert!(matches!(parse_output_format("JSON"), Ok(OutputFormat::Json)));
        assert!(matches!(parse_output_format("human"), Ok(OutputFormat::Human)));
        assert!(parse_output_format("yaml").is_err());
    }

    #[test]
    fn test_subscribe_arguments() {
        let cli = Cli::try_parse_from([
            "degen-cli",
            "--output",
            "json",
            "subscribe",
            "--identity",
            "@dave",
        ])
        .unwrap();
        assert!(matches!(cli.output, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Commands::Subscribe { ref identity } if identity == "@dave"));
    }
}
