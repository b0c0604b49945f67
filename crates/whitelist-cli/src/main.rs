// ============================================================================
// xdcheck — whitelist verification from the command line
// ============================================================================
// Usage:
//   xdcheck verify <ADDRESS>      Probe, query with retries, fall back if needed
//   xdcheck fallback <ADDRESS>    Check the local whitelist only
//   xdcheck probe                 Check whether the whitelist service is up
//   xdcheck config                Print the effective configuration
// ============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use whitelist_core::{
    Address, ProbeOutcome, Source, VerificationOrchestrator, VerificationResult, VerifierConfig,
};

/// Whitelist verification tool
#[derive(Parser)]
#[command(name = "xdcheck", version, about = "Check whether an address is whitelisted")]
struct Cli {
    /// JSON config file (fields not given keep their defaults)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Override the whitelist service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an address against the remote whitelist (local list as fallback)
    Verify {
        /// Address to verify (case-insensitive)
        address: String,
    },

    /// Verify an address against the local whitelist only
    Fallback {
        /// Address to verify (case-insensitive)
        address: String,
    },

    /// Run the connectivity probe once
    Probe,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Verify { address } => cmd_verify(&config, &address, cli.json).await,
        Commands::Fallback { address } => cmd_fallback(&config, &address, cli.json).await,
        Commands::Probe => cmd_probe(&config, cli.json).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("whitelist_core={}", level).parse()?)
                .add_directive(format!("xdcheck={}", level).parse()?),
        )
        .init();
    Ok(())
}

/// Defaults, then config file, then environment, then flags
fn load_config(cli: &Cli) -> Result<VerifierConfig> {
    let mut config = match &cli.config {
        Some(path) => VerifierConfig::from_json_file(path)?,
        None => VerifierConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;

    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }

    config.validate()?;
    Ok(config)
}

fn apply_env(config: &mut VerifierConfig, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(base_url) = var("XDCHECK_BASE_URL") {
        config.base_url = base_url;
    }
    if let Some(list) = var("XDCHECK_FALLBACK_ADDRESSES") {
        config.fallback_addresses = list
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect();
        if config.fallback_addresses.is_empty() {
            warn!("XDCHECK_FALLBACK_ADDRESSES is set but empty - fallback will deny everything");
        }
    }
    if let Some(ms) = var("XDCHECK_PROBE_TIMEOUT_MS") {
        config.probe_timeout_ms = ms
            .parse()
            .with_context(|| format!("Invalid XDCHECK_PROBE_TIMEOUT_MS '{}'", ms))?;
    }
    if let Some(ms) = var("XDCHECK_QUERY_TIMEOUT_MS") {
        config.query_timeout_ms = ms
            .parse()
            .with_context(|| format!("Invalid XDCHECK_QUERY_TIMEOUT_MS '{}'", ms))?;
    }
    Ok(())
}

async fn cmd_verify(config: &VerifierConfig, address: &str, json: bool) -> Result<()> {
    let address = Address::parse(address)?;
    let orchestrator = VerificationOrchestrator::from_config(config)?;
    let result = orchestrator.verify(address).await;
    print_result(&result, json)
}

async fn cmd_fallback(config: &VerifierConfig, address: &str, json: bool) -> Result<()> {
    let address = Address::parse(address)?;
    let orchestrator = VerificationOrchestrator::from_config(config)?;
    let result = orchestrator.verify_fallback(address).await;
    print_result(&result, json)
}

async fn cmd_probe(config: &VerifierConfig, json: bool) -> Result<()> {
    let orchestrator = VerificationOrchestrator::from_config(config)?;
    let outcome = orchestrator.probe().await;

    if json {
        let value = match &outcome {
            ProbeOutcome::Healthy { body } => serde_json::json!({
                "healthy": true,
                "body": body,
            }),
            ProbeOutcome::Unhealthy(reason) => serde_json::json!({
                "healthy": false,
                "reason": reason,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match outcome {
        ProbeOutcome::Healthy { .. } => println!("API:     healthy ({})", config.base_url),
        ProbeOutcome::Unhealthy(reason) => {
            println!("API:     unavailable ({})", config.base_url);
            println!("Reason:  {}", reason);
        }
    }
    Ok(())
}

fn print_result(result: &VerificationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("=== Whitelist Verification ===");
    println!("Address:  {}", result.address);
    println!("Verdict:  {}", result.verdict().display_name());
    println!(
        "Source:   {}",
        match result.source {
            Source::Remote => "remote service",
            Source::Fallback => "local whitelist",
        }
    );
    println!("Attempts: {}", result.attempt + 1);
    if let Some(kind) = result.error_kind {
        println!();
        println!("Last error: {} - {}", kind, kind.user_message());
        if let Some(message) = &result.error_message {
            println!("Detail:     {}", message);
        }
    }
    println!("Checked:  {}", result.checked_at.format("%Y-%m-%d %H:%M:%S UTC"));

    Ok(())
}
