//! `rosgov` CLI entry point.
//!
//! Provides `mode`, `check`, `scan`, `redact` and `guard` subcommands for
//! inspecting the governance posture and running PHI checks on text from a
//! file or stdin.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;

use ros_governance::capability::{CapabilityGate, DataAdmissibility};
use ros_governance::config::RuntimeConfig;
use ros_governance::guard::Guard;
use ros_governance::logging;
use ros_governance::phi::{redact, scan_text, Tier};

/// Exit code for a denied capability check.
const EXIT_DENIED: u8 = 1;

/// Exit code for guarded text that was blocked.
const EXIT_BLOCKED: u8 = 2;

/// Governance mode and PHI safety checks.
#[derive(Parser)]
#[command(name = "rosgov", version, about)]
struct Cli {
    /// Also write JSON logs to this directory (daily rotation).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Print the resolved operating mode and effective flags.
    Mode,
    /// Check whether a capability may run in the current mode.
    Check {
        /// Capability name, e.g. `llm_complete`.
        capability: String,
        /// Classification of the data to process.
        #[arg(long)]
        admissibility: Option<DataAdmissibility>,
    },
    /// Report PHI kinds and counts found in the input.
    Scan {
        /// Pattern tier: `high` or `extended`.
        #[arg(long, default_value = "high")]
        tier: Tier,
        /// Read from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the input with PHI replaced by placeholders.
    Redact {
        /// Pattern tier: `high` or `extended`.
        #[arg(long, default_value = "high")]
        tier: Tier,
        /// Read from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the input unchanged if clean, otherwise fail without echoing it.
    Guard {
        /// Pattern tier: `high` or `extended`.
        #[arg(long, default_value = "extended")]
        tier: Tier,
        /// Read from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_production(dir)?),
        None => {
            logging::init_cli();
            None
        }
    };

    match cli.command {
        Command::Mode => handle_mode(),
        Command::Check {
            capability,
            admissibility,
        } => handle_check(&capability, admissibility),
        Command::Scan { tier, file } => handle_scan(tier, file.as_deref()),
        Command::Redact { tier, file } => handle_redact(tier, file.as_deref()),
        Command::Guard { tier, file } => handle_guard(tier, file.as_deref()),
    }
}

fn load_config() -> anyhow::Result<RuntimeConfig> {
    RuntimeConfig::load().context("failed to load runtime configuration")
}

/// Print the resolved mode alongside the flags it was derived from.
fn handle_mode() -> anyhow::Result<ExitCode> {
    let config = load_config()?;
    let report = json!({
        "mode": config.to_mode(),
        "config": config,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

/// Print the capability decision as JSON.
fn handle_check(
    capability: &str,
    admissibility: Option<DataAdmissibility>,
) -> anyhow::Result<ExitCode> {
    let config = Arc::new(load_config()?);
    let gate = CapabilityGate::from_env(config);
    let decision = gate.check_current(capability, admissibility);

    println!("{}", serde_json::to_string_pretty(&decision)?);
    if decision.allowed {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_DENIED))
    }
}

/// Print kinds and counts. Matched text is never printed.
fn handle_scan(tier: Tier, file: Option<&Path>) -> anyhow::Result<ExitCode> {
    let input = read_input(file)?;
    let scan = scan_text(&input, tier);
    let counts: serde_json::Map<String, serde_json::Value> = scan
        .counts()
        .into_iter()
        .map(|(kind, count)| (kind.as_str().to_owned(), json!(count)))
        .collect();

    let report = json!({
        "tier": tier,
        "has_phi": scan.has_phi(),
        "total": scan.total_matches(),
        "counts": counts,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

fn handle_redact(tier: Tier, file: Option<&Path>) -> anyhow::Result<ExitCode> {
    let input = read_input(file)?;
    print!("{}", redact(&input, tier));
    Ok(ExitCode::SUCCESS)
}

/// Fail-closed pass-through: on a block, only the reason is printed.
fn handle_guard(tier: Tier, file: Option<&Path>) -> anyhow::Result<ExitCode> {
    let input = read_input(file)?;
    match Guard::new(tier).guard_text(&input) {
        Ok(text) => {
            print!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Err(blocked) => {
            eprintln!("{blocked}");
            Ok(ExitCode::from(EXIT_BLOCKED))
        }
    }
}

fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => {
            debug!(path = %path.display(), "reading input file");
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}
