use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tax_core::{Regime, TaxCalculationInput};
use tax_server::api::run_http_server;
use tax_server::config::ServerConfig;
use tax_server::logging::init_logging;
use tax_server::report::{ComparisonReport, ResultReport, round_comparison, round_result};
use tax_server::service::Scenario;
use tracing::debug;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Slab-based income tax calculator.
///
/// Serves the calculation API over HTTP, or runs a single calculation or
/// comparison and prints the result.
#[derive(Debug, Parser)]
#[command(name = "tax-server", version, about)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Listen on this port instead of the configured one.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Compute tax for one CTC.
    Calculate {
        /// Fiscal year whose slabs apply.
        #[arg(long)]
        year: i32,

        /// Annual cost-to-company before the hike.
        #[arg(long)]
        ctc: Decimal,

        /// Salary hike in percent; may be negative.
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        hike: Decimal,

        /// Regime to apply instead of the configured default.
        #[arg(long, value_enum)]
        regime: Option<CliRegime>,

        /// Print JSON instead of a text report.
        #[arg(long)]
        json: bool,
    },

    /// Compute the same CTC under two fiscal years and show the differences.
    Compare {
        #[arg(long)]
        ctc: Decimal,

        #[arg(long)]
        first_year: i32,

        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        first_hike: Decimal,

        #[arg(long)]
        second_year: i32,

        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        second_hike: Decimal,

        #[arg(long, value_enum)]
        regime: Option<CliRegime>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRegime {
    Legacy,
    Current,
}

impl From<CliRegime> for Regime {
    fn from(value: CliRegime) -> Self {
        match value {
            CliRegime::Legacy => Regime::Legacy,
            CliRegime::Current => Regime::Current,
        }
    }
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging.filter, config.logging.file.as_deref())?;
    debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let state = tax_server::build_state(&config).await?;
            run_http_server(state, config.server.socket_addr())
                .await
                .context("HTTP server stopped")?;
        }

        Command::Calculate {
            year,
            ctc,
            hike,
            regime,
            json,
        } => {
            let state = tax_server::build_state(&config).await?;
            let input = TaxCalculationInput::new(year, ctc).with_hike(hike);
            let result = state.calculate(input, regime.map(Regime::from), None).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&round_result(&result))?);
            } else {
                println!("{}", ResultReport(&result));
            }
        }

        Command::Compare {
            ctc,
            first_year,
            first_hike,
            second_year,
            second_hike,
            regime,
            json,
        } => {
            let state = tax_server::build_state(&config).await?;
            let comparison = state
                .compare(
                    ctc,
                    Scenario::new(first_year).with_hike(first_hike),
                    Scenario::new(second_year).with_hike(second_hike),
                    regime.map(Regime::from),
                    None,
                )
                .await?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&round_comparison(&comparison))?
                );
            } else {
                print!("{}", ComparisonReport(&comparison));
            }
        }
    }

    Ok(())
}
