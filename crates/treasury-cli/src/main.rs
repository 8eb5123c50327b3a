use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use treasury_cli::{run_scenario, Scenario};

#[derive(Debug, Parser)]
#[command(name = "treasury-cli", version, about = "Treasury engine scenario runner")]
struct Cli {
    /// JSON scenario file; the built-in demo runs when omitted.
    #[arg(long, env = "TREASURY_SCENARIO")]
    scenario: Option<PathBuf>,
    /// Emit the report as compact JSON instead of pretty-printed.
    #[arg(long, default_value_t = false)]
    compact: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "treasury=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let scenario: Scenario = match &cli.scenario {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        }
        None => treasury_cli::demo_scenario(),
    };

    let report = run_scenario(&scenario);
    info!(
        steps = report.steps.len(),
        balance = report.stats.balance_minor,
        "scenario finished"
    );

    let rendered = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{rendered}");
    Ok(())
}
