//! evcharge - Main Entry Point
//!
//! Trains the session energy models, or summarises a station inventory.

use clap::Parser;
use evcharge::cli::{build_config, cmd_stations, cmd_train, Cli, Commands};
use evcharge::stations::StationFilter;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evcharge=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            output,
            config,
            report,
            test_size,
            seed,
            trees,
        } => {
            let config = build_config(config.as_deref(), test_size, seed, trees)?;
            cmd_train(&data, &output, &config, report.as_deref())?;
        }
        Commands::Stations {
            data,
            network,
            min_dc,
            min_l2,
            top,
            output,
        } => {
            let filter = StationFilter {
                network,
                min_dc_fast: min_dc,
                min_level2: min_l2,
            };
            cmd_stations(&data, &filter, top, output.as_deref())?;
        }
    }

    Ok(())
}
