//! EV charging CLI module
//!
//! Command-line interface for training the energy models and exploring the
//! station inventory.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::output::write_predictions;
use crate::pipeline::{self, RunReport};
use crate::evaluation::RegressionMetrics;
use crate::stations::{StationFilter, StationInventory};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn metrics_row(name: &str, m: &RegressionMetrics) {
    println!(
        "  {:<22} {}  {}  {}",
        muted(name),
        kv("MAE", &format!("{:>8.3}", m.mae)),
        kv("MSE", &format!("{:>9.3}", m.mse)),
        kv("R²", &format!("{:>7.4}", m.r2)),
    );
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "evcharge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predict EV charging session energy from session metadata")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the energy models and write predictions for every session
    Train {
        /// Session table (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV with appended prediction columns
        #[arg(short, long)]
        output: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write a JSON run report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Fraction of sessions held out for testing
        #[arg(long)]
        test_size: Option<f64>,

        /// Seed for the split and the forest
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees in the forest
        #[arg(long)]
        trees: Option<usize>,
    },

    /// Summarise and filter a charging-station inventory
    Stations {
        /// Station table (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Keep only this network
        #[arg(long)]
        network: Option<String>,

        /// Minimum DC fast ports
        #[arg(long, default_value = "0")]
        min_dc: i64,

        /// Minimum Level 2 ports
        #[arg(long, default_value = "0")]
        min_l2: i64,

        /// Number of highest-capacity stations to list
        #[arg(long, default_value = "10")]
        top: usize,

        /// Write the filtered stations to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Build the run configuration from an optional file and flag overrides
pub fn build_config(
    config_path: Option<&Path>,
    test_size: Option<f64>,
    seed: Option<u64>,
    trees: Option<usize>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::new(),
    };
    if let Some(f) = test_size {
        config = config.with_test_fraction(f);
    }
    if let Some(s) = seed {
        config = config.with_seed(s);
    }
    if let Some(n) = trees {
        config.forest.n_estimators = n;
    }
    config.validate()?;
    Ok(config)
}

pub fn cmd_train(
    data_path: &Path,
    output_path: &Path,
    config: &PipelineConfig,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");
    let run_start = Instant::now();

    step_run("Loading sessions");
    let start = Instant::now();
    let sessions = pipeline::load_sessions(data_path, config)?;
    let stats = sessions.stats();
    step_done(&format!(
        "{} kept of {} ({} dropped) in {:?}",
        stats.rows_kept,
        stats.rows_read,
        stats.rows_read - stats.rows_kept,
        start.elapsed()
    ));

    step_run("Splitting");
    let dataset = pipeline::build_dataset(&sessions, config)?;
    let split = pipeline::split_dataset(&dataset, config)?;
    step_done(&format!("{} train / {} test", split.train.len(), split.test.len()));

    step_run("Training Lasso, RandomForest and SVR");
    let start = Instant::now();
    let models = pipeline::train(&split, config)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run("Evaluating");
    let evaluation = pipeline::evaluate(&models, &split)?;
    step_done(&format!("{} test sessions", split.test.len()));

    step_run("Writing predictions");
    let mut predictions = pipeline::predict(&models, &sessions, &dataset)?;
    write_predictions(&mut predictions, output_path)?;
    step_done(&output_path.display().to_string());

    let search = models.svr_search();
    section("Best SVR parameters");
    let best = search.best_params();
    println!("  {}", kv("C", &best.c.to_string()));
    println!("  {}", kv("epsilon", &best.epsilon.to_string()));
    println!("  {}", kv("gamma", &best.gamma.to_string()));
    println!("  {}", kv("CV MSE (kW²)", &format!("{:.4}", search.best_score())));
    if search.n_excluded() > 0 {
        println!("  {}", format!("{} candidate(s) excluded", search.n_excluded()).yellow());
    }
    if let Some((alpha, nonzero)) = models.lasso_summary() {
        println!("  {}", kv("Lasso alpha", &format!("{:.4}", alpha)));
        println!("  {}", kv("Lasso non-zero", &nonzero.to_string()));
    }

    section("Held-out energy (kWh)");
    for m in &evaluation.models {
        metrics_row(&m.name, &m.metrics);
    }
    println!();
    println!(
        "  {}",
        kv("Baseline MSE (mean energy)", &format!("{:.3}", evaluation.baselines.mean_energy.mse))
    );
    println!(
        "  {}",
        kv(
            "Baseline MSE (mean power × duration)",
            &format!("{:.3}", evaluation.baselines.constant_power.mse)
        )
    );

    if let Some(path) = report_path {
        let report = RunReport::new(
            config,
            stats,
            &split,
            &models,
            evaluation,
            run_start.elapsed().as_secs_f64(),
        );
        report.write_json(path)?;
        println!();
        println!("  {} report written to {}", ok("✓"), path.display());
    }

    println!();
    println!("  {}", dim(&format!("total {:?}", run_start.elapsed())));
    println!();
    Ok(())
}

pub fn cmd_stations(
    data_path: &Path,
    filter: &StationFilter,
    top: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Stations");

    step_run("Loading stations");
    let inventory = StationInventory::load_csv(data_path)?;
    step_done(&format!(
        "{} stations, {} without coordinates",
        inventory.len(),
        inventory.dropped_without_coordinates()
    ));

    let filtered = inventory.filter(filter);
    let summary = filtered.summary();

    section("Summary");
    println!("  {}", kv("Stations", &summary.n_stations.to_string()));
    println!("  {}", kv("Networks", &summary.n_networks.to_string()));
    println!("  {}", kv("DC fast stations", &summary.n_dc_fast.to_string()));
    if let Some(mean) = summary.mean_capacity {
        println!("  {}", kv("Avg capacity score", &format!("{:.1}", mean)));
    }
    if let Some((lat, lon)) = summary.center {
        println!("  {}", kv("Centre", &format!("{:.4}, {:.4}", lat, lon)));
    }
    println!(
        "  {}",
        kv(
            "DC only / L2 only / both",
            &format!("{} / {} / {}", summary.dc_only, summary.level2_only, summary.both)
        )
    );

    let networks = filtered.network_counts();
    if !networks.is_empty() {
        section("Top networks");
        for (network, count) in networks.iter().take(5) {
            println!("  {} {}", muted("•"), kv(network, &format!("{} stations", count)));
        }
    }

    section(&format!("Top {} by capacity", top));
    for station in filtered.top_by_capacity(top) {
        println!(
            "  {:<36} {:<16} {}",
            station.name.as_deref().unwrap_or("-").white(),
            muted(station.network.as_deref().unwrap_or("-")),
            accent(&format!("{:.1}", station.capacity_proxy)),
        );
    }

    if let Some(path) = output {
        filtered.write_csv(path)?;
        println!();
        println!("  {} wrote {}", ok("✓"), path.display());
    }
    println!();
    Ok(())
}
