#![deny(warnings)]

//! Headless CLI: resolve a build list to mineral demand, solve the ore
//! purchase plan against a market snapshot, and print the result.

use anyhow::{Context, Result};
use clap::Parser;
use plan_core::{
    achieved_minerals, close_graph, processed_yields, residual_minerals, validate_dataset,
    BuildRequest, OreId, StaticDataset,
};
use plan_procure::{quote_map, required_ores, MarketTier};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Production planner: BOM resolution and cost-minimal ore sourcing.
#[derive(Debug, Parser)]
#[command(name = "plan-cli", version)]
struct Args {
    /// Static dataset snapshot (JSON): catalogs, BOM, base yields.
    #[arg(long)]
    dataset: PathBuf,
    /// Market offer snapshot (JSON): ore id to ordered (price, qty) tiers.
    #[arg(long)]
    market: PathBuf,
    /// Build list (JSON): requested items with quantity and efficiency.
    #[arg(long)]
    builds: PathBuf,
    /// Reprocessing efficiency in (0, 1].
    #[arg(long, default_value_t = 0.5)]
    efficiency: f64,
    /// Order-book tier index used to coarsen each ore's price curve.
    #[arg(long, default_value_t = 1)]
    lift_offers: usize,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {what} from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {what} from {}", path.display()))
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();
    info!(
        efficiency = args.efficiency,
        lift_offers = args.lift_offers,
        "starting planner"
    );

    let dataset: StaticDataset = load_json(&args.dataset, "static dataset")?;
    validate_dataset(&dataset)?;
    let offers: BTreeMap<OreId, Vec<MarketTier>> = load_json(&args.market, "market snapshot")?;
    let builds: Vec<BuildRequest> = load_json(&args.builds, "build list")?;

    let resolved = close_graph(&dataset, &builds);
    info!(passes = resolved.passes, "closed production graph");

    println!("Required minerals:");
    for (mineral, units) in resolved.minerals.iter() {
        println!("  {:<12} {:>14}", mineral.0, units);
    }

    let quotes = quote_map(&offers, args.lift_offers);
    let plan = required_ores(&dataset, args.efficiency, &resolved.minerals, &quotes)?;
    if !plan.feasible {
        warn!("market depth cannot cover the requirement; plan is advisory only");
    }

    println!("Purchase plan:");
    let mut total_units: u64 = 0;
    for (ore, units) in &plan.ores {
        if *units > 0 {
            println!("  {:<12} {:>14}", ore.0, units);
            total_units += units;
        }
    }

    let yields = processed_yields(&dataset, args.efficiency);
    let achieved = achieved_minerals(&dataset, &yields, &plan.ores);
    println!("Residual minerals (surplus after refining):");
    for (mineral, surplus) in residual_minerals(&achieved, &resolved.minerals) {
        println!("  {:<12} {:>14}", mineral.0, surplus);
    }

    println!(
        "Plan | feasible: {} | ores: {} units | cost: {:.2}",
        plan.feasible, total_units, plan.cost
    );

    Ok(())
}
