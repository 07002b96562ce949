#![deny(warnings)]

//! Ore procurement: market-depth coarsening and the cost-minimal
//! purchase plan.
//!
//! Given the aggregate mineral requirement from `plan-core` and a
//! per-ore market quote, this crate formulates a bounded mixed-integer
//! linear program -- one decision variable per purchasable ore, mineral
//! coverage constraints, market-depth upper bounds -- and minimizes the
//! total purchase cost. Infeasibility is an advisory business condition,
//! not an error; only backend solver faults propagate as `Err`.

use good_lp::{
    constraint, default_solver, variable, variables, Expression, ResolutionError, Solution,
    SolverModel, Variable,
};
use plan_core::{achieved_minerals, processed_yields, MineralVector, OreId, StaticDataset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Branch-and-bound blows up with many integer variables. Constraining
/// only the priciest ores to integral values keeps the relaxation error
/// on the cheap side of the book while the solve stays fast; everything
/// else is ceiling-rounded after the solve, which can only overshoot the
/// mineral constraints.
pub const INTEGER_VAR_LIMIT: usize = 8;

/// One (price, quantity) step of an ore's sell-order book, price
/// non-decreasing within an ore.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketTier {
    pub unit_price: f64,
    pub quantity: u64,
}

/// Coarsened market view of one ore: a representative unit price and the
/// cumulative quantity purchasable at or below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OreQuote {
    pub unit_price: f64,
    pub depth: u64,
}

/// Errors from the procurement optimizer.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The LP backend failed for a reason other than infeasibility.
    #[error("solver failure: {0}")]
    Solver(String),
}

/// A purchase plan for the full ore catalog.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcurementPlan {
    /// Units to buy per ore; an entry exists for every known ore, zero
    /// for ores the solve excluded or left unused.
    pub ores: BTreeMap<OreId, u64>,
    /// False when the market cannot cover the requirement. Quantities
    /// are all zero in that case and do not form a usable plan.
    pub feasible: bool,
    /// Total purchase cost of the rounded plan.
    pub cost: f64,
}

/// Collapse an ore's order book into a single representative quote.
///
/// The price is taken from the tier at `lift_offers` (or the last tier
/// of a shorter book) and the depth is the summed quantity of every tier
/// priced at or below it. A deliberate simplification: modeling each
/// tier as its own decision variable would grow the solver
/// quadratically for marginal precision.
pub fn coarsen_tiers(tiers: &[MarketTier], lift_offers: usize) -> OreQuote {
    let Some(last) = tiers.last() else {
        return OreQuote::default();
    };
    let unit_price = tiers.get(lift_offers).unwrap_or(last).unit_price;
    let depth = tiers
        .iter()
        .filter(|tier| tier.unit_price <= unit_price)
        .map(|tier| tier.quantity)
        .fold(0u64, u64::saturating_add);
    OreQuote { unit_price, depth }
}

/// Coarsen a full offer table into per-ore quotes.
pub fn quote_map(
    offers: &BTreeMap<OreId, Vec<MarketTier>>,
    lift_offers: usize,
) -> BTreeMap<OreId, OreQuote> {
    offers
        .iter()
        .map(|(ore, tiers)| (ore.clone(), coarsen_tiers(tiers, lift_offers)))
        .collect()
}

/// Solve for the cost-minimal ore purchase covering `required`.
///
/// Ores with no market depth (or no quote at all) get no decision
/// variable and always report zero. An entirely zero requirement skips
/// the solve. Infeasible markets return an all-zero plan with
/// `feasible == false`; the condition is logged as an advisory.
pub fn required_ores(
    dataset: &StaticDataset,
    efficiency: f64,
    required: &MineralVector,
    quotes: &BTreeMap<OreId, OreQuote>,
) -> Result<ProcurementPlan, SolveError> {
    let mut ores: BTreeMap<OreId, u64> = dataset.ore_ids.iter().map(|o| (o.clone(), 0)).collect();

    if required.is_zero() {
        return Ok(ProcurementPlan {
            ores,
            feasible: true,
            cost: 0.0,
        });
    }

    let yields = processed_yields(dataset, efficiency);

    let purchasable: Vec<(&OreId, OreQuote)> = dataset
        .ore_ids
        .iter()
        .filter_map(|ore| {
            let quote = quotes.get(ore).copied().unwrap_or_default();
            (quote.depth > 0 && quote.unit_price.is_finite()).then_some((ore, quote))
        })
        .collect();

    if purchasable.is_empty() {
        warn!("nonzero mineral requirement with no purchasable ores");
        return Ok(ProcurementPlan {
            ores,
            feasible: false,
            cost: 0.0,
        });
    }

    let mut by_price: Vec<(&OreId, f64)> = purchasable
        .iter()
        .map(|&(ore, quote)| (ore, quote.unit_price))
        .collect();
    by_price.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    let integral: BTreeSet<&OreId> = by_price
        .iter()
        .take(INTEGER_VAR_LIMIT)
        .map(|&(ore, _)| ore)
        .collect();

    let mut problem = variables!();
    let mut decisions: Vec<(&OreId, Variable, OreQuote)> = Vec::with_capacity(purchasable.len());
    for &(ore, quote) in &purchasable {
        let mut definition = variable().min(0.0).max(quote.depth as f64);
        if integral.contains(&ore) {
            definition = definition.integer();
        }
        decisions.push((ore, problem.add(definition), quote));
    }

    let objective: Expression = decisions
        .iter()
        .map(|(_, var, quote)| quote.unit_price * *var)
        .sum();
    let mut model = problem.minimise(objective).using(default_solver);
    for (mineral, demand) in required.iter() {
        if demand == 0 {
            continue;
        }
        let supply: Expression = decisions
            .iter()
            .map(|(ore, var, _)| yields.units(ore, mineral) as f64 * *var)
            .sum();
        let demand = demand as f64;
        model = model.with(constraint!(supply >= demand));
    }

    match model.solve() {
        Ok(solution) => {
            let mut cost = 0.0;
            for (ore, var, quote) in &decisions {
                // Shave solver float noise before rounding up.
                let units = (solution.value(*var) - 1e-9).max(0.0).ceil() as u64;
                cost += quote.unit_price * units as f64;
                ores.insert((*ore).clone(), units);
            }
            debug!(cost, "procurement solve complete");
            Ok(ProcurementPlan {
                ores,
                feasible: true,
                cost,
            })
        }
        Err(ResolutionError::Infeasible) => {
            warn!("LP solution not feasible");
            Ok(ProcurementPlan {
                ores,
                feasible: false,
                cost: 0.0,
            })
        }
        Err(fault) => Err(SolveError::Solver(fault.to_string())),
    }
}

/// Recompute the minerals a plan actually delivers and assert coverage.
/// Thin verification wrapper for callers that want the check in one
/// call.
pub fn verify_coverage(
    dataset: &StaticDataset,
    efficiency: f64,
    required: &MineralVector,
    plan: &ProcurementPlan,
) -> bool {
    let yields = processed_yields(dataset, efficiency);
    let achieved = achieved_minerals(dataset, &yields, &plan.ores);
    required
        .iter()
        .all(|(mineral, demand)| achieved.get(mineral) >= demand)
}
