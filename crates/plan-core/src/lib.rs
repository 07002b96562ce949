#![deny(warnings)]

//! Core domain model and requirement resolution for the mineral build planner.
//!
//! This crate defines the read-only static dataset (BOM and ore yield
//! tables), the refining-yield calculator, and the requirements resolver
//! that closes a multi-tier production graph into a flat mineral-demand
//! vector. All operations are pure, synchronous computations over
//! in-memory tables; nothing here performs I/O or holds a cache.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::warn;

/// Unique identifier for a buildable item, e.g. a ship or component hull.
///
/// Minerals share the item id space inside the BOM: a component id is a
/// mineral leaf when it appears in [`StaticDataset::mineral_ids`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

/// Unique identifier for a terminal raw material ("mineral").
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MineralId(pub String);

/// Unique identifier for a purchasable, refinable ore.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OreId(pub String);

/// Default per-item material efficiency when an item first appears as a
/// derived intermediate and no explicit value was supplied.
pub const DEFAULT_ITEM_ME: u8 = 10;

/// Pass cap for [`close_graph`]. A well-formed production graph is a
/// finite-depth DAG and converges in at most graph-depth passes; the cap
/// only guards against cyclic input data.
pub const MAX_CLOSURE_PASSES: u32 = 64;

/// Per-build efficiency parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyParams {
    /// Material efficiency as an integer percentage, applied as `1 - me/100`.
    #[serde(default = "default_me")]
    pub material_efficiency: u8,
    /// Multiplicative production-facility bonus.
    #[serde(default = "default_facility")]
    pub facility_modifier: f64,
}

fn default_me() -> u8 {
    DEFAULT_ITEM_ME
}

fn default_facility() -> f64 {
    1.0
}

impl Default for EfficiencyParams {
    fn default() -> Self {
        Self {
            material_efficiency: DEFAULT_ITEM_ME,
            facility_modifier: 1.0,
        }
    }
}

impl EfficiencyParams {
    /// Clamp out-of-range values to the nearest valid boundary instead of
    /// failing: ME stays below 100, a non-finite facility modifier falls
    /// back to the 1.0 default and a negative one clamps to zero.
    pub fn sanitized(self) -> Self {
        let facility_modifier = if !self.facility_modifier.is_finite() {
            1.0
        } else {
            self.facility_modifier.max(0.0)
        };
        Self {
            material_efficiency: self.material_efficiency.min(99),
            facility_modifier,
        }
    }
}

/// One requested production run: an item, how many to build, and the
/// efficiency parameters for that build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub item: ItemId,
    pub quantity: u64,
    #[serde(default)]
    pub params: EfficiencyParams,
}

/// Non-negative mineral quantities keyed by mineral id.
///
/// Invariant: when constructed through [`MineralVector::zeroed`] (as all
/// dataset-derived vectors are) an entry exists for every known mineral,
/// zero included.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineralVector(BTreeMap<MineralId, u64>);

impl MineralVector {
    /// A vector with a zero entry for each of the given minerals.
    pub fn zeroed(minerals: &[MineralId]) -> Self {
        Self(minerals.iter().map(|m| (m.clone(), 0)).collect())
    }

    /// Quantity for a mineral, zero when absent.
    pub fn get(&self, id: &MineralId) -> u64 {
        self.0.get(id).copied().unwrap_or(0)
    }

    /// Saturating accumulate.
    pub fn add(&mut self, id: &MineralId, units: u64) {
        let slot = self.0.entry(id.clone()).or_insert(0);
        *slot = slot.saturating_add(units);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MineralId, u64)> {
        self.0.iter().map(|(id, units)| (id, *units))
    }

    pub fn is_zero(&self) -> bool {
        self.0.values().all(|units| *units == 0)
    }
}

/// Integer mineral units produced by refining one unit of ore, derived
/// from the base table at a chosen reprocessing efficiency. Recomputed on
/// every efficiency change, never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldTable(BTreeMap<OreId, MineralVector>);

impl YieldTable {
    /// Mineral units per unit of ore, zero for unknown pairs.
    pub fn units(&self, ore: &OreId, mineral: &MineralId) -> u64 {
        self.0.get(ore).map(|row| row.get(mineral)).unwrap_or(0)
    }
}

/// Read-only industry tables supplied by an external snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticDataset {
    /// Terminal raw materials, the leaves of the production graph.
    pub mineral_ids: Vec<MineralId>,
    /// Purchasable ores.
    pub ore_ids: Vec<OreId>,
    /// Mineral units per unit of ore at 100% reprocessing efficiency.
    pub ore_base_yields: BTreeMap<OreId, BTreeMap<MineralId, u64>>,
    /// Item to component base quantities (the BOM). Components may be
    /// minerals or further buildable items.
    pub item_components: BTreeMap<ItemId, BTreeMap<ItemId, u64>>,
    /// Display names for reporting; not consumed by the math.
    #[serde(default)]
    pub item_names: BTreeMap<ItemId, String>,
}

impl StaticDataset {
    /// Whether an id in the BOM component space is a mineral leaf.
    pub fn is_mineral(&self, id: &ItemId) -> bool {
        self.mineral_ids.iter().any(|m| m.0 == id.0)
    }

    /// Direct component requirements of an item, `None` when unknown.
    pub fn components(&self, item: &ItemId) -> Option<&BTreeMap<ItemId, u64>> {
        self.item_components.get(item)
    }

    /// Base yield for an (ore, mineral) pair, zero when absent.
    pub fn base_yield(&self, ore: &OreId, mineral: &MineralId) -> u64 {
        self.ore_base_yields
            .get(ore)
            .and_then(|row| row.get(mineral))
            .copied()
            .unwrap_or(0)
    }

    /// An all-zero vector over every known mineral.
    pub fn zero_minerals(&self) -> MineralVector {
        MineralVector::zeroed(&self.mineral_ids)
    }
}

/// Dataset consistency errors, surfaced once at load time.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A mineral id appears twice in the catalog.
    #[error("duplicate mineral id: {0}")]
    DuplicateMineral(String),
    /// An ore id appears twice in the catalog.
    #[error("duplicate ore id: {0}")]
    DuplicateOre(String),
    /// A yield row belongs to an ore missing from the ore catalog.
    #[error("yield row for unknown ore: {0}")]
    UnknownYieldOre(String),
    /// A yield entry references a mineral missing from the catalog.
    #[error("yield entry for unknown mineral: {0}")]
    UnknownYieldMineral(String),
}

/// Validate the internal consistency of a dataset snapshot.
///
/// Stale BOM component references are deliberately not an error here:
/// they are expected from user input and degrade to zero requirement at
/// resolution time.
pub fn validate_dataset(dataset: &StaticDataset) -> Result<(), ValidationError> {
    let mut minerals: BTreeSet<&MineralId> = BTreeSet::new();
    for m in &dataset.mineral_ids {
        if !minerals.insert(m) {
            return Err(ValidationError::DuplicateMineral(m.0.clone()));
        }
    }
    let mut ores: BTreeSet<&OreId> = BTreeSet::new();
    for o in &dataset.ore_ids {
        if !ores.insert(o) {
            return Err(ValidationError::DuplicateOre(o.0.clone()));
        }
    }
    for (ore, row) in &dataset.ore_base_yields {
        if !ores.contains(ore) {
            return Err(ValidationError::UnknownYieldOre(ore.0.clone()));
        }
        for mineral in row.keys() {
            if !minerals.contains(mineral) {
                return Err(ValidationError::UnknownYieldMineral(mineral.0.clone()));
            }
        }
    }
    Ok(())
}

/// Derive the integer yield table at the given reprocessing efficiency.
///
/// Every (ore, mineral) yield is `floor(base * efficiency)` -- always
/// floored, never rounded, to stay conservative relative to the published
/// formula. Efficiency is clamped into `[0, 1]` (NaN clamps to 0).
pub fn processed_yields(dataset: &StaticDataset, efficiency: f64) -> YieldTable {
    let efficiency = if efficiency.is_nan() {
        0.0
    } else {
        efficiency.clamp(0.0, 1.0)
    };
    let mut table = BTreeMap::new();
    for ore in &dataset.ore_ids {
        let mut row = dataset.zero_minerals();
        for mineral in &dataset.mineral_ids {
            let base = dataset.base_yield(ore, mineral);
            row.add(mineral, (base as f64 * efficiency).floor() as u64);
        }
        table.insert(ore.clone(), row);
    }
    YieldTable(table)
}

// https://eve-industry.org/export/IndustryFormulas.pdf
// required = max(runs, ceil(round(runs * baseQuantity * materialModifier, 2)))
fn required_units(quantity: u64, base: u64, params: EfficiencyParams) -> u64 {
    if quantity == 0 || base == 0 {
        return 0;
    }
    let p = params.sanitized();
    let me = f64::from(p.material_efficiency);
    let modifier = (1.0 - me / 100.0) * p.facility_modifier;
    // Round at 2-decimal precision (scale by 100), then ceiling.
    let scaled = (100.0 * quantity as f64 * base as f64 * modifier).round();
    let required = (scaled / 100.0).ceil().max(0.0) as u64;
    // A run always consumes at least `quantity` units of each component.
    required.max(quantity)
}

/// Expand one item's direct component requirements for a build.
///
/// Returns an entry for every BOM component of the item (zero when the
/// build quantity is zero). Unknown items yield an empty map: stale
/// references from user input degrade to zero requirement rather than
/// aborting the computation.
pub fn expand_direct(
    dataset: &StaticDataset,
    item: &ItemId,
    quantity: u64,
    params: EfficiencyParams,
) -> BTreeMap<ItemId, u64> {
    let Some(components) = dataset.components(item) else {
        warn!(item = %item.0, "unknown item id, treated as zero requirement");
        return BTreeMap::new();
    };
    components
        .iter()
        .map(|(component, &base)| (component.clone(), required_units(quantity, base, params)))
        .collect()
}

/// Output of [`close_graph`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedBuild {
    /// Aggregate mineral demand across all requested and derived builds.
    pub minerals: MineralVector,
    /// Fixed-point build quantity per expanded item, intermediates
    /// included.
    pub item_builds: BTreeMap<ItemId, u64>,
    /// Number of passes taken to converge.
    pub passes: u32,
}

/// Close the production graph over the given build requests.
///
/// Each pass expands every current build, accumulates mineral leaves into
/// the aggregate vector, and overwrites each intermediate item's quantity
/// with the demand summed across all of its requesters. The per-item
/// efficiency is sticky: the value from an explicit request (or the
/// default, the first time an item appears as an intermediate) is kept
/// for all subsequent passes. Iterates to a fixed point, bounded by
/// [`MAX_CLOSURE_PASSES`].
pub fn close_graph(dataset: &StaticDataset, requests: &[BuildRequest]) -> ResolvedBuild {
    let mineral_set: BTreeSet<&str> = dataset.mineral_ids.iter().map(|m| m.0.as_str()).collect();

    let mut quantities: BTreeMap<ItemId, u64> = BTreeMap::new();
    let mut sticky: BTreeMap<ItemId, EfficiencyParams> = BTreeMap::new();
    for request in requests {
        let slot = quantities.entry(request.item.clone()).or_insert(0);
        *slot = slot.saturating_add(request.quantity);
        sticky.entry(request.item.clone()).or_insert(request.params);
    }

    let mut passes: u32 = 0;
    loop {
        passes += 1;
        let mut minerals = dataset.zero_minerals();
        let mut derived: BTreeMap<ItemId, u64> = BTreeMap::new();

        for (item, &quantity) in &quantities {
            let params = sticky.get(item).copied().unwrap_or_default();
            for (component, units) in expand_direct(dataset, item, quantity, params) {
                if mineral_set.contains(component.0.as_str()) {
                    minerals.add(&MineralId(component.0), units);
                } else {
                    let slot = derived.entry(component).or_insert(0);
                    *slot = slot.saturating_add(units);
                }
            }
        }

        // Derived demand overwrites the previous quantity of every
        // intermediate; purely top-level items keep their requested
        // amount.
        let mut next = quantities.clone();
        for (item, quantity) in derived {
            sticky.entry(item.clone()).or_default();
            next.insert(item, quantity);
        }

        let converged = next == quantities;
        if converged || passes >= MAX_CLOSURE_PASSES {
            if !converged {
                warn!(passes, "production graph did not converge, returning best-effort totals");
            }
            return ResolvedBuild {
                minerals,
                item_builds: quantities,
                passes,
            };
        }
        quantities = next;
    }
}

/// Minerals obtained by refining the given ore purchases.
pub fn achieved_minerals(
    dataset: &StaticDataset,
    yields: &YieldTable,
    purchases: &BTreeMap<OreId, u64>,
) -> MineralVector {
    let mut achieved = dataset.zero_minerals();
    for ore in &dataset.ore_ids {
        let quantity = purchases.get(ore).copied().unwrap_or(0);
        if quantity == 0 {
            continue;
        }
        for mineral in &dataset.mineral_ids {
            achieved.add(mineral, yields.units(ore, mineral).saturating_mul(quantity));
        }
    }
    achieved
}

/// Signed per-mineral surplus of an achieved vector over a requirement.
/// Negative entries are shortfalls.
pub fn residual_minerals(
    achieved: &MineralVector,
    required: &MineralVector,
) -> BTreeMap<MineralId, i64> {
    achieved
        .iter()
        .map(|(mineral, units)| {
            (mineral.clone(), units as i64 - required.get(mineral) as i64)
        })
        .collect()
}
