use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;

fn build_market(ores: usize) -> (plan_core::StaticDataset, BTreeMap<plan_core::OreId, plan_procure::OreQuote>) {
    let minerals = ["Tritanium", "Pyerite", "Mexallon", "Isogen", "Nocxium"];
    let mineral_ids: Vec<plan_core::MineralId> = minerals
        .iter()
        .map(|m| plan_core::MineralId(m.to_string()))
        .collect();

    let mut ore_ids = Vec::with_capacity(ores);
    let mut ore_base_yields = BTreeMap::new();
    let mut quotes = BTreeMap::new();
    for i in 0..ores {
        let ore = plan_core::OreId(format!("ore_{i:02}"));
        let mut row: BTreeMap<plan_core::MineralId, u64> = BTreeMap::new();
        for (j, mineral) in mineral_ids.iter().enumerate() {
            row.insert(mineral.clone(), ((i * 37 + j * 101) % 400) as u64);
        }
        ore_base_yields.insert(ore.clone(), row);
        quotes.insert(
            ore.clone(),
            plan_procure::OreQuote {
                unit_price: 50.0 + (i * 13 % 200) as f64,
                depth: 50_000,
            },
        );
        ore_ids.push(ore);
    }

    let dataset = plan_core::StaticDataset {
        mineral_ids,
        ore_ids,
        ore_base_yields,
        item_components: BTreeMap::new(),
        item_names: BTreeMap::new(),
    };
    (dataset, quotes)
}

fn bench_required_ores(c: &mut Criterion) {
    let (dataset, quotes) = build_market(24);
    let mut required = dataset.zero_minerals();
    for mineral in &dataset.mineral_ids {
        required.add(mineral, 2_000_000);
    }

    c.bench_function("required_ores 24 ores x 5 minerals", |b| {
        b.iter(|| {
            let plan = plan_procure::required_ores(&dataset, 0.5, &required, &quotes)
                .expect("solver fault");
            let _ = black_box(plan.cost);
        })
    });
}

criterion_group!(benches, bench_required_ores);
criterion_main!(benches);
