use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::OnceLock;

use partd::prelude::*;

// Static storage for the synthetic snapshots so they are built once
static SNAPSHOTS: OnceLock<(Snapshot, Snapshot)> = OnceLock::new();

/// Build a pair of synthetic snapshots sized like a monthly extract slice:
/// 200 formularies, ~3000 plans, 50 NDCs listed on a quarter of the
/// formularies each.
fn get_snapshots() -> &'static (Snapshot, Snapshot) {
    SNAPSHOTS.get_or_init(|| (build_snapshot(0), build_snapshot(1)))
}

fn build_snapshot(generation: u32) -> Snapshot {
    let mut formulary = Vec::new();
    let mut plans = Vec::new();

    for f in 0..200u32 {
        for n in 0..50u32 {
            // shift listing membership between generations so the diff sets
            // are non-trivial
            if (f + n + generation) % 4 == 0 {
                formulary.push(FormularyRecord {
                    ndc: Ndc::from_u64(u64::from(n) + 1).unwrap(),
                    formulary_id: format!("F{f:05}"),
                    tier: 1 + (f + n + generation) % 5,
                    prior_auth: (f + n) % 3 == 0,
                    step_therapy: (f + n) % 7 == 0,
                });
            }
        }

        for p in 0..15u32 {
            plans.push(PlanRecord {
                contract_id: format!("H{:04}", f * 15 + p),
                plan_id: format!("{:03}", p),
                contract_name: format!("Contract {f}"),
                plan_name: format!("Plan {p}"),
                formulary_id: format!("F{f:05}"),
            });
        }
    }

    Snapshot::new(formulary, plans)
}

fn benchmark_ndc_normalization(c: &mut Criterion) {
    c.bench_function("ndc_normalization_valid", |b| {
        b.iter(|| {
            let result = Ndc::new(black_box("69197540"));
            assert!(result.is_ok());
        })
    });

    c.bench_function("ndc_normalization_invalid", |b| {
        b.iter(|| {
            let result = Ndc::new(black_box("69197-540"));
            assert!(result.is_err());
        })
    });
}

fn benchmark_join(c: &mut Criterion) {
    let (old, _) = get_snapshots();
    let ndc = Ndc::from_u64(3).unwrap();

    c.bench_function("plans_covering_one_ndc", |b| {
        b.iter(|| old.plans_covering(black_box(&ndc)))
    });
}

fn benchmark_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("comparison");
    let (old, new) = get_snapshots();
    let ndc = Ndc::from_u64(3).unwrap();

    group.bench_function("plan_comparison_one_ndc", |b| {
        b.iter(|| PlanComparison::compare(black_box(old), black_box(new), &ndc))
    });

    group.bench_function("formulary_comparison_one_ndc", |b| {
        b.iter(|| FormularyComparison::compare(black_box(old), black_box(new), &ndc))
    });

    group.finish();
}

fn benchmark_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("series");
    group.sample_size(20);

    let periods = vec![
        PeriodSnapshot {
            label: "p1".to_string(),
            snapshot: build_snapshot(0),
        },
        PeriodSnapshot {
            label: "p2".to_string(),
            snapshot: build_snapshot(1),
        },
    ];

    let drugs: Vec<DrugNdcs> = (1..=10u64)
        .map(|n| DrugNdcs {
            name: format!("Drug {n}"),
            ndcs: vec![n.to_string()],
        })
        .collect();

    group.bench_function("collect_series_10_drugs_2_periods", |b| {
        b.iter(|| collect_series(black_box(&periods), black_box(&drugs)))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_ndc_normalization,
    benchmark_join,
    benchmark_comparison,
    benchmark_series
);

criterion_main!(benches);
