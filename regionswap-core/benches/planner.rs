//! Benchmarks for snapshot construction and swap planning
//!
//! Run with: cargo bench --package regionswap-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use regionswap_core::{plan_swaps, render_move_script, ClusterSnapshot, RegionAssignment};

/// Build a skewed cluster: the hot table packed onto the first quarter of
/// servers, one cold table spread evenly everywhere.
fn generate_facts(servers: usize) -> Vec<RegionAssignment> {
    let donor_count = (servers / 4).max(1);
    let hot_total = servers * 8;
    let mut facts = Vec::with_capacity(hot_total * 2);

    for i in 0..hot_total {
        facts.push(RegionAssignment {
            table: "hot".to_string(),
            region: format!("hot{i:08x}"),
            host: format!("rs{}", i % donor_count),
            port: 16020,
            start_code: 1740626070375,
        });
    }
    for i in 0..hot_total {
        facts.push(RegionAssignment {
            table: "cold".to_string(),
            region: format!("cold{i:08x}"),
            host: format!("rs{}", i % servers),
            port: 16020,
            start_code: 1740626070375,
        });
    }

    facts
}

/// Benchmark snapshot construction at various cluster sizes
fn bench_snapshot_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_build");

    for servers in [10, 40, 100] {
        let facts = generate_facts(servers);

        group.throughput(Throughput::Elements(facts.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("servers", servers),
            &facts,
            |b, facts| {
                b.iter(|| ClusterSnapshot::from_assignments(black_box(facts.clone())))
            },
        );
    }

    group.finish();
}

/// Benchmark planning at various cluster sizes
fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_swaps");

    for servers in [10, 40, 100] {
        let snapshot = ClusterSnapshot::from_assignments(generate_facts(servers));

        group.throughput(Throughput::Elements(snapshot.region_count() as u64));
        group.bench_with_input(
            BenchmarkId::new("servers", servers),
            &snapshot,
            |b, snapshot| {
                b.iter(|| plan_swaps(black_box(snapshot), "hot"))
            },
        );
    }

    group.finish();
}

/// Benchmark script rendering for a full-size plan
fn bench_render_script(c: &mut Criterion) {
    let snapshot = ClusterSnapshot::from_assignments(generate_facts(100));
    let plan = plan_swaps(&snapshot, "hot").unwrap();

    c.bench_function("render_move_script", |b| {
        b.iter(|| render_move_script(black_box(&plan), snapshot.identities()))
    });
}

criterion_group!(benches, bench_snapshot_build, bench_plan, bench_render_script);
criterion_main!(benches);
