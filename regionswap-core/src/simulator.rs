//! Plan Simulator
//!
//! Replays a swap plan's count deltas against a snapshot without touching
//! region identities, producing the per-server per-table counts the cluster
//! would show after execution. Used for the before/after report and for
//! checking plans before they are handed to an operator.

use std::collections::HashMap;

use crate::planner::{RegionSwap, SwapPlan};
use crate::snapshot::ClusterSnapshot;

/// Per-server per-table counts projected after a (partial) plan.
#[derive(Debug, Clone)]
pub struct ProjectedCounts {
    hosts: Vec<String>,
    counts: HashMap<String, HashMap<String, usize>>,
}

impl ProjectedCounts {
    /// Hosts in snapshot order.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Projected region count of `table` on `host`.
    pub fn count(&self, host: &str, table: &str) -> usize {
        self.counts
            .get(host)
            .and_then(|tables| tables.get(table))
            .copied()
            .unwrap_or(0)
    }

    /// Projected total of `table` across all hosts.
    pub fn table_total(&self, table: &str) -> usize {
        self.counts
            .values()
            .filter_map(|tables| tables.get(table))
            .sum()
    }
}

/// Replay `swaps` over the snapshot's counts. Each swap moves one hot-table
/// region source→target and one cold region target→source, so only four
/// cells change per swap. The swaps must come from a plan computed against
/// this same snapshot.
pub fn project_counts(
    snapshot: &ClusterSnapshot,
    hot_table: &str,
    swaps: &[RegionSwap],
) -> ProjectedCounts {
    let mut hosts = Vec::with_capacity(snapshot.server_count());
    let mut counts: HashMap<String, HashMap<String, usize>> = HashMap::new();

    for server in snapshot.servers() {
        hosts.push(server.host().to_string());
        let tables = counts.entry(server.host().to_string()).or_default();
        for table in server.tables() {
            tables.insert(table.to_string(), server.count(table));
        }
    }

    for swap in swaps {
        decrement(&mut counts, &swap.source, hot_table);
        increment(&mut counts, &swap.target, hot_table);
        decrement(&mut counts, &swap.target, &swap.cold_table);
        increment(&mut counts, &swap.source, &swap.cold_table);
    }

    ProjectedCounts { hosts, counts }
}

/// Replay a whole plan.
pub fn project_plan(snapshot: &ClusterSnapshot, plan: &SwapPlan) -> ProjectedCounts {
    project_counts(snapshot, &plan.hot_table, &plan.swaps)
}

fn increment(counts: &mut HashMap<String, HashMap<String, usize>>, host: &str, table: &str) {
    *counts
        .entry(host.to_string())
        .or_default()
        .entry(table.to_string())
        .or_insert(0) += 1;
}

fn decrement(counts: &mut HashMap<String, HashMap<String, usize>>, host: &str, table: &str) {
    if let Some(count) = counts.get_mut(host).and_then(|tables| tables.get_mut(table)) {
        *count = count.saturating_sub(1);
    }
}
