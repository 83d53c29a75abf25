//! Swap Planner
//!
//! Computes pairwise region swaps that flatten a hot table's distribution.
//! Each swap moves one hot-table region from an overloaded server (donor) to
//! an underloaded one (receiver) and backfills the donor with a region of a
//! cold table picked from the receiver, so per-server totals never drift.
//!
//! Planning rules:
//! - Averages are computed once up front; swaps preserve per-table totals,
//!   so they stay valid for the whole run
//! - Donors and receivers are re-classified after every applied swap
//! - Cold candidates are scored by how far the table sits above its average
//!   on the receiver, with a penalty when the donor would overshoot

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::snapshot::{ClusterSnapshot, ServerState};

/// Planner errors
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Table '{table}' not found in snapshot")]
    TableNotFound { table: String },
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// A single pairwise swap: hot region out of the donor, cold region back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSwap {
    /// Hot-table region leaving the donor
    pub hot_region: String,
    /// Cold region backfilling the donor
    pub cold_region: String,
    /// Table the cold region belongs to
    pub cold_table: String,
    /// Donor host
    pub source: String,
    /// Receiver host
    pub target: String,
}

/// How a planning run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    /// No donors or no receivers remained
    Balanced,
    /// Donors and receivers remained but no feasible swap existed
    Stalled,
    /// The iteration cap cut planning short; the plan is a usable prefix
    IterationCapReached,
}

impl fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOutcome::Balanced => write!(f, "balanced"),
            PlanOutcome::Stalled => write!(f, "stalled"),
            PlanOutcome::IterationCapReached => write!(f, "iteration cap reached"),
        }
    }
}

/// Ordered swap plan for one hot table.
#[derive(Debug, Clone, Serialize)]
pub struct SwapPlan {
    /// Table the plan balances
    pub hot_table: String,
    /// Swaps in execution order
    pub swaps: Vec<RegionSwap>,
    /// How planning ended
    pub outcome: PlanOutcome,
}

impl SwapPlan {
    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    /// Swap counts per cold table, in first-use order.
    pub fn cold_table_counts(&self) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for swap in &self.swaps {
            if !counts.contains_key(swap.cold_table.as_str()) {
                order.push(swap.cold_table.clone());
            }
            *counts.entry(swap.cold_table.as_str()).or_insert(0) += 1;
        }
        order
            .into_iter()
            .map(|table| {
                let count = counts[table.as_str()];
                (table, count)
            })
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> String {
        format!(
            "{} swaps for '{}', {} cold tables touched, outcome: {}",
            self.swaps.len(),
            self.hot_table,
            self.cold_table_counts().len(),
            self.outcome
        )
    }
}

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Maximum planning iterations (one swap per iteration)
    pub max_iterations: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
        }
    }
}

/// Mutable per-server copy of the snapshot, updated after every swap.
struct WorkingState {
    servers: Vec<ServerState>,
    host_index: HashMap<String, usize>,
}

impl WorkingState {
    fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        let servers: Vec<ServerState> = snapshot.servers().to_vec();
        let host_index = servers
            .iter()
            .enumerate()
            .map(|(index, server)| (server.host().to_string(), index))
            .collect();
        Self {
            servers,
            host_index,
        }
    }

    /// Split servers into donors (above average) and receivers (below), each
    /// tagged with its gap and sorted by gap descending. Sorting is stable,
    /// so equal gaps keep snapshot order.
    fn classify(&self, hot_table: &str, hot_avg: f64) -> (Vec<(usize, f64)>, Vec<(usize, f64)>) {
        let mut donors = Vec::new();
        let mut receivers = Vec::new();

        for (index, server) in self.servers.iter().enumerate() {
            let count = server.count(hot_table) as f64;
            if count > hot_avg {
                donors.push((index, count - hot_avg));
            } else if count < hot_avg {
                receivers.push((index, hot_avg - count));
            }
        }

        donors.sort_by(|a, b| b.1.total_cmp(&a.1));
        receivers.sort_by(|a, b| b.1.total_cmp(&a.1));

        (donors, receivers)
    }

    /// First feasible donor/receiver pairing, or None when every pairing
    /// lacks a cold region to trade back.
    fn find_swap(
        &self,
        donors: &[(usize, f64)],
        receivers: &[(usize, f64)],
        hot_table: &str,
        averages: &HashMap<String, f64>,
    ) -> Option<RegionSwap> {
        for &(donor_index, _) in donors {
            let donor = &self.servers[donor_index];
            let Some(hot_region) = donor.regions(hot_table).first() else {
                continue;
            };

            for &(receiver_index, _) in receivers {
                let receiver = &self.servers[receiver_index];
                let Some((cold_table, cold_region)) =
                    self.best_cold_candidate(donor, receiver, hot_table, averages)
                else {
                    continue;
                };

                return Some(RegionSwap {
                    hot_region: hot_region.clone(),
                    cold_region,
                    cold_table,
                    source: donor.host().to_string(),
                    target: receiver.host().to_string(),
                });
            }
        }

        None
    }

    /// Pick the receiver's most over-represented cold table and its first
    /// region. Strict comparison keeps the earliest table on ties.
    fn best_cold_candidate(
        &self,
        donor: &ServerState,
        receiver: &ServerState,
        hot_table: &str,
        averages: &HashMap<String, f64>,
    ) -> Option<(String, String)> {
        let mut best: Option<(String, String)> = None;
        let mut best_score = f64::NEG_INFINITY;

        for table in receiver.tables() {
            if table == hot_table {
                continue;
            }
            let Some(region) = receiver.regions(table).first() else {
                continue;
            };

            let avg = averages.get(table).copied().unwrap_or(0.0);
            let mut score = receiver.count(table) as f64 - avg;

            // Penalize tables the donor would end up oversubscribed on
            if (donor.count(table) + 1) as f64 > avg + 1.0 {
                score -= 0.5;
            }

            if score > best_score {
                best_score = score;
                best = Some((table.clone(), region.clone()));
            }
        }

        best
    }

    /// Apply both movements of a swap to the working copy.
    fn apply(&mut self, swap: &RegionSwap, hot_table: &str) {
        let donor_index = self.host_index[&swap.source];
        let receiver_index = self.host_index[&swap.target];

        self.servers[donor_index].remove_region(hot_table, &swap.hot_region);
        self.servers[receiver_index].add_region(hot_table, swap.hot_region.clone());

        self.servers[receiver_index].remove_region(&swap.cold_table, &swap.cold_region);
        self.servers[donor_index].add_region(&swap.cold_table, swap.cold_region.clone());
    }
}

/// Swap planner
pub struct SwapPlanner {
    config: PlannerConfig,
}

impl SwapPlanner {
    /// Create a new planner
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Compute a swap plan for `hot_table` against the snapshot.
    ///
    /// An empty snapshot yields an empty balanced plan; a snapshot without
    /// the hot table is an error. Planning never mutates the snapshot.
    #[instrument(skip(self, snapshot))]
    pub fn plan(&self, snapshot: &ClusterSnapshot, hot_table: &str) -> Result<SwapPlan> {
        if snapshot.is_empty() {
            return Ok(SwapPlan {
                hot_table: hot_table.to_string(),
                swaps: Vec::new(),
                outcome: PlanOutcome::Balanced,
            });
        }
        if snapshot.table_total(hot_table) == 0 {
            return Err(PlannerError::TableNotFound {
                table: hot_table.to_string(),
            });
        }

        let averages = snapshot.table_averages();
        let hot_avg = averages.get(hot_table).copied().unwrap_or(0.0);

        info!(
            hot_table,
            hot_avg,
            hot_regions = snapshot.table_total(hot_table),
            servers = snapshot.server_count(),
            "Computing swap plan"
        );

        let mut working = WorkingState::from_snapshot(snapshot);
        let mut swaps = Vec::new();
        let mut outcome = PlanOutcome::IterationCapReached;

        for _ in 0..self.config.max_iterations {
            let (donors, receivers) = working.classify(hot_table, hot_avg);
            if donors.is_empty() || receivers.is_empty() {
                outcome = PlanOutcome::Balanced;
                break;
            }

            let Some(swap) = working.find_swap(&donors, &receivers, hot_table, &averages) else {
                outcome = PlanOutcome::Stalled;
                break;
            };

            working.apply(&swap, hot_table);

            debug!(
                pair = swaps.len() + 1,
                hot_region = %swap.hot_region,
                cold_table = %swap.cold_table,
                source = %swap.source,
                target = %swap.target,
                "Swap planned"
            );
            swaps.push(swap);
        }

        if outcome == PlanOutcome::IterationCapReached {
            warn!(
                max_iterations = self.config.max_iterations,
                swaps = swaps.len(),
                "Iteration cap reached, plan truncated"
            );
        }

        let plan = SwapPlan {
            hot_table: hot_table.to_string(),
            swaps,
            outcome,
        };

        info!(summary = %plan.summary(), "Swap plan complete");

        Ok(plan)
    }
}

/// Plan with default configuration.
pub fn plan_swaps(snapshot: &ClusterSnapshot, hot_table: &str) -> Result<SwapPlan> {
    SwapPlanner::new(PlannerConfig::default()).plan(snapshot, hot_table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RegionAssignment;

    fn fact(table: &str, region: &str, host: &str) -> RegionAssignment {
        RegionAssignment {
            table: table.to_string(),
            region: region.to_string(),
            host: host.to_string(),
            port: 16020,
            start_code: 1740626070375,
        }
    }

    /// Build facts from a (host, table, count) grid; region names encode
    /// their origin so swap contents are predictable.
    fn grid(cells: &[(&str, &str, usize)]) -> Vec<RegionAssignment> {
        let mut facts = Vec::new();
        for &(host, table, count) in cells {
            for i in 0..count {
                facts.push(fact(table, &format!("{table}-{host}-{i}"), host));
            }
        }
        facts
    }

    #[test]
    fn test_planner_config_default() {
        let config = PlannerConfig::default();
        assert_eq!(config.max_iterations, 1000);
    }

    #[test]
    fn test_balances_with_uniform_cold_backfill() {
        // hot: s1=4, s2=0, avg 2; cold holds enough regions to trade back
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 4),
            ("s2", "cold", 4),
        ]));

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.outcome, PlanOutcome::Balanced);
        for swap in &plan.swaps {
            assert_eq!(swap.source, "s1");
            assert_eq!(swap.target, "s2");
            assert_eq!(swap.cold_table, "cold");
        }
        // Regions leave from the front of the donor's list
        assert_eq!(plan.swaps[0].hot_region, "hot-s1-0");
        assert_eq!(plan.swaps[1].hot_region, "hot-s1-1");
        assert_eq!(plan.swaps[0].cold_region, "cold-s2-0");
    }

    #[test]
    fn test_single_donor_feeds_two_receivers_evenly() {
        // hot {s1:10, s2:4, s3:4}, avg 6: four swaps, two per receiver,
        // alternating because receiver gaps re-sort after every swap
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 10),
            ("s2", "hot", 4),
            ("s3", "hot", 4),
            ("s2", "cold", 8),
            ("s3", "cold", 8),
        ]));

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.outcome, PlanOutcome::Balanced);
        assert!(plan.swaps.iter().all(|s| s.source == "s1"));
        let targets: Vec<&str> = plan.swaps.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, ["s2", "s3", "s2", "s3"]);
    }

    #[test]
    fn test_stalls_when_receiver_has_no_cold_regions() {
        // Receiver s2 holds one hot region and nothing else to trade back
        let mut facts = grid(&[("s1", "hot", 5), ("s1", "cold", 3)]);
        facts.push(fact("hot", "hot-s2-0", "s2"));
        let snapshot = ClusterSnapshot::from_assignments(facts);

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.outcome, PlanOutcome::Stalled);
    }

    #[test]
    fn test_already_balanced_yields_empty_plan() {
        // hot {5,5,5}: every server sits exactly at the average
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 5),
            ("s2", "hot", 5),
            ("s3", "hot", 5),
            ("s1", "cold", 1),
            ("s2", "cold", 2),
        ]));

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.outcome, PlanOutcome::Balanced);
    }

    #[test]
    fn test_missing_hot_table_is_error() {
        let snapshot = ClusterSnapshot::from_assignments(grid(&[("s1", "cold", 2)]));

        let err = plan_swaps(&snapshot, "hot").unwrap_err();
        assert!(matches!(err, PlannerError::TableNotFound { table } if table == "hot"));
    }

    #[test]
    fn test_empty_snapshot_yields_empty_balanced_plan() {
        let snapshot = ClusterSnapshot::from_assignments(Vec::new());

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.outcome, PlanOutcome::Balanced);
    }

    #[test]
    fn test_iteration_cap_truncates_plan() {
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 6),
            ("s2", "cold", 6),
        ]));

        let planner = SwapPlanner::new(PlannerConfig { max_iterations: 2 });
        let plan = planner.plan(&snapshot, "hot").unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.outcome, PlanOutcome::IterationCapReached);
    }

    #[test]
    fn test_donor_overshoot_penalty_flips_choice() {
        // avg(hot)=3: donor s1 (6), receiver s2 (0). On s2 both "a" (count 4,
        // avg 3, base score 1.0) and "b" (count 4, avg 10/3, base 0.667) are
        // candidates. Donor already holds 4 of "a", so taking one more
        // overshoots and costs 0.5, dropping "a" to 0.5. "b" wins only
        // because of the penalty.
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 6),
            ("s1", "a", 4),
            ("s1", "b", 3),
            ("s2", "a", 4),
            ("s2", "b", 4),
            ("s3", "hot", 3),
            ("s3", "a", 1),
            ("s3", "b", 3),
        ]));

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert!(!plan.is_empty());
        assert_eq!(plan.swaps[0].cold_table, "b");
        assert_eq!(plan.swaps[0].cold_region, "b-s2-0");
    }

    #[test]
    fn test_equal_gaps_keep_snapshot_order() {
        // Receivers s2 and s3 tie at gap 4/3; stable sort keeps s2 first
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 4),
            ("s2", "cold", 2),
            ("s3", "cold", 2),
        ]));

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert!(!plan.is_empty());
        assert_eq!(plan.swaps[0].target, "s2");
    }

    #[test]
    fn test_score_tie_keeps_first_seen_table() {
        // Both cold tables score identically on the receiver; the strict
        // comparison keeps the one seen first
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 2),
            ("s2", "c1", 1),
            ("s2", "c2", 1),
        ]));

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert!(!plan.is_empty());
        assert_eq!(plan.swaps[0].cold_table, "c1");
    }

    #[test]
    fn test_emptied_cold_list_skipped() {
        // c1 scores highest (0.5 vs -2.5 for c2) and leaves in the first
        // swap; later swaps must fall through to c2 even though c1 stays in
        // s2's table order with an empty region list
        let snapshot = ClusterSnapshot::from_assignments(grid(&[
            ("s1", "hot", 6),
            ("s1", "c2", 6),
            ("s2", "c1", 1),
            ("s2", "c2", 2),
        ]));

        let plan = plan_swaps(&snapshot, "hot").unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.outcome, PlanOutcome::Balanced);
        assert_eq!(plan.swaps[0].cold_table, "c1");
        assert_eq!(plan.swaps[1].cold_table, "c2");
        assert_eq!(plan.swaps[2].cold_table, "c2");
    }

    #[test]
    fn test_cold_table_counts_first_use_order() {
        let plan = SwapPlan {
            hot_table: "hot".to_string(),
            swaps: vec![
                RegionSwap {
                    hot_region: "h1".into(),
                    cold_region: "x1".into(),
                    cold_table: "x".into(),
                    source: "s1".into(),
                    target: "s2".into(),
                },
                RegionSwap {
                    hot_region: "h2".into(),
                    cold_region: "y1".into(),
                    cold_table: "y".into(),
                    source: "s1".into(),
                    target: "s2".into(),
                },
                RegionSwap {
                    hot_region: "h3".into(),
                    cold_region: "x2".into(),
                    cold_table: "x".into(),
                    source: "s1".into(),
                    target: "s3".into(),
                },
            ],
            outcome: PlanOutcome::Balanced,
        };

        assert_eq!(
            plan.cold_table_counts(),
            vec![("x".to_string(), 2), ("y".to_string(), 1)]
        );
        let summary = plan.summary();
        assert!(summary.contains("3 swaps"));
        assert!(summary.contains("2 cold tables"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        fn count_grid() -> impl Strategy<Value = Vec<Vec<usize>>> {
            // servers x tables, first table is the hot one
            (2usize..5, 2usize..4).prop_flat_map(|(servers, tables)| {
                proptest::collection::vec(
                    proptest::collection::vec(0usize..6, tables),
                    servers,
                )
            })
        }

        proptest! {
            #[test]
            fn replayed_plans_conserve_regions(cells in count_grid()) {
                let mut facts = Vec::new();
                for (s, row) in cells.iter().enumerate() {
                    for (t, &count) in row.iter().enumerate() {
                        for i in 0..count {
                            facts.push(fact(
                                &format!("t{t}"),
                                &format!("t{t}-s{s}-{i}"),
                                &format!("s{s}"),
                            ));
                        }
                    }
                }
                let snapshot = ClusterSnapshot::from_assignments(facts);
                prop_assume!(snapshot.table_total("t0") > 0);

                let plan = plan_swaps(&snapshot, "t0").unwrap();
                prop_assert!(plan.len() <= 1000);

                // Replay region-by-region, checking each swap is feasible at
                // its position in the sequence
                let mut state: HashMap<(String, String), Vec<String>> = HashMap::new();
                for server in snapshot.servers() {
                    for table in server.tables() {
                        state.insert(
                            (server.host().to_string(), table.to_string()),
                            server.regions(table).to_vec(),
                        );
                    }
                }

                let hot_avg = snapshot.table_average("t0");
                for swap in &plan.swaps {
                    prop_assert_ne!(&swap.source, &swap.target);

                    // Every swap moves a hot region from a server above the
                    // fixed average to one below it
                    let source_hot = state
                        .get(&(swap.source.clone(), "t0".to_string()))
                        .map_or(0, Vec::len);
                    let target_hot = state
                        .get(&(swap.target.clone(), "t0".to_string()))
                        .map_or(0, Vec::len);
                    prop_assert!((source_hot as f64) > hot_avg);
                    prop_assert!((target_hot as f64) < hot_avg);

                    let hot_key = (swap.source.clone(), "t0".to_string());
                    let hot_list = state.get_mut(&hot_key).expect("donor hosts hot table");
                    let pos = hot_list.iter().position(|r| r == &swap.hot_region)
                        .expect("hot region present on donor");
                    hot_list.remove(pos);
                    state.entry((swap.target.clone(), "t0".to_string()))
                        .or_default()
                        .push(swap.hot_region.clone());

                    let cold_key = (swap.target.clone(), swap.cold_table.clone());
                    let cold_list = state.get_mut(&cold_key).expect("receiver hosts cold table");
                    let pos = cold_list.iter().position(|r| r == &swap.cold_region)
                        .expect("cold region present on receiver");
                    cold_list.remove(pos);
                    state.entry((swap.source.clone(), swap.cold_table.clone()))
                        .or_default()
                        .push(swap.cold_region.clone());
                }

                // Per-table totals are unchanged after the full replay
                for table in snapshot.tables() {
                    let replayed: usize = state
                        .iter()
                        .filter(|((_, t), _)| t == table)
                        .map(|(_, regions)| regions.len())
                        .sum();
                    prop_assert_eq!(replayed, snapshot.table_total(table));
                }
            }
        }
    }
}
