//! RegionSwap Core
//!
//! Balance-planning engine for hotspotted HBase tables. Given a snapshot of
//! region-to-server assignments, the engine:
//! - Classifies servers as donors or receivers of the hot table
//! - Greedily selects pairwise swaps (one hot region out, one cold region back)
//! - Simulates the cumulative effect for projected-distribution reporting
//! - Renders the finished plan as an hbase-shell move script
//!
//! Everything here is pure in-memory computation: the engine performs no I/O
//! and never talks to a live cluster.

pub mod planner;
pub mod script;
pub mod simulator;
pub mod snapshot;

// Re-export main types
pub use planner::{
    plan_swaps, PlanOutcome, PlannerConfig, PlannerError, RegionSwap, SwapPlan, SwapPlanner,
};
pub use script::render_move_script;
pub use simulator::{project_counts, project_plan, ProjectedCounts};
pub use snapshot::{
    is_internal_table, ClusterSnapshot, RegionAssignment, ServerIdentities, ServerState,
};
