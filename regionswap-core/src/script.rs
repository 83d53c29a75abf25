//! Plan Exporter
//!
//! Renders a swap plan as an hbase-shell script: the balancer is switched
//! off up front, every swap becomes a commented pair of `move` directives,
//! and the re-enable line at the bottom stays commented out so an operator
//! has to verify before turning the balancer back on.

use crate::planner::SwapPlan;
use crate::snapshot::ServerIdentities;

/// Render the hbase-shell move script for a plan.
///
/// Move targets use full server identities (`host,port,startcode`) resolved
/// through `identities`; hosts without a recorded identity pass through
/// verbatim.
pub fn render_move_script(plan: &SwapPlan, identities: &ServerIdentities) -> String {
    let mut script = String::new();

    script.push_str("# Auto-generated swap plan for balancing\n");
    script.push_str(&format!("# Hot table: {}\n", plan.hot_table));
    script.push_str(&format!("# Total swaps: {}\n\n", plan.len()));
    script.push_str("balance_switch false\n\n");

    for (i, swap) in plan.swaps.iter().enumerate() {
        let source_full = identities.resolve(&swap.source);
        let target_full = identities.resolve(&swap.target);

        script.push_str(&format!(
            "# Pair {}: {} ({} -> {}), {} ({} -> {})\n",
            i + 1,
            plan.hot_table,
            swap.source,
            swap.target,
            swap.cold_table,
            swap.target,
            swap.source
        ));
        script.push_str(&format!("move '{}', '{}'\n", swap.hot_region, target_full));
        script.push_str(&format!("move '{}', '{}'\n\n", swap.cold_region, source_full));
    }

    script.push_str("# balance_switch true # Uncomment to enable after verification\n");

    script
}
