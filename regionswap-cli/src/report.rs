//! Distribution reports
//!
//! Console rendering for distributions, the swap listing, and before/after
//! comparisons of the cold tables a plan touches. Output stays line-oriented
//! so it reads well in scrollback and pipes cleanly into grep.

use console::style;

use regionswap_core::{ClusterSnapshot, ProjectedCounts, SwapPlan};

/// Per-server counts of `table` as (host, count) rows, in snapshot order.
pub fn distribution_rows(snapshot: &ClusterSnapshot, table: &str) -> Vec<(String, usize)> {
    snapshot
        .servers()
        .iter()
        .map(|server| (server.host().to_string(), server.count(table)))
        .collect()
}

/// Projected per-server counts of `table` as (host, count) rows.
pub fn projected_rows(projected: &ProjectedCounts, table: &str) -> Vec<(String, usize)> {
    projected
        .hosts()
        .iter()
        .map(|host| (host.clone(), projected.count(host, table)))
        .collect()
}

/// Print one table's per-server distribution, most loaded first; servers
/// with equal counts list alphabetically.
pub fn print_distribution(label: &str, table: &str, rows: &[(String, usize)], avg: f64) {
    println!();
    println!(
        "{}",
        style(format!("=== {label} {table} distribution (avg={avg:.1}) ===")).bold()
    );

    let mut rows = rows.to_vec();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    for (host, count) in rows {
        let diff = count as f64 - avg;
        let sign = if diff > 0.0 { "+" } else { "" };
        println!("  {host}: {} regions ({sign}{diff:.1})", style(count).cyan());
    }
}

/// Print the numbered swap listing.
pub fn print_swap_listing(plan: &SwapPlan) {
    println!();
    println!(
        "{}",
        style(format!("=== Swap plan ({} pairs) ===", plan.len())).bold()
    );

    for (i, swap) in plan.swaps.iter().enumerate() {
        println!(
            "  {}. {}:{}... ({} -> {})",
            i + 1,
            plan.hot_table,
            short(&swap.hot_region),
            swap.source,
            swap.target
        );
        println!(
            "     swap: {}:{}... ({} -> {})",
            swap.cold_table,
            short(&swap.cold_region),
            swap.target,
            swap.source
        );
    }
}

/// Print how many regions each cold table gives up, most affected first.
pub fn print_cold_table_stats(plan: &SwapPlan) {
    println!();
    println!("{}", style("=== Swapped cold tables ===").bold());

    let mut stats = plan.cold_table_counts();
    stats.sort_by(|a, b| b.1.cmp(&a.1));

    for (table, count) in stats {
        println!("  {table}: {count} regions");
    }
}

/// Print before/after rows for every cold table the plan touches, skipping
/// servers that neither changed nor sit notably off the table's average.
pub fn print_cold_table_changes(
    snapshot: &ClusterSnapshot,
    projected: &ProjectedCounts,
    plan: &SwapPlan,
) {
    println!();
    println!("{}", style("=== Cold table distribution changes ===").bold());

    let mut stats = plan.cold_table_counts();
    stats.sort_by(|a, b| b.1.cmp(&a.1));

    let mut hosts: Vec<&str> = snapshot
        .servers()
        .iter()
        .map(|server| server.host())
        .collect();
    hosts.sort_unstable();

    for (table, swapped) in stats {
        println!();
        println!("[{table}] ({swapped} regions swapped)");

        let avg = snapshot.table_average(&table);
        for host in &hosts {
            let before = snapshot
                .server(host)
                .map(|server| server.count(&table))
                .unwrap_or(0);
            let after = projected.count(host, &table);
            let diff_before = before as f64 - avg;
            let diff_after = after as f64 - avg;

            if before == after && diff_after.abs() <= 0.5 {
                continue;
            }

            let sign_before = if diff_before > 0.0 { "+" } else { "" };
            if before == after {
                println!("  {host}: {before} ({sign_before}{diff_before:.1})");
            } else {
                let sign_after = if diff_after > 0.0 { "+" } else { "" };
                println!(
                    "  {host}: {before} ({sign_before}{diff_before:.1}) -> {after} ({sign_after}{diff_after:.1})"
                );
            }
        }
    }
}

fn short(region: &str) -> &str {
    region.get(..8).unwrap_or(region)
}
