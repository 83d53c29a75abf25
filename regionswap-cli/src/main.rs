//! RegionSwap CLI
//!
//! Reads an hbase:meta dump, plans pairwise region swaps that flatten one
//! table's distribution, and writes the matching hbase-shell move script.
//!
//! # Usage
//! ```text
//! regionswap meta_dump.txt --hot-table search:ads
//! regionswap meta_dump.txt --hot-table search:ads --dry-run
//! regionswap meta_dump.txt --hot-table search:ads -o swap.rb
//! ```

mod report;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::info;

use regionswap_core::{
    project_plan, render_move_script, ClusterSnapshot, PlanOutcome, PlannerConfig, SwapPlan,
    SwapPlanner,
};
use regionswap_meta::parse_meta_file;

#[derive(Parser)]
#[command(name = "regionswap")]
#[command(about = "Generates hbase-shell swap plans that balance a hot table")]
#[command(version)]
struct Cli {
    /// Meta dump file (from: echo "scan 'hbase:meta'" | hbase shell)
    meta_file: PathBuf,

    /// Table whose regions should be spread evenly
    #[arg(long)]
    hot_table: String,

    /// Output script file
    #[arg(short, long, default_value = "move_plan.rb")]
    output: PathBuf,

    /// Analyze and report only, write no file
    #[arg(long)]
    dry_run: bool,

    /// Emit the plan as JSON instead of the styled report
    #[arg(long)]
    json: bool,

    /// Maximum planning iterations (one swap each)
    #[arg(long, default_value = "1000")]
    max_iterations: usize,
}

fn main() {
    // Initialize logging. Logs go to stderr so --json output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{} {e:#}", style("Error:").red().bold());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if !cli.json {
        println!("Analyzing {}...", cli.meta_file.display());
    }

    let facts = parse_meta_file(&cli.meta_file)?;
    let snapshot = ClusterSnapshot::from_assignments(facts);

    // Input errors are terminal before any planning happens
    if snapshot.is_empty() {
        anyhow::bail!("No regions found in meta dump {}", cli.meta_file.display());
    }
    let hot_total = snapshot.table_total(&cli.hot_table);
    if hot_total == 0 {
        anyhow::bail!("Table '{}' not found in meta dump", cli.hot_table);
    }

    if !cli.json {
        println!();
        println!(
            "Found {} servers, {} regions",
            snapshot.server_count(),
            snapshot.region_count()
        );
        println!("Hot table '{}' has {} regions", cli.hot_table, hot_total);

        report::print_distribution(
            "Current",
            &cli.hot_table,
            &report::distribution_rows(&snapshot, &cli.hot_table),
            snapshot.table_average(&cli.hot_table),
        );
    }

    let planner = SwapPlanner::new(PlannerConfig {
        max_iterations: cli.max_iterations,
    });
    let plan = planner.plan(&snapshot, &cli.hot_table)?;

    if cli.json {
        print_json(&snapshot, &plan, hot_total)?;
    } else {
        print_plan_report(cli, &snapshot, &plan);
    }

    // An empty plan writes no file, balanced and stalled alike
    if plan.is_empty() {
        return Ok(());
    }

    if cli.dry_run {
        if !cli.json {
            println!();
            println!("[Dry run mode - no file generated]");
        }
        return Ok(());
    }

    let script = render_move_script(&plan, snapshot.identities());
    fs::write(&cli.output, script)
        .with_context(|| format!("Failed to write plan to {}", cli.output.display()))?;

    info!(
        output = %cli.output.display(),
        swaps = plan.len(),
        "Plan written"
    );

    if !cli.json {
        println!();
        println!("Done! Plan saved to {}", cli.output.display());
        println!("Run it with: hbase shell {}", cli.output.display());
    }

    Ok(())
}

/// Print everything that comes after planning: outcome notices, the swap
/// listing, and the projected distributions.
fn print_plan_report(cli: &Cli, snapshot: &ClusterSnapshot, plan: &SwapPlan) {
    match plan.outcome {
        PlanOutcome::IterationCapReached => {
            println!();
            println!(
                "{} Plan truncated at {} iterations; re-run after applying to continue balancing",
                style("!").yellow().bold(),
                cli.max_iterations
            );
        }
        PlanOutcome::Stalled if !plan.is_empty() => {
            println!();
            println!(
                "{} Planning stalled after {} swaps: no feasible donor/receiver pairing remains",
                style("!").yellow().bold(),
                plan.len()
            );
        }
        _ => {}
    }

    if plan.is_empty() {
        println!();
        match plan.outcome {
            PlanOutcome::Stalled => println!(
                "No feasible swaps for '{}': receivers hold no cold regions to trade",
                cli.hot_table
            ),
            _ => println!("'{}' is already balanced, no swaps needed", cli.hot_table),
        }
        return;
    }

    report::print_swap_listing(plan);
    report::print_cold_table_stats(plan);

    let projected = project_plan(snapshot, plan);
    report::print_distribution(
        "Projected",
        &plan.hot_table,
        &report::projected_rows(&projected, &plan.hot_table),
        snapshot.table_average(&plan.hot_table),
    );
    report::print_cold_table_changes(snapshot, &projected, plan);
}

/// Print the machine-readable plan document.
fn print_json(snapshot: &ClusterSnapshot, plan: &SwapPlan, hot_total: usize) -> Result<()> {
    let cold_tables: Vec<_> = plan
        .cold_table_counts()
        .into_iter()
        .map(|(table, swaps)| serde_json::json!({ "table": table, "swaps": swaps }))
        .collect();

    let projected = project_plan(snapshot, plan);
    let mut projected_doc = serde_json::Map::new();
    for host in projected.hosts() {
        let mut tables = serde_json::Map::new();
        for table in snapshot.tables() {
            tables.insert(table.clone(), projected.count(host, table).into());
        }
        projected_doc.insert(host.clone(), serde_json::Value::Object(tables));
    }

    let doc = serde_json::json!({
        "hot_table": plan.hot_table,
        "servers": snapshot.server_count(),
        "regions": snapshot.region_count(),
        "hot_regions": hot_total,
        "outcome": plan.outcome,
        "swaps": plan.swaps,
        "cold_tables": cold_tables,
        "projected": projected_doc,
    });

    println!("{}", serde_json::to_string_pretty(&doc)?);

    Ok(())
}
