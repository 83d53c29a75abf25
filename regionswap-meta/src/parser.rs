//! Meta dump parser
//!
//! Line-oriented extraction over hbase-shell scan output. Rows interleave
//! one line per cell; the parser pairs each region's `info:server` line with
//! the `info:serverstartcode` line that follows it and emits exactly one
//! fact per completed region. Regions whose startcode never shows up are
//! dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use regionswap_core::{is_internal_table, RegionAssignment};

/// Parser errors
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Failed to read meta dump {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MetaError>;

lazy_static! {
    // Example row:
    //  search:ads,,1638534531339.b9eab026....  column=info:server, timestamp=1755674711320, value=aws-ir1-hbase12:16020
    static ref SERVER_RE: Regex = Regex::new(
        r"^\s*(\S+),.*\.([a-f0-9]+)\.\s+column=info:server,\s*timestamp=\d+,\s*value=([^:]+):(\d+)"
    )
    .unwrap();
    static ref STARTCODE_RE: Regex = Regex::new(
        r"^\s*(\S+),.*\.([a-f0-9]+)\.\s+column=info:serverstartcode,\s*timestamp=\d+,\s*value=(\d+)"
    )
    .unwrap();
}

/// Partially-assembled region, waiting for its startcode cell.
struct PendingRegion {
    table: String,
    host: String,
    port: u16,
}

/// Parse scan output already held in memory.
///
/// Rows of the reserved internal namespace are dropped here, before a fact
/// ever forms (the snapshot builder guards against them again for facts from
/// other producers). Repeated `info:server` lines for one region keep the
/// latest value, and a region emits at most one fact no matter how many
/// startcode lines the dump carries for it.
pub fn parse_meta_text(text: &str) -> Vec<RegionAssignment> {
    let mut pending: HashMap<String, PendingRegion> = HashMap::new();
    let mut facts = Vec::new();

    for line in text.lines() {
        if let Some(caps) = SERVER_RE.captures(line) {
            let full_table = &caps[1];
            // Row keys embed the start key after the first comma
            let table = full_table.split(',').next().unwrap_or(full_table);

            if is_internal_table(table) {
                continue;
            }

            let Ok(port) = caps[4].parse::<u16>() else {
                warn!(line, "Skipping info:server line with unparseable port");
                continue;
            };

            pending.insert(
                caps[2].to_string(),
                PendingRegion {
                    table: table.to_string(),
                    host: caps[3].to_string(),
                    port,
                },
            );
            continue;
        }

        if let Some(caps) = STARTCODE_RE.captures(line) {
            let region = &caps[2];
            let Ok(start_code) = caps[3].parse::<u64>() else {
                warn!(line, "Skipping info:serverstartcode line with unparseable value");
                continue;
            };

            if let Some(entry) = pending.remove(region) {
                facts.push(RegionAssignment {
                    table: entry.table,
                    region: region.to_string(),
                    host: entry.host,
                    port: entry.port,
                    start_code,
                });
            }
        }
    }

    if !pending.is_empty() {
        debug!(
            incomplete = pending.len(),
            "Dropped regions with info:server but no startcode"
        );
    }

    facts
}

/// Parse a meta dump file produced by `echo "scan 'hbase:meta'" | hbase shell`.
pub fn parse_meta_file(path: &Path) -> Result<Vec<RegionAssignment>> {
    let text = fs::read_to_string(path).map_err(|source| MetaError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let facts = parse_meta_text(&text);
    info!(
        path = %path.display(),
        facts = facts.len(),
        "Parsed meta dump"
    );

    Ok(facts)
}
