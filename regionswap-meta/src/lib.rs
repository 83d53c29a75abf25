//! RegionSwap Meta
//!
//! Turns `scan 'hbase:meta'` shell output into region assignment facts.
//! A region is assembled from two meta cells: the `info:server` cell gives
//! table, encoded name, host and port, and the `info:serverstartcode` cell
//! completes the server identity. Everything else in the dump is noise and
//! gets skipped.

pub mod parser;

// Re-export main types
pub use parser::{parse_meta_file, parse_meta_text, MetaError};
