//! Distribution snapshot
//!
//! Immutable-once-built view of which regions of which tables sit on which
//! servers, with per-server per-table counts and region lists. Built once
//! from parsed assignment facts; the planner works on a private copy, so the
//! original snapshot stays available for before/after comparison.

use std::collections::HashMap;

use tracing::debug;

/// Namespace prefix of the storage system's own bookkeeping tables.
pub const INTERNAL_TABLE_PREFIX: &str = "hbase:";

/// Check whether a table name belongs to the reserved internal namespace.
pub fn is_internal_table(table: &str) -> bool {
    table.starts_with(INTERNAL_TABLE_PREFIX)
}

/// One region-to-server assignment fact from the meta dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionAssignment {
    /// Table the region belongs to
    pub table: String,
    /// Encoded region name (the trailing hex component of the meta row key)
    pub region: String,
    /// Short host identifier of the hosting server
    pub host: String,
    /// Server port
    pub port: u16,
    /// Server start code
    pub start_code: u64,
}

impl RegionAssignment {
    /// Full cluster identity of the hosting server (`host,port,startcode`),
    /// the form hbase-shell `move` directives require.
    pub fn server_identity(&self) -> String {
        format!("{},{},{}", self.host, self.port, self.start_code)
    }
}

/// One server's holdings: per-table region counts and region lists.
///
/// Tables are kept in first-seen order so that iteration, and therefore
/// planning, is deterministic given input order.
#[derive(Debug, Clone)]
pub struct ServerState {
    host: String,
    /// Table names in first-seen order
    table_order: Vec<String>,
    /// Region count per table
    counts: HashMap<String, usize>,
    /// Region identifiers per table, in arrival order
    regions: HashMap<String, Vec<String>>,
}

impl ServerState {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            table_order: Vec::new(),
            counts: HashMap::new(),
            regions: HashMap::new(),
        }
    }

    /// Short host identifier of this server.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Tables this server has hosted, in first-seen order.
    pub fn tables(&self) -> &[String] {
        &self.table_order
    }

    /// Current region count of `table` on this server.
    pub fn count(&self, table: &str) -> usize {
        self.counts.get(table).copied().unwrap_or(0)
    }

    /// Region identifiers of `table` on this server.
    pub fn regions(&self, table: &str) -> &[String] {
        self.regions.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn add_region(&mut self, table: &str, region: String) {
        if !self.counts.contains_key(table) {
            self.table_order.push(table.to_string());
        }
        *self.counts.entry(table.to_string()).or_insert(0) += 1;
        self.regions.entry(table.to_string()).or_default().push(region);
    }

    /// Remove one region by identifier. Returns false when the region is not
    /// hosted here, leaving the state untouched.
    pub(crate) fn remove_region(&mut self, table: &str, region: &str) -> bool {
        let Some(list) = self.regions.get_mut(table) else {
            return false;
        };
        let Some(pos) = list.iter().position(|r| r == region) else {
            return false;
        };
        list.remove(pos);
        if let Some(count) = self.counts.get_mut(table) {
            *count = count.saturating_sub(1);
        }
        true
    }
}

/// Host → full identity map, used only when rendering the move script.
#[derive(Debug, Clone, Default)]
pub struct ServerIdentities {
    full_names: HashMap<String, String>,
}

impl ServerIdentities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, host: String, full_name: String) {
        self.full_names.insert(host, full_name);
    }

    /// Resolve a host to its full cluster identity. Hosts with no recorded
    /// identity pass through verbatim, so a partially-resolved snapshot still
    /// yields a usable script.
    pub fn resolve<'a>(&'a self, host: &'a str) -> &'a str {
        self.full_names.get(host).map(String::as_str).unwrap_or(host)
    }

    pub fn len(&self) -> usize {
        self.full_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full_names.is_empty()
    }
}

impl FromIterator<(String, String)> for ServerIdentities {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            full_names: iter.into_iter().collect(),
        }
    }
}

/// Point-in-time view of region-to-server assignments for the whole cluster.
///
/// Built once from assignment facts and read-only afterwards. Facts for the
/// internal namespace are discarded during construction. Servers and tables
/// keep first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    servers: Vec<ServerState>,
    host_index: HashMap<String, usize>,
    /// Known (non-internal) tables in first-seen order
    tables: Vec<String>,
    table_totals: HashMap<String, usize>,
    identities: ServerIdentities,
}

impl ClusterSnapshot {
    /// Build a snapshot from assignment facts. Zero facts yield an explicitly
    /// empty snapshot; callers must treat that as an input error, never as
    /// "balanced".
    pub fn from_assignments<I>(facts: I) -> Self
    where
        I: IntoIterator<Item = RegionAssignment>,
    {
        let mut snapshot = Self::default();

        for fact in facts {
            if is_internal_table(&fact.table) {
                debug!(
                    table = %fact.table,
                    region = %fact.region,
                    "Discarding internal-namespace assignment"
                );
                continue;
            }

            snapshot
                .identities
                .insert(fact.host.clone(), fact.server_identity());

            let index = match snapshot.host_index.get(&fact.host) {
                Some(&index) => index,
                None => {
                    let index = snapshot.servers.len();
                    snapshot.host_index.insert(fact.host.clone(), index);
                    snapshot.servers.push(ServerState::new(&fact.host));
                    index
                }
            };

            if !snapshot.table_totals.contains_key(&fact.table) {
                snapshot.tables.push(fact.table.clone());
            }
            *snapshot.table_totals.entry(fact.table.clone()).or_insert(0) += 1;

            snapshot.servers[index].add_region(&fact.table, fact.region);
        }

        snapshot
    }

    /// True when the snapshot holds no servers at all.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Total regions across all servers and tables.
    pub fn region_count(&self) -> usize {
        self.table_totals.values().sum()
    }

    /// All servers, in first-seen order.
    pub fn servers(&self) -> &[ServerState] {
        &self.servers
    }

    pub fn server(&self, host: &str) -> Option<&ServerState> {
        self.host_index.get(host).map(|&index| &self.servers[index])
    }

    /// All known tables, in first-seen order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Total region count of `table` across all servers.
    pub fn table_total(&self, table: &str) -> usize {
        self.table_totals.get(table).copied().unwrap_or(0)
    }

    /// Global average region count of `table` per server.
    ///
    /// Swaps relocate regions in count-preserving pairs, so averages computed
    /// from this snapshot stay valid for a whole planning run.
    pub fn table_average(&self, table: &str) -> f64 {
        if self.servers.is_empty() {
            0.0
        } else {
            self.table_total(table) as f64 / self.servers.len() as f64
        }
    }

    /// Averages for every known table, computed in one pass.
    pub fn table_averages(&self) -> HashMap<String, f64> {
        self.tables
            .iter()
            .map(|table| (table.clone(), self.table_average(table)))
            .collect()
    }

    /// Host → full identity map for script rendering.
    pub fn identities(&self) -> &ServerIdentities {
        &self.identities
    }
}
