//! Host to rack resolution used to rank replica endpoints.

use crate::errors::{FsError, FsResult};
use std::{collections::HashMap, path::Path};
use tokio::fs;

/// Rack reported for hosts missing from the topology.
pub const DEFAULT_RACK: &str = "/default-rack";

/// Maps a host address to a rack path such as `/dc1/rack3`.
pub trait RackResolver: Send + Sync {
    fn resolve(&self, host: &str) -> String;
}

/// Static host to rack table.
#[derive(Clone, Debug, Default)]
pub struct TableRackResolver {
    racks: HashMap<String, String>,
}

impl TableRackResolver {
    pub fn new(racks: HashMap<String, String>) -> Self {
        Self { racks }
    }

    /// Parse `host rack` lines; blank lines and `#` comments are skipped.
    pub fn parse(table: &str) -> FsResult<Self> {
        let mut racks = HashMap::new();
        for (line_no, line) in table.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut columns = line.split_whitespace();
            match (columns.next(), columns.next(), columns.next()) {
                (Some(host), Some(rack), None) if rack.starts_with('/') => {
                    racks.insert(host.to_string(), rack.to_string());
                }
                _ => {
                    return Err(FsError::Configuration(format!(
                        "rack table line {}: expected `<host> </rack/path>`",
                        line_no + 1
                    )));
                }
            }
        }
        Ok(Self { racks })
    }

    pub async fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let table = fs::read_to_string(path.as_ref()).await?;
        Self::parse(&table)
    }
}

impl RackResolver for TableRackResolver {
    fn resolve(&self, host: &str) -> String {
        self.racks
            .get(host)
            .cloned()
            .unwrap_or_else(|| DEFAULT_RACK.to_string())
    }
}
