use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Outcome of probing one port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: u16,
    pub open: bool,
    /// Only ever set when `open` is true and the peer sent something printable.
    pub banner: Option<String>,
}

impl ProbeResult {
    pub fn open(port: u16, banner: Option<String>) -> Self {
        Self {
            port,
            open: true,
            banner,
        }
    }

    pub fn closed(port: u16) -> Self {
        Self {
            port,
            open: false,
            banner: None,
        }
    }
}

/// A finished scan, as printed by the CLI and written to disk as JSON.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub target: String,
    pub host_ip: String,
    /// RFC 3339 UTC timestamp taken when the report was built.
    pub scanned_at: String,
    pub results: Vec<ProbeResult>,
}

impl ScanReport {
    pub fn new(
        target: impl Into<String>,
        host_ip: impl Into<String>,
        results: Vec<ProbeResult>,
    ) -> Self {
        Self {
            target: target.into(),
            host_ip: host_ip.into(),
            scanned_at: now_rfc3339(),
            results,
        }
    }

    /// Order results by port number.
    pub fn sorted(mut self) -> Self {
        self.results.sort_by_key(|r| r.port);
        self
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.open)
    }

    /// Write the report as indented JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, self)
            .with_context(|| format!("failed to serialize report to {}", path.display()))?;
        out.flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
