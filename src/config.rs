//! Defaults and the per-scan configuration bundle.

use std::time::Duration;

use crate::resolve;

/// Port specification used by the CLI when `--ports` is not given.
pub const DEFAULT_PORT_SPEC: &str = "1-1024";
/// Max in-flight probes for a CLI scan.
pub const DEFAULT_CONCURRENCY: usize = 500;
/// Per-connection timeout for a CLI scan.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Banner read window. Fixed, and independent of the connect timeout.
pub const BANNER_TIMEOUT: Duration = Duration::from_millis(350);
/// Max bytes read from an open port when grabbing a banner.
pub const BANNER_MAX_BYTES: usize = 1024;

/// HTTP endpoint defaults.
pub const HTTP_DEFAULT_TARGET: &str = "127.0.0.1";
pub const HTTP_DEFAULT_PORT_SPEC: &str = "22,80,443";
pub const HTTP_CONCURRENCY: usize = 200;
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(1);
pub const HTTP_DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Immutable description of one scan invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Hostname or IP as supplied by the caller.
    pub target: String,
    /// Address actually connected to. Equal to `target` when resolution failed.
    pub host_ip: String,
    /// Ascending, unique.
    pub ports: Vec<u16>,
    /// Hard ceiling on simultaneously running probes, at least 1.
    pub concurrency: usize,
    pub timeout: Duration,
}

impl ScanConfig {
    /// Build a configuration, resolving `target` once.
    ///
    /// Ports are sorted and deduplicated and the concurrency bound is floored at 1.
    pub async fn resolve(
        target: impl Into<String>,
        ports: &[u16],
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        let target = target.into();
        let host_ip = resolve::resolve_host(&target).await;
        Self::with_host_ip(target, host_ip, ports, concurrency, timeout)
    }

    /// Build a configuration for an already resolved address.
    pub fn with_host_ip(
        target: impl Into<String>,
        host_ip: impl Into<String>,
        ports: &[u16],
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        let mut ports = ports.to_vec();
        ports.sort_unstable();
        ports.dedup();
        Self {
            target: target.into(),
            host_ip: host_ip.into(),
            ports,
            concurrency: concurrency.max(1),
            timeout,
        }
    }
}
