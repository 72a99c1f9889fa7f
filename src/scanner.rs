use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::probe::{self, Connector, TcpConnector};
use crate::types::ProbeResult;

/// Scan `ports` on `target` with at most `concurrency` probes in flight.
///
/// Resolves the target once, then returns one result per unique port, in completion order.
pub async fn scan(
    target: &str,
    ports: &[u16],
    concurrency: usize,
    timeout: Duration,
) -> Vec<ProbeResult> {
    Scanner::new(target, ports, concurrency, timeout)
        .await
        .scan()
        .await
}

/// Bounded-concurrency TCP connect scanner for a single target.
///
/// - Limits in-flight probes with a `Semaphore` created per scan call, so concurrent scans
///   (e.g. parallel HTTP requests) never share a budget.
/// - Every requested port yields exactly one [`ProbeResult`], whatever happens to its probe.
pub struct Scanner<C = TcpConnector> {
    config: ScanConfig,
    connector: Arc<C>,
}

impl Scanner<TcpConnector> {
    /// Resolve `target` and build a scanner that connects over plain TCP.
    pub async fn new(
        target: impl Into<String>,
        ports: &[u16],
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self::from_config(ScanConfig::resolve(target, ports, concurrency, timeout).await)
    }

    pub fn from_config(config: ScanConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Scanner<C> {
    pub fn with_connector(config: ScanConfig, connector: C) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Probe every configured port and collect the results.
    pub async fn scan(&self) -> Vec<ProbeResult> {
        // `pending()` never resolves, so the scan always runs to completion.
        self.run(std::future::pending()).await.unwrap_or_default()
    }

    /// Like [`Scanner::scan`], but gives up as soon as `cancel` fires.
    ///
    /// In-flight probes are aborted and no partial results are returned.
    pub async fn scan_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<ProbeResult>, ScanError> {
        self.run(cancel.cancelled()).await
    }

    async fn run<F>(&self, stop: F) -> Result<Vec<ProbeResult>, ScanError>
    where
        F: Future<Output = ()>,
    {
        let cfg = &self.config;
        let started = Instant::now();
        let sem = Arc::new(Semaphore::new(cfg.concurrency));
        let host: Arc<str> = Arc::from(cfg.host_ip.as_str());
        let mut set = JoinSet::new();

        debug!(
            scan_target = %cfg.target,
            host_ip = %cfg.host_ip,
            ports = cfg.ports.len(),
            concurrency = cfg.concurrency,
            timeout = ?cfg.timeout,
            "starting scan"
        );

        for &port in &cfg.ports {
            let sem = sem.clone();
            let host = host.clone();
            let connector = self.connector.clone();
            let timeout = cfg.timeout;

            set.spawn(async move {
                // Held until the probe finishes, even if it panics or is aborted.
                let _permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ProbeResult::closed(port),
                };
                probe::probe(connector.as_ref(), &host, port, timeout).await
            });
        }

        let mut outstanding: BTreeSet<u16> = cfg.ports.iter().copied().collect();
        let mut results = Vec::with_capacity(cfg.ports.len());
        tokio::pin!(stop);

        loop {
            let joined = tokio::select! {
                biased;
                _ = &mut stop => {
                    set.abort_all();
                    info!(
                        scan_target = %cfg.target,
                        finished = results.len(),
                        remaining = outstanding.len(),
                        "scan interrupted"
                    );
                    return Err(ScanError::Interrupted);
                }
                joined = set.join_next() => joined,
            };
            match joined {
                None => break,
                Some(Ok(result)) => {
                    if outstanding.remove(&result.port) {
                        results.push(result);
                    }
                }
                Some(Err(e)) => warn!(error = %e, "probe task failed"),
            }
        }

        // Ports whose task died without reporting still get a result.
        for port in outstanding {
            warn!(port, "no probe result, recording as closed");
            results.push(ProbeResult::closed(port));
        }

        info!(
            scan_target = %cfg.target,
            scanned = results.len(),
            open = results.iter().filter(|r| r.open).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );
        Ok(results)
    }
}
