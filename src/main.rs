use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use harbor_scan::config::{DEFAULT_CONCURRENCY, DEFAULT_PORT_SPEC, HTTP_DEFAULT_BIND};
use harbor_scan::server::{self, ServerSettings};
use harbor_scan::{logging, parse_ports, ScanError, ScanReport, Scanner};

/// Exit status for a malformed `--ports` value.
const EXIT_BAD_PORTS: u8 = 2;
/// Exit status when the operator aborts a running scan.
const EXIT_INTERRUPTED: u8 = 1;

/// harbor-scan: async TCP connect scanner with banner grabbing.
///
/// Only scan hosts you own or are authorized to test.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "harbor-scan",
    version,
    about = "Async TCP connect scanner with banner grabbing.",
    long_about = None
)]
struct Cli {
    /// Hostname or IP of the target (e.g. 127.0.0.1).
    #[arg(long, required_unless_present = "serve")]
    target: Option<String>,

    /// Ports to probe, e.g. `22,80,1000-1020`.
    #[arg(long, default_value = DEFAULT_PORT_SPEC)]
    ports: String,

    /// Max concurrent connection attempts.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-connection timeout in seconds (fractions allowed).
    #[arg(long, default_value = "1.0", value_parser = parse_timeout)]
    timeout: Duration,

    /// Write the full report as pretty JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Serve the HTTP scan endpoint instead of running a scan.
    #[arg(
        long,
        value_name = "ADDR",
        num_args = 0..=1,
        default_missing_value = HTTP_DEFAULT_BIND
    )]
    serve: Option<String>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long = "log-level", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(bind) = cli.serve.as_deref() {
        println!("Serving scan endpoint at http://{bind} (Ctrl+C to stop)");
        server::serve(bind, ServerSettings::default()).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let target = cli.target.as_deref().context("--target is required")?;
    let ports = match parse_ports(&cli.ports) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error parsing ports: {e}");
            return Ok(ExitCode::from(EXIT_BAD_PORTS));
        }
    };

    // Ctrl-C cancels the scan; we report it instead of dying mid-output.
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    scan_target(&cli, target, &ports, cancel).await
}

async fn scan_target(
    cli: &Cli,
    target: &str,
    ports: &[u16],
    cancel: CancellationToken,
) -> Result<ExitCode> {
    // Resolution can stall on slow DNS, so it honours Ctrl-C too.
    let scanner = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            println!("Scan interrupted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        scanner = Scanner::new(target, ports, cli.concurrency, cli.timeout) => scanner,
    };
    let cfg = scanner.config();
    println!("Target: {} -> {}", cfg.target, cfg.host_ip);
    println!(
        "Scanning {} ports (concurrency={}, timeout={}s)",
        cfg.ports.len(),
        cfg.concurrency,
        cfg.timeout.as_secs_f64()
    );

    let results = match scanner.scan_with_cancel(cancel).await {
        Ok(results) => results,
        Err(ScanError::Interrupted) => {
            println!("Scan interrupted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    let report = ScanReport::new(&cfg.target, &cfg.host_ip, results).sorted();
    print_open_ports(&report);

    if let Some(path) = cli.json.as_deref() {
        report.write_json(path)?;
        println!("Results saved -> {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn print_open_ports(report: &ScanReport) {
    let mut open = 0usize;
    for r in report.open_ports() {
        open += 1;
        // Keep one line per port even for multi-line banners.
        let banner = r
            .banner
            .as_deref()
            .unwrap_or_default()
            .replace('\n', "\\n")
            .replace('\r', "\\r");
        println!("[OPEN] {}\t{}", r.port, banner);
    }
    println!("{open} open / {} scanned", report.results.len());
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid timeout {s:?}: {e}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {s}"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout {s:?}: {e}"))
}
