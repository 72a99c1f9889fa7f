//! Library crate for harbor-scan: port-spec parsing, host resolution, the single-port probe
//! and the bounded-concurrency scan orchestrator, plus the HTTP front end.
pub mod config;
pub mod error;
pub mod logging;
pub mod ports;
pub mod probe;
pub mod resolve;
pub mod scanner;
pub mod server;
pub mod types;

pub use error::{PortParseError, ScanError};
pub use ports::parse_ports;
pub use scanner::{scan, Scanner};
pub use types::{ProbeResult, ScanReport};
