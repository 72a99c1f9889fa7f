//! Error types surfaced by the scanning core.
//!
//! Only two conditions ever leave the core: a malformed port specification and an
//! externally requested abort. Everything that goes wrong while probing a single port is
//! turned into data instead (see [`crate::probe`]).

use thiserror::Error;

/// A malformed token inside a port specification such as `"22,80,1000-1020"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortParseError {
    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("invalid port range: {0}")]
    InvalidRange(String),
}

impl PortParseError {
    /// The offending token, trimmed, exactly as it appeared in the input.
    pub fn token(&self) -> &str {
        match self {
            PortParseError::InvalidPort(t) | PortParseError::InvalidRange(t) => t,
        }
    }
}

/// Reasons a scan returns without a result collection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// The scan was cancelled before every probe finished. No partial results are kept.
    #[error("scan interrupted")]
    Interrupted,
}
