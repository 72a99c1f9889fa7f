use std::collections::BTreeSet;
use std::num::IntErrorKind;

use crate::error::PortParseError;

const MIN_PORT: i64 = 1;
const MAX_PORT: i64 = 65535;

/// Parse a comma-separated port specification into a sorted, deduplicated list of TCP ports.
///
/// Supported tokens:
/// - single port number: `80`
/// - inclusive range: `8000-8010` (reversed ranges like `10-5` are swapped)
/// - whitespace around tokens and empty tokens (`"22,,80,"`) are ignored
///
/// Ranges are clamped into `1..=65535`, so `65530-70000` yields `65530..=65535` and a range
/// lying entirely outside the bounds yields nothing. A single value outside the bounds is
/// dropped. Tokens that are not integers are rejected.
pub fn parse_ports(spec: &str) -> Result<Vec<u16>, PortParseError> {
    let mut ports = BTreeSet::new();

    for chunk in spec.split(',') {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        // Range `start-end`
        if let Some((a, b)) = chunk.split_once('-') {
            let (mut lo, mut hi) = match (parse_int(a), parse_int(b)) {
                (Some(lo), Some(hi)) => (lo, hi),
                _ => return Err(PortParseError::InvalidRange(chunk.to_string())),
            };
            if lo > hi {
                std::mem::swap(&mut lo, &mut hi);
            }
            let lo = lo.max(MIN_PORT);
            let hi = hi.min(MAX_PORT);
            // Empty when the range lies entirely outside the bounds.
            ports.extend((lo..=hi).map(|p| p as u16));
            continue;
        }

        // Single number
        let p = parse_int(chunk).ok_or_else(|| PortParseError::InvalidPort(chunk.to_string()))?;
        if (MIN_PORT..=MAX_PORT).contains(&p) {
            ports.insert(p as u16);
        }
    }

    Ok(ports.into_iter().collect())
}

/// Integers too wide for `i64` saturate, so they fall out of range instead of failing.
fn parse_int(s: &str) -> Option<i64> {
    match s.trim().parse::<i64>() {
        Ok(v) => Some(v),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}
