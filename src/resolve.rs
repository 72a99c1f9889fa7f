use tokio::net::lookup_host;
use tracing::{debug, warn};

/// Resolve `hostname` to the text form of its first address.
///
/// Resolution is best effort: on lookup failure, or when the lookup returns no addresses,
/// the input is returned unchanged and the scan fails per port at connect time instead.
pub async fn resolve_host(hostname: &str) -> String {
    match lookup_host((hostname, 0)).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => {
                let ip = addr.ip().to_string();
                debug!(%hostname, %ip, "resolved target");
                ip
            }
            None => {
                warn!(%hostname, "lookup returned no addresses, using target as-is");
                hostname.to_string()
            }
        },
        Err(e) => {
            warn!(%hostname, error = %e, "resolution failed, using target as-is");
            hostname.to_string()
        }
    }
}
