//! Single-port TCP connect probe with a short banner grab.
//!
//! A probe never fails: every connection or banner error is folded into a [`ProbeOutcome`],
//! which the orchestrator collapses into the public [`ProbeResult`] shape.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::trace;

use crate::config::{BANNER_MAX_BYTES, BANNER_TIMEOUT};
use crate::types::ProbeResult;

/// Sent right after connecting to nudge line-oriented services into talking.
const BANNER_NUDGE: &[u8] = b"\r\n";

/// Opens the byte stream a probe talks over.
///
/// [`TcpConnector`] is the real implementation; tests plug in in-memory streams.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP via `tokio::net::TcpStream`. Hostnames are looked up again on connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        TcpStream::connect((host, port)).await
    }
}

/// How a single probe ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Connection accepted. `banner` holds whatever the peer said within the banner window.
    Open { banner: Option<String> },
    /// Connection actively refused.
    Closed,
    /// Connect timed out or failed for any other reason.
    Unreachable,
}

impl ProbeOutcome {
    pub fn is_open(&self) -> bool {
        matches!(self, ProbeOutcome::Open { .. })
    }

    /// Collapse into the two-field public shape. `Closed` and `Unreachable` look the same.
    pub fn into_result(self, port: u16) -> ProbeResult {
        match self {
            ProbeOutcome::Open { banner } => ProbeResult::open(port, banner),
            ProbeOutcome::Closed | ProbeOutcome::Unreachable => ProbeResult::closed(port),
        }
    }
}

/// Probe `host:port` and return its public result.
pub async fn probe<C: Connector>(
    connector: &C,
    host: &str,
    port: u16,
    timeout: Duration,
) -> ProbeResult {
    probe_outcome(connector, host, port, timeout)
        .await
        .into_result(port)
}

/// Probe `host:port`, keeping the refused/unreachable distinction.
///
/// The connect is bounded by `timeout`; the banner exchange and the shutdown each by the fixed
/// [`BANNER_TIMEOUT`].
pub async fn probe_outcome<C: Connector>(
    connector: &C,
    host: &str,
    port: u16,
    timeout: Duration,
) -> ProbeOutcome {
    let mut stream = match time::timeout(timeout, connector.connect(host, port)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            trace!(port, "refused");
            return ProbeOutcome::Closed;
        }
        Ok(Err(e)) => {
            trace!(port, error = %e, "connect failed");
            return ProbeOutcome::Unreachable;
        }
        Err(_) => {
            trace!(port, ?timeout, "connect timed out");
            return ProbeOutcome::Unreachable;
        }
    };

    let banner = grab_banner(&mut stream).await;
    let _ = time::timeout(BANNER_TIMEOUT, stream.shutdown()).await;
    trace!(port, has_banner = banner.is_some(), "open");
    ProbeOutcome::Open { banner }
}

/// Nudge the peer and read whatever arrives within the banner window.
async fn grab_banner<S>(stream: &mut S) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BANNER_MAX_BYTES];
    let exchange = async {
        stream.write_all(BANNER_NUDGE).await?;
        stream.flush().await?;
        Ok::<usize, io::Error>(stream.read(&mut buf).await?)
    };
    match time::timeout(BANNER_TIMEOUT, exchange).await {
        Ok(Ok(n)) if n > 0 => decode_banner(&buf[..n]),
        _ => None,
    }
}

/// Lossy UTF-8 decode and trim. Whitespace-only payloads count as no banner.
fn decode_banner(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use tokio::io::{DuplexStream, ReadBuf};
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    /// In-memory stream whose shutdown never completes.
    struct StuckShutdown(DuplexStream);

    impl AsyncRead for StuckShutdown {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for StuckShutdown {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    #[derive(Default)]
    struct StuckConnector {
        peers: Mutex<Vec<DuplexStream>>,
    }

    impl Connector for StuckConnector {
        type Stream = StuckShutdown;

        async fn connect(&self, _host: &str, _port: u16) -> io::Result<StuckShutdown> {
            let (client, mut server) = tokio::io::duplex(256);
            server.write_all(b"hello").await?;
            self.peers.lock().unwrap().push(server);
            Ok(StuckShutdown(client))
        }
    }

    #[test]
    fn decode_trims_and_replaces_invalid_bytes() {
        assert_eq!(
            decode_banner(b"  SSH-2.0-OpenSSH_8.0\r\n").as_deref(),
            Some("SSH-2.0-OpenSSH_8.0")
        );
        assert_eq!(decode_banner(b"ok\xff").as_deref(), Some("ok\u{FFFD}"));
        assert_eq!(decode_banner(b"\r\n \t"), None);
    }

    #[test]
    fn closed_and_unreachable_collapse_identically() {
        assert_eq!(ProbeOutcome::Closed.into_result(23), ProbeResult::closed(23));
        assert_eq!(
            ProbeOutcome::Unreachable.into_result(23),
            ProbeResult::closed(23)
        );
        let open = ProbeOutcome::Open {
            banner: Some("hi".into()),
        };
        assert!(open.is_open());
        assert_eq!(open.into_result(7), ProbeResult::open(7, Some("hi".into())));
    }

    #[tokio::test]
    async fn talking_service_reports_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"220 mail.example ESMTP\r\n").await.unwrap();
            let mut buf = [0u8; 16];
            let _ = sock.read(&mut buf).await;
        });

        let res = probe(&TcpConnector, "127.0.0.1", port, Duration::from_secs(1)).await;
        assert_eq!(res, ProbeResult::open(port, Some("220 mail.example ESMTP".into())));
    }

    #[tokio::test]
    async fn silent_service_is_open_without_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let start = Instant::now();
        let res = probe(&TcpConnector, "127.0.0.1", port, Duration::from_secs(1)).await;
        assert_eq!(res, ProbeResult::open(port, None));
        // Bounded by the banner window, not the connect timeout.
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn stalled_shutdown_does_not_hang() {
        let start = Instant::now();
        let res = probe(&StuckConnector::default(), "h", 9, Duration::from_secs(1)).await;
        assert_eq!(res, ProbeResult::open(9, Some("hello".into())));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn refused_port_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome =
            probe_outcome(&TcpConnector, "127.0.0.1", port, Duration::from_secs(1)).await;
        assert!(!outcome.is_open());
    }

    #[tokio::test]
    async fn unresolvable_host_is_closed() {
        let res = probe(
            &TcpConnector,
            "no-such-host.invalid",
            80,
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(res, ProbeResult::closed(80));
    }
}
