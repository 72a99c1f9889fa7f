use std::path::PathBuf;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use harbor_scan::server::{router, ErrorBody, ScanResponse, ServerSettings};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn settings() -> ServerSettings {
    ServerSettings {
        concurrency: 200,
        timeout: Duration::from_millis(500),
        ui_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("ui"),
    }
}

fn scan_request(form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/scan")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn scan_returns_only_open_ports() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let _ = sock.write_all(b"+OK ready\r\n").await;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    });
    let closed = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().port()
    };

    let resp = router(settings())
        .oneshot(scan_request(&format!("target=127.0.0.1&ports={closed}%2C{open}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: ScanResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.target, "127.0.0.1");
    assert_eq!(body.results.len(), 1);
    assert_eq!(body.results[0].port, open);
    assert!(body.results[0].open);
    assert_eq!(body.results[0].banner.as_deref(), Some("+OK ready"));
}

#[tokio::test]
async fn malformed_ports_are_a_client_error() {
    let resp = router(settings())
        .oneshot(scan_request("target=127.0.0.1&ports=22%2Cabc"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(body.error.contains("abc"));
}

#[tokio::test]
async fn blank_target_defaults_to_loopback() {
    // Out-of-range single port: nothing to scan, so this stays offline and fast.
    let resp = router(settings())
        .oneshot(scan_request("target=&ports=70000"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: ScanResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.target, "127.0.0.1");
    assert!(body.results.is_empty());
}

#[tokio::test]
async fn health_and_index_are_served() {
    let app = router(settings());

    let resp = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"ok");

    let resp = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(html.contains("action=\"/scan\""));
}
