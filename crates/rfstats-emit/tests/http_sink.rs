//! HttpCsvSink against a minimal in-process HTTP responder.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rfstats_core::{Clock, MockClock, SensorRecord};
use rfstats_emit::{EmissionSink, HttpCsvSink, HttpSinkConfig, TransportEnvelope};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Captured {
    head: String,
    body: Vec<u8>,
}

/// Accept one request, answer with `status_line`, hand back what was sent.
async fn one_shot_server(status_line: &'static str) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while buf.len() < head_end + content_length {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        sock.write_all(response.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();

        let _ = tx.send(Captured {
            head,
            body: buf[head_end..].to_vec(),
        });
    });

    (format!("http://{addr}/ingest"), rx)
}

fn record() -> SensorRecord {
    SensorRecord {
        hardware_id: 1,
        metadata_id: 55,
        created_at: Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
        average_db: -90.123,
        max_db: -86.0,
        median_db: -90.0,
        std_dev: 2.0,
        kurtosis: 5.0,
    }
}

fn config(endpoint: String, token: Option<&str>) -> HttpSinkConfig {
    HttpSinkConfig {
        endpoint,
        monitor_id: "hcro-node1".to_string(),
        token: token.map(str::to_string),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn posts_envelope_with_bearer_token() {
    let (endpoint, rx) = one_shot_server("HTTP/1.1 200 OK").await;
    let clock = Arc::new(MockClock::with_base(
        Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
    ));
    clock.advance_secs(1.5);
    let mut sink =
        HttpCsvSink::with_clock(config(endpoint, Some("s3cret")), clock.clone()).unwrap();

    sink.emit(&record()).await.unwrap();

    let captured = rx.await.unwrap();
    assert!(captured.head.starts_with("POST /ingest HTTP/1.1"));
    assert!(
        captured
            .head
            .to_ascii_lowercase()
            .contains("authorization: bearer s3cret")
    );

    let envelope: TransportEnvelope = serde_json::from_slice(&captured.body).unwrap();
    assert_eq!(envelope.monitor_id, "hcro-node1");
    assert_eq!(envelope.kind, "rf_stats");
    assert_eq!(envelope.start_time, clock.wall_clock());
    assert_eq!(
        envelope.start_time,
        Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 7).unwrap() + chrono::Duration::milliseconds(500)
    );
    assert_eq!((envelope.end_time - envelope.start_time).num_seconds(), 10);

    let csv = String::from_utf8(envelope.decode_payload().unwrap()).unwrap();
    let row = csv.lines().nth(1).unwrap();
    assert!(row.starts_with("915000000,-90.123,915000000,-86.0,-90.0,2.0,5.0,1000000,35,1.0,10,2024-02-03 04:05:06,1,"));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (endpoint, _rx) = one_shot_server("HTTP/1.1 503 Service Unavailable").await;
    let mut sink = HttpCsvSink::new(config(endpoint, None)).unwrap();

    let err = sink.emit(&record()).await.unwrap_err();
    assert!(err.to_string().contains("503"), "{err:#}");
}

#[tokio::test]
async fn unreachable_endpoint_is_an_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut sink = HttpCsvSink::new(config(format!("http://{addr}/ingest"), None)).unwrap();
    assert!(sink.emit(&record()).await.is_err());
}
