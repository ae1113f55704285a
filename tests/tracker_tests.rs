use axum::http::{header, HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use upload_pulse::models::ProgressSnapshot;
use upload_pulse::scanner::FilenameScanner;
use upload_pulse::state::ProgressStore;
use upload_pulse::tracker::{drain_with_progress, eligible_upload, UploadIntake};

fn upload_headers(content_type: &str, content_length: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type).unwrap(),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&content_length.to_string()).unwrap(),
    );
    headers
}

#[test]
fn eligible_when_all_conditions_hold() {
    let headers = upload_headers("multipart/form-data; boundary=X", 4096);
    let intake = eligible_upload(&Method::POST, &headers, "alice");

    assert_eq!(
        intake,
        Some(UploadIntake {
            boundary: "--X".to_string(),
            content_length: 4096,
        })
    );
}

#[test]
fn rejects_below_minimum_length() {
    let headers = upload_headers("multipart/form-data; boundary=X", 4095);
    assert_eq!(eligible_upload(&Method::POST, &headers, "alice"), None);
}

#[test]
fn rejects_wrong_method() {
    let headers = upload_headers("multipart/form-data; boundary=X", 4096);
    assert_eq!(eligible_upload(&Method::GET, &headers, "alice"), None);
    assert_eq!(eligible_upload(&Method::PUT, &headers, "alice"), None);
}

#[test]
fn rejects_non_multipart_content_type() {
    let headers = upload_headers("application/json", 4096);
    assert_eq!(eligible_upload(&Method::POST, &headers, "alice"), None);
}

#[test]
fn rejects_missing_boundary_parameter() {
    let headers = upload_headers("multipart/form-data", 4096);
    assert_eq!(eligible_upload(&Method::POST, &headers, "alice"), None);
}

#[test]
fn rejects_empty_identity() {
    let headers = upload_headers("multipart/form-data; boundary=X", 4096);
    assert_eq!(eligible_upload(&Method::POST, &headers, ""), None);
}

#[test]
fn rejects_missing_content_length() {
    // chunked transfer encoding carries no length; ineligible by design
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("multipart/form-data; boundary=X"),
    );
    assert_eq!(eligible_upload(&Method::POST, &headers, "alice"), None);
}

#[test]
fn content_type_matching_is_case_insensitive() {
    let headers = upload_headers("Multipart/Form-Data; BOUNDARY=X", 4096);
    let intake = eligible_upload(&Method::POST, &headers, "alice").unwrap();
    assert_eq!(intake.boundary, "--X");
}

#[test]
fn quoted_boundary_value_is_unwrapped() {
    let headers = upload_headers("multipart/form-data; boundary=\"quoted token\"", 8192);
    let intake = eligible_upload(&Method::POST, &headers, "alice").unwrap();
    assert_eq!(intake.boundary, "--quoted token");
}

fn multipart_body(payload_len: usize) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"--B\r\n");
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"archive.zip\"\r\n");
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(&vec![b'z'; payload_len]);
    body.extend_from_slice(b"\r\n--B--\r\n");
    body
}

fn ok_stream(
    body: &[u8],
    frame_size: usize,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
    let frames: Vec<Result<Bytes, std::io::Error>> = body
        .chunks(frame_size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(frames)
}

#[tokio::test]
async fn drain_publishes_terminal_snapshot_and_returns_full_body() {
    let body = multipart_body(10_000);
    let total = body.len() as u64;

    let store = ProgressStore::new();
    let mut scanner = FilenameScanner::new("--B");

    let replayed = drain_with_progress(
        ok_stream(&body, 1500),
        "alice",
        ProgressSnapshot::started(total),
        &mut scanner,
        &store,
    )
    .await;

    // byte-for-byte replay for the downstream consumer
    assert_eq!(&replayed[..], &body[..]);

    let last = store.get("alice").unwrap();
    assert_eq!(last.total_bytes, total);
    assert_eq!(last.bytes_read, total);
    assert!(last.is_complete());
    assert_eq!(last.file_name, "archive.zip");
}

#[tokio::test]
async fn early_end_of_stream_forces_completion() {
    // 2000 declared, stream dries up after 1500
    let store = ProgressStore::new();
    let mut scanner = FilenameScanner::new("--B");

    let body = vec![b'x'; 1500];
    drain_with_progress(
        ok_stream(&body, 4096),
        "alice",
        ProgressSnapshot::started(2000),
        &mut scanner,
        &store,
    )
    .await;

    let last = store.get("alice").unwrap();
    assert_eq!(last.bytes_read, 2000);
    assert_eq!(last.total_bytes, 2000);
    assert!(last.is_complete());
}

#[tokio::test]
async fn stream_error_is_absorbed_as_completion() {
    let store = ProgressStore::new();
    let mut scanner = FilenameScanner::new("--B");

    let frames: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from(vec![b'x'; 500])),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer gone")),
    ];

    let replayed = drain_with_progress(
        futures::stream::iter(frames),
        "alice",
        ProgressSnapshot::started(2000),
        &mut scanner,
        &store,
    )
    .await;

    // bytes seen before the error are still in the replay buffer
    assert_eq!(replayed.len(), 500);

    let last = store.get("alice").unwrap();
    assert!(last.is_complete());
}

#[tokio::test]
async fn body_longer_than_declared_caps_bytes_read() {
    let store = ProgressStore::new();
    let mut scanner = FilenameScanner::new("--B");

    let body = vec![b'x'; 5000];
    let replayed = drain_with_progress(
        ok_stream(&body, 4096),
        "alice",
        ProgressSnapshot::started(4500),
        &mut scanner,
        &store,
    )
    .await;

    // replay keeps everything, the snapshot never overshoots
    assert_eq!(replayed.len(), 5000);
    assert_eq!(store.get("alice").unwrap().bytes_read, 4500);
}

#[tokio::test]
async fn concurrent_poller_observes_monotonic_progress() {
    let body = multipart_body(60_000);
    let total = body.len() as u64;

    let store = Arc::new(ProgressStore::new());
    let reader_store = Arc::clone(&store);

    // poll "bob" while the writer drains, recording every observation
    let poller = tokio::spawn(async move {
        let mut seen = Vec::new();
        loop {
            if let Some(s) = reader_store.get("bob") {
                let done = s.is_complete();
                seen.push(s.bytes_read);
                if done {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_micros(200)).await;
        }
        seen
    });

    // frames arrive with a small gap, like a real socket
    let frames: Vec<Result<Bytes, std::io::Error>> = body
        .chunks(2048)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    let stream = Box::pin(futures::stream::iter(frames).then(|f| async move {
        tokio::time::sleep(Duration::from_micros(500)).await;
        f
    }));

    let mut scanner = FilenameScanner::new("--B");
    store.set("bob", ProgressSnapshot::started(total));
    drain_with_progress(
        stream,
        "bob",
        ProgressSnapshot::started(total),
        &mut scanner,
        &store,
    )
    .await;

    let seen = tokio::time::timeout(Duration::from_secs(10), poller)
        .await
        .expect("poller timed out")
        .unwrap();

    assert!(!seen.is_empty());
    assert!(
        seen.windows(2).all(|w| w[0] <= w[1]),
        "observed bytes_read went backwards: {:?}",
        seen
    );
    assert_eq!(*seen.last().unwrap(), total);
}
