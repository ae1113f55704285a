use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::sync::Arc;

use crate::middleware::AuthenticatedUser;
use crate::models::ProgressSnapshot;
use crate::scanner::FilenameScanner;
use crate::state::{AppState, ProgressStore};

/// granularity at which body bytes are fed to the scanner and progress is
/// republished
pub const CHUNK_SIZE: usize = 4096;

/// uploads below this declared size are not worth tracking; it also rules
/// out chunked requests, which carry no content length at all
pub const MIN_TRACKED_BYTES: u64 = 4096;

/// what the gate extracted from an eligible request
#[derive(Debug, PartialEq, Eq)]
pub struct UploadIntake {
    /// full delimiter, `--` + the boundary parameter value
    pub boundary: String,
    pub content_length: u64,
}

/// decide from method, headers and identity alone whether this request is a
/// trackable streaming upload. touches no body bytes.
pub fn eligible_upload(method: &Method, headers: &HeaderMap, user: &str) -> Option<UploadIntake> {
    if user.is_empty() {
        return None;
    }

    if !method.as_str().eq_ignore_ascii_case("POST") {
        return None;
    }

    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return None;
    }

    let boundary = boundary_param(content_type)?;

    let content_length: u64 = headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    if content_length < MIN_TRACKED_BYTES {
        return None;
    }

    Some(UploadIntake {
        boundary: format!("--{boundary}"),
        content_length,
    })
}

// boundary parameter value from a content-type header, quotes stripped
fn boundary_param(content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    let at = lower.find("boundary=")? + "boundary=".len();

    let value = content_type[at..]
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"');

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// drive the body stream to its end, feeding the scanner in ≤4096-byte
/// slices and publishing a fresh snapshot after every slice. returns the
/// fully buffered body so the caller can hand the framework an untouched
/// copy.
///
/// a stream that ends or errors before `total_bytes` were seen publishes a
/// terminal snapshot anyway (forced completion). that makes a dropped
/// connection indistinguishable from a finished upload to pollers, which
/// matches the historical behavior this loop preserves; the alternative
/// would be a poller stuck below 100% forever. nothing here ever fails the
/// request.
pub async fn drain_with_progress<S, E>(
    mut stream: S,
    user_key: &str,
    initial: ProgressSnapshot,
    scanner: &mut FilenameScanner,
    store: &ProgressStore,
) -> Bytes
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let total_bytes = initial.total_bytes;
    let mut bytes_read = initial.bytes_read;
    let mut file_name = initial.file_name;
    let mut replay = BytesMut::new();

    while let Some(item) = stream.next().await {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(user = %user_key, "body stream error mid-upload: {}", e);
                break;
            }
        };

        replay.extend_from_slice(&frame);

        for slice in frame.chunks(CHUNK_SIZE) {
            scanner.parse_next(slice);
            if !scanner.current_file_name().is_empty() {
                file_name = scanner.current_file_name().to_string();
            }

            // cap at the declared total in case the body overruns it
            bytes_read = (bytes_read + slice.len() as u64).min(total_bytes);

            store.set(
                user_key,
                ProgressSnapshot {
                    total_bytes,
                    bytes_read,
                    file_name: file_name.clone(),
                },
            );
        }
    }

    if bytes_read < total_bytes {
        tracing::debug!(
            user = %user_key,
            bytes_read,
            total_bytes,
            "stream ended early, forcing completion"
        );
        store.set(
            user_key,
            ProgressSnapshot {
                total_bytes,
                bytes_read: total_bytes,
                file_name,
            },
        );
    }

    replay.freeze()
}

/// interception middleware: sits after authentication and ahead of body
/// extraction. ineligible requests pass through untouched; eligible ones
/// have their body drained into a buffer (publishing progress along the
/// way) and reinstalled, so downstream multipart extraction sees the exact
/// same bytes.
pub async fn track_upload_progress(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.0.clone())
        .unwrap_or_default();

    let intake = match eligible_upload(req.method(), req.headers(), &user) {
        Some(intake) => intake,
        None => return next.run(req).await,
    };

    tracing::debug!(
        user = %user,
        total_bytes = intake.content_length,
        "tracking upload progress"
    );

    // published before the first read so a poller never misses the entry
    let initial = ProgressSnapshot::started(intake.content_length);
    state.progress.set(&user, initial.clone());

    let (parts, body) = req.into_parts();
    let mut scanner = FilenameScanner::new(&intake.boundary);

    let buffered = drain_with_progress(
        body.into_data_stream(),
        &user,
        initial,
        &mut scanner,
        &state.progress,
    )
    .await;

    let req = Request::from_parts(parts, Body::from(buffered));
    next.run(req).await
}
