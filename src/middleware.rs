use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;

use crate::config::Config;

/// identity string resolved by the authentication layer, read further down
/// the chain by the upload tracker and the progress poll handler
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub String);

// api key authentication; resolves the key to a username
pub async fn authenticate(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    // user table injected via request extensions during router setup
    let users = req
        .extensions()
        .get::<HashMap<String, String>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    // get api key from header
    let provided_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing X-API-Key header");
            StatusCode::UNAUTHORIZED
        })?;

    // hash the provided key and look up its owner
    let provided_hash = Config::hash_api_key(provided_key);

    let Some(username) = users.get(&provided_hash).cloned() else {
        tracing::warn!("🚫 Invalid API key attempt");
        return Err(StatusCode::UNAUTHORIZED);
    };

    tracing::debug!(user = %username, "API key validated successfully");
    req.extensions_mut().insert(AuthenticatedUser(username));
    Ok(next.run(req).await)
}

/// headers & shit
pub async fn add_security_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:"),
    );

    response
}
