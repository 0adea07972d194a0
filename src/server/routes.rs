//! Route handlers.

use crate::config::FailurePolicy;
use crate::error::RelayError;
use crate::output::{LoaderResponse, SourceDocument};
use crate::server::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{self, AsHeaderName};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name of the service reported by `GET /`.
pub const SERVICE_NAME: &str = "OpenWebUI Document Loader";

/// Header carrying the original filename.
pub const FILENAME_HEADER: &str = "x-filename";

/// Header overriding the configured failure policy for one request.
pub const FAILURE_POLICY_HEADER: &str = "x-failure-policy";

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub status: String,
    pub service: String,
    pub engine: String,
    pub azure_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub azure_configured: bool,
}

/// `GET /`
pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "healthy".into(),
        service: SERVICE_NAME.into(),
        engine: state.extractor().engine().to_string(),
        azure_configured: state.extractor().is_configured(),
    })
}

/// `GET /health`. Never calls the provider.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        azure_configured: state.extractor().is_configured(),
    })
}

/// `PUT /process`: raw PDF body in, Open WebUI loader document out.
pub async fn process(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LoaderResponse>, RelayError> {
    authorize(state.config().api_key.as_deref(), &headers)?;

    let mut source = SourceDocument::new(body.to_vec());
    if let Some(content_type) = header_str(&headers, header::CONTENT_TYPE) {
        source = source.with_content_type(content_type);
    }
    if let Some(filename) = header_str(&headers, FILENAME_HEADER) {
        source = source.with_filename(filename);
    }
    let policy = failure_policy(&headers, state.config().failure_policy);

    let result = state.extractor().extract_with(source, policy).await?;
    Ok(Json(result.into()))
}

/// Check `Authorization: Bearer <key>` when a key is configured.
fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), RelayError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let presented = header_str(headers, header::AUTHORIZATION).and_then(|value| {
        let (scheme, token) = value.split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
    });
    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(RelayError::Unauthorized),
    }
}

/// An unparseable override falls back to the configured policy.
fn failure_policy(headers: &HeaderMap, default: FailurePolicy) -> FailurePolicy {
    match header_str(headers, FAILURE_POLICY_HEADER) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring {} header: {}", FAILURE_POLICY_HEADER, e);
            default
        }),
    }
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, key: K) -> Option<&str> {
    headers
        .get(key)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
