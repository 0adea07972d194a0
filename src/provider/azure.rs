//! Azure AI Document Intelligence (`prebuilt-read`) over its REST API.
//!
//! Analysis is a long-running operation: the submit call answers `202` with
//! an `Operation-Location` header, which is then polled until the status is
//! `succeeded` or `failed`. The wait is unbounded here; the caller owns the
//! per-page deadline and drops this future when it expires.

use super::OcrProvider;
use crate::error::{PageError, RelayError};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Engine identifier echoed to clients.
pub const AZURE_ENGINE: &str = "azure-document-intelligence";

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";

/// Connection settings for a Document Intelligence resource.
#[derive(Clone)]
pub struct AzureConfig {
    /// e.g. `https://<resource>.cognitiveservices.azure.com/`
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Default: `prebuilt-read`.
    pub model: String,
    /// Default: `2024-11-30`.
    pub api_version: String,
    /// Delay between status polls when the service sends no `Retry-After`. Default: 1000.
    pub poll_interval_ms: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "prebuilt-read".to_string(),
            api_version: "2024-11-30".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

/// Validated credentials; absent when configuration is missing or malformed.
#[derive(Clone)]
struct Credentials {
    endpoint: Url,
    api_key: String,
}

/// Document Intelligence client.
///
/// Construction never fails: a misconfigured client is still usable for
/// health reporting and answers every request with `NotConfigured`.
pub struct AzureDocumentIntelligence {
    http: reqwest::Client,
    credentials: Result<Credentials, String>,
    model: String,
    api_version: String,
    poll_interval: Duration,
}

impl AzureDocumentIntelligence {
    pub fn new(config: AzureConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            credentials: validate_credentials(config.endpoint.as_deref(), config.api_key.as_deref()),
            model: config.model,
            api_version: config.api_version,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(50)),
        })
    }

    fn credentials(&self) -> Result<&Credentials, RelayError> {
        self.credentials
            .as_ref()
            .map_err(|hint| RelayError::NotConfigured {
                provider: AZURE_ENGINE.to_string(),
                hint: hint.clone(),
            })
    }

    fn analyze_url(&self, endpoint: &Url) -> Result<Url, String> {
        let mut url = endpoint
            .join(&format!(
                "documentintelligence/documentModels/{}:analyze",
                self.model
            ))
            .map_err(|e| format!("invalid analyze URL: {e}"))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Submit the page; returns the operation URL to poll.
    async fn submit(&self, page: usize, creds: &Credentials, pdf: &[u8]) -> Result<String, PageError> {
        let url = self
            .analyze_url(&creds.endpoint)
            .map_err(|detail| PageError::Provider { page, detail })?;
        let body = serde_json::json!({
            "base64Source": base64::engine::general_purpose::STANDARD.encode(pdf),
        });

        let response = self
            .http
            .post(url)
            .header(KEY_HEADER, &creds.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(page, "submit", e))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let text = response.text().await.unwrap_or_default();
            return Err(PageError::Provider {
                page,
                detail: describe_http_error(status, &text),
            });
        }

        response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PageError::Provider {
                page,
                detail: "analyze response carried no Operation-Location header".to_string(),
            })
    }

    /// Poll the operation until it leaves the running states.
    async fn wait(&self, page: usize, creds: &Credentials, operation: &str) -> Result<String, PageError> {
        let mut polls = 0u32;
        loop {
            let response = self
                .http
                .get(operation)
                .header(KEY_HEADER, &creds.api_key)
                .send()
                .await
                .map_err(|e| transport_error(page, "poll", e))?;

            let status = response.status();
            let delay = retry_after(response.headers()).unwrap_or(self.poll_interval);
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(PageError::Provider {
                    page,
                    detail: describe_http_error(status, &text),
                });
            }

            let op: AnalyzeOperation = response.json().await.map_err(|e| PageError::Provider {
                page,
                detail: format!("unreadable analyze result: {e}"),
            })?;
            polls += 1;

            match op.status.as_str() {
                "succeeded" => {
                    debug!("Page {}: analysis succeeded after {} polls", page, polls);
                    return Ok(op.analyze_result.map(|r| r.text()).unwrap_or_default());
                }
                "failed" | "canceled" => {
                    let detail = op
                        .error
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_else(|| format!("analysis {}", op.status));
                    return Err(PageError::Provider { page, detail });
                }
                _ => tokio::time::sleep(delay).await,
            }
        }
    }
}

#[async_trait]
impl OcrProvider for AzureDocumentIntelligence {
    fn engine(&self) -> &str {
        AZURE_ENGINE
    }

    fn ensure_configured(&self) -> Result<(), RelayError> {
        self.credentials().map(|_| ())
    }

    async fn recognize(&self, page: usize, pdf: &[u8]) -> Result<String, PageError> {
        let creds = self.credentials().map_err(|e| PageError::Provider {
            page,
            detail: e.to_string(),
        })?;
        let operation = self.submit(page, creds, pdf).await?;
        debug!("Page {}: submitted, polling {}", page, operation);
        self.wait(page, creds, &operation).await
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedPage {
    #[serde(default)]
    lines: Vec<AnalyzedLine>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedLine {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: String,
    message: String,
}

impl AnalyzeResult {
    /// Lines of every page joined by newlines.
    fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| {
                p.lines
                    .iter()
                    .map(|l| l.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn validate_credentials(endpoint: Option<&str>, api_key: Option<&str>) -> Result<Credentials, String> {
    let endpoint = endpoint
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT is not set".to_string())?;
    let api_key = api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| "AZURE_DOCUMENT_INTELLIGENCE_KEY is not set".to_string())?;

    // A trailing slash makes `Url::join` append instead of replacing the last segment.
    let normalised = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    };
    let url = Url::parse(&normalised)
        .map_err(|e| format!("AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT is not a valid URL: {e}"))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(format!(
            "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT must be http(s), got {}",
            url.scheme()
        ));
    }

    Ok(Credentials {
        endpoint: url,
        api_key: api_key.to_string(),
    })
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn transport_error(page: usize, stage: &str, e: reqwest::Error) -> PageError {
    PageError::Provider {
        page,
        detail: format!("{stage} request failed: {e}"),
    }
}

fn describe_http_error(status: StatusCode, body: &str) -> String {
    let hint = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => " (check the API key)",
        StatusCode::TOO_MANY_REQUESTS => " (quota or rate limit exceeded)",
        _ => "",
    };
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}{}", status, hint)
    } else {
        let snippet: String = body.chars().take(300).collect();
        format!("HTTP {}{}: {}", status, hint, snippet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: Option<&str>, key: Option<&str>) -> AzureDocumentIntelligence {
        AzureDocumentIntelligence::new(AzureConfig {
            endpoint: endpoint.map(str::to_string),
            api_key: key.map(str::to_string),
            ..AzureConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn missing_credentials_not_configured() {
        let c = client(None, Some("k"));
        let err = c.ensure_configured().unwrap_err();
        assert_eq!(err.kind(), "NotConfigured");
        assert!(err.to_string().contains("ENDPOINT"));

        let c = client(Some("https://x.cognitiveservices.azure.com"), Some("  "));
        assert!(!c.is_configured());
    }

    #[test]
    fn malformed_endpoint_not_configured() {
        assert!(!client(Some("not a url"), Some("k")).is_configured());
        assert!(!client(Some("ftp://host/"), Some("k")).is_configured());
    }

    #[test]
    fn analyze_url_shape() {
        let c = client(Some("https://res.cognitiveservices.azure.com"), Some("k"));
        let creds = c.credentials().unwrap();
        let url = c.analyze_url(&creds.endpoint).unwrap();
        assert_eq!(
            url.as_str(),
            "https://res.cognitiveservices.azure.com/documentintelligence/documentModels/prebuilt-read:analyze?api-version=2024-11-30"
        );
    }

    #[tokio::test]
    async fn recognize_without_credentials_makes_no_call() {
        let c = client(None, None);
        let err = c.recognize(1, b"%PDF").await.unwrap_err();
        assert_eq!(err.kind(), "ProviderError");
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn parses_succeeded_operation() {
        let json = r#"{
            "status": "succeeded",
            "createdDateTime": "2024-01-01T00:00:00Z",
            "analyzeResult": {
                "apiVersion": "2024-11-30",
                "modelId": "prebuilt-read",
                "content": "Hello\nWorld",
                "pages": [
                    {"pageNumber": 1, "lines": [{"content": "Hello"}, {"content": "World"}]}
                ]
            }
        }"#;
        let op: AnalyzeOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.status, "succeeded");
        assert_eq!(op.analyze_result.unwrap().text(), "Hello\nWorld");
    }

    #[test]
    fn parses_failed_operation() {
        let json = r#"{"status": "failed", "error": {"code": "InvalidContent", "message": "corrupt"}}"#;
        let op: AnalyzeOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.error.unwrap().code, "InvalidContent");
    }

    #[test]
    fn page_without_lines_is_empty() {
        let json = r#"{"status": "succeeded", "analyzeResult": {"pages": [{"pageNumber": 1}]}}"#;
        let op: AnalyzeOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op.analyze_result.unwrap().text(), "");
    }

    #[test]
    fn http_error_hints() {
        assert!(describe_http_error(StatusCode::TOO_MANY_REQUESTS, "").contains("quota"));
        assert!(describe_http_error(StatusCode::UNAUTHORIZED, "{}").contains("API key"));
    }

    #[test]
    fn debug_redacts_key() {
        let cfg = AzureConfig {
            api_key: Some("topsecret".into()),
            ..AzureConfig::default()
        };
        assert!(!format!("{cfg:?}").contains("topsecret"));
    }
}
