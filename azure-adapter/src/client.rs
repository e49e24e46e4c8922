//! REST client for Content Understanding analyzers and analyses.

use docfield_core::document::DocumentSource;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::AzureError;
use crate::settings::{Credential, Settings};

const OPERATION_LOCATION: &str = "operation-location";

#[derive(Deserialize)]
struct OperationStatus {
    #[serde(default)]
    status: String,
}

/// Client for one Content Understanding resource.
#[derive(Debug, Clone)]
pub struct ContentUnderstandingClient {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    headers: HeaderMap,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl ContentUnderstandingClient {
    /// Builds a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns `AzureError::InvalidConfig` if the settings are incomplete or a
    /// credential cannot be used as a header value.
    pub fn new(settings: &Settings) -> Result<Self, AzureError> {
        settings.validate()?;

        let mut headers = HeaderMap::new();
        match settings.credential()? {
            Credential::SubscriptionKey(key) => {
                headers.insert("ocp-apim-subscription-key", sensitive(key)?);
            }
            Credential::AadToken(token) => {
                headers.insert(AUTHORIZATION, sensitive(&format!("Bearer {token}"))?);
            }
        }
        headers.insert(
            "x-ms-useragent",
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|e| AzureError::InvalidConfig(format!("user agent: {e}")))?,
        );

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_version: settings.api_version.clone(),
            headers,
            poll_interval: settings.poll_interval,
            poll_timeout: settings.poll_timeout,
        })
    }

    fn analyzer_url(&self, analyzer_id: &str) -> String {
        format!(
            "{}/contentunderstanding/analyzers/{analyzer_id}?api-version={}",
            self.endpoint, self.api_version
        )
    }

    fn analyze_url(&self, analyzer_id: &str) -> String {
        format!(
            "{}/contentunderstanding/analyzers/{analyzer_id}:analyze?api-version={}",
            self.endpoint, self.api_version
        )
    }

    /// Starts creating `analyzer_id` from `definition`; returns the operation location.
    pub async fn create_analyzer(
        &self,
        analyzer_id: &str,
        definition: &Value,
    ) -> Result<String, AzureError> {
        tracing::info!(analyzer = analyzer_id, "Creating analyzer");
        let response = self
            .http
            .put(self.analyzer_url(analyzer_id))
            .headers(self.headers.clone())
            .json(definition)
            .send()
            .await?;
        operation_location(check(response).await?)
    }

    /// Deletes `analyzer_id`.
    pub async fn delete_analyzer(&self, analyzer_id: &str) -> Result<(), AzureError> {
        tracing::info!(analyzer = analyzer_id, "Deleting analyzer");
        let response = self
            .http
            .delete(self.analyzer_url(analyzer_id))
            .headers(self.headers.clone())
            .send()
            .await?;
        check(response).await.map(|_| ())
    }

    /// Deletes `analyzer_id` if it exists, creates it again from `definition`,
    /// and waits until it is ready.
    pub async fn recreate_analyzer(
        &self,
        analyzer_id: &str,
        definition: &Value,
    ) -> Result<Value, AzureError> {
        match self.delete_analyzer(analyzer_id).await {
            Ok(()) => {}
            Err(AzureError::Status { status: 404, .. }) => {
                tracing::debug!(analyzer = analyzer_id, "Analyzer does not exist yet");
            }
            Err(e) => {
                tracing::warn!(analyzer = analyzer_id, error = %e, "Delete failed, creating anyway");
            }
        }
        let operation = self.create_analyzer(analyzer_id, definition).await?;
        self.poll_result(&operation).await
    }

    /// Submits `source` for analysis; returns the operation location.
    pub async fn begin_analyze(
        &self,
        analyzer_id: &str,
        source: &DocumentSource,
    ) -> Result<String, AzureError> {
        let request = self
            .http
            .post(self.analyze_url(analyzer_id))
            .headers(self.headers.clone());

        let request = match source {
            DocumentSource::Url(url) => request.json(&json!({ "url": url })),
            DocumentSource::Path(path) => request
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(tokio::fs::read(path).await?),
            DocumentSource::Bytes(bytes) => request
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone()),
        };

        tracing::debug!(analyzer = analyzer_id, "Submitting document for analysis");
        operation_location(check(request.send().await?).await?)
    }

    /// Polls `operation_location` until the operation succeeds, fails, or the
    /// poll timeout expires.
    pub async fn poll_result(&self, operation_location: &str) -> Result<Value, AzureError> {
        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            if elapsed > self.poll_timeout {
                return Err(AzureError::Timeout(self.poll_timeout));
            }

            let response = self
                .http
                .get(operation_location)
                .headers(self.headers.clone())
                .send()
                .await?;
            let body: Value = check(response).await?.json().await?;
            let status = serde_json::from_value::<OperationStatus>(body.clone())
                .map_err(|e| AzureError::JsonParseError(e.to_string()))?
                .status
                .to_lowercase();

            match status.as_str() {
                "succeeded" | "ready" => {
                    tracing::debug!(elapsed_ms, "Operation finished");
                    return Ok(body);
                }
                "failed" => {
                    let reason = body.get("error").unwrap_or(&body).to_string();
                    tracing::error!(%reason, "Operation failed");
                    return Err(AzureError::OperationFailed(reason));
                }
                _ => {
                    tracing::debug!(%status, elapsed_ms, "Operation in progress");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Submits `source` and waits for the analysis result.
    pub async fn analyze(
        &self,
        analyzer_id: &str,
        source: &DocumentSource,
    ) -> Result<Value, AzureError> {
        let operation = self.begin_analyze(analyzer_id, source).await?;
        self.poll_result(&operation).await
    }
}

fn sensitive(value: &str) -> Result<HeaderValue, AzureError> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|e| AzureError::InvalidConfig(format!("credential: {e}")))?;
    header.set_sensitive(true);
    Ok(header)
}

async fn check(response: Response) -> Result<Response, AzureError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AzureError::Status {
        status: status.as_u16(),
        body,
    })
}

fn operation_location(response: Response) -> Result<String, AzureError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Err(AzureError::MissingOperationLocation);
    }
    response
        .headers()
        .get(OPERATION_LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AzureError::MissingOperationLocation)
}
