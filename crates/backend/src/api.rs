//! REST client for the studio tools backend.
//!
//! Wraps the upload, job-creation, and job-status endpoints using
//! [`reqwest`], and implements [`JobBackend`] on top of them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use studio_core::tool::Tool;

use crate::backend::JobBackend;
use crate::config::ClientConfig;
use crate::messages::{
    CreateJobBody, CreateJobResponse, JobStatusResponse, UploadTarget, UploadTargetRequest,
};

/// Header carrying the per-submission idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// HTTP client for one backend deployment.
#[derive(Debug, Clone)]
pub struct StudioApi {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum StudioApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A URL could not be built from the configured base or a job id.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl StudioApiError {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            StudioApiError::ApiError { status, .. } => Some(*status),
            StudioApiError::Request(e) => e.status().map(|s| s.as_u16()),
            StudioApiError::InvalidUrl(_) => None,
        }
    }

    /// Whether retrying the same request later could succeed.
    ///
    /// Transport failures, timeouts, `408`, `429`, and `5xx` are
    /// transient. Other client errors and bad URLs are not.
    pub fn is_transient(&self) -> bool {
        match self {
            StudioApiError::Request(_) => true,
            StudioApiError::ApiError { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            StudioApiError::InvalidUrl(_) => false,
        }
    }

    /// Human-readable message, preferring the server's `error`/`message` field.
    pub fn server_message(&self) -> String {
        match self {
            StudioApiError::ApiError { body, .. } => {
                serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")
                            .or_else(|| v.get("message"))
                            .and_then(|m| m.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| body.clone())
            }
            other => other.to_string(),
        }
    }
}

impl StudioApi {
    /// Create a client from configuration, applying the request timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, StudioApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Self::with_client(client, &config.api_url, config.api_token.clone())
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: &str,
        api_token: Option<String>,
    ) -> Result<Self, StudioApiError> {
        let base_url = Url::parse(api_url)
            .map_err(|e| StudioApiError::InvalidUrl(format!("{api_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StudioApiError::InvalidUrl(api_url.to_string()));
        }
        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch an artifact's bytes (the "download" action).
    ///
    /// Artifact URLs are usually CDN links, so no credentials are sent.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, StudioApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Append path segments to the base URL. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StudioApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StudioApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`StudioApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StudioApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::debug!(status = status.as_u16(), body = %body, "Backend returned an error status");
            return Err(StudioApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StudioApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), StudioApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl JobBackend for StudioApi {
    /// `POST /api/uploads`
    async fn request_upload(
        &self,
        request: UploadTargetRequest,
    ) -> Result<UploadTarget, StudioApiError> {
        let url = self.endpoint(&["api", "uploads"])?;
        let response = self
            .authorized(self.client.post(url))
            .json(&request)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `PUT` to the pre-signed target. Only the target's own headers are
    /// sent; the API token never leaves for the storage service.
    async fn upload(
        &self,
        target: &UploadTarget,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StudioApiError> {
        let mut builder = self
            .client
            .put(&target.upload_url)
            .header(CONTENT_TYPE, content_type);
        for (name, value) in &target.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let size = bytes.len();
        let response = builder.body(bytes).send().await?;
        Self::check_status(response).await?;
        tracing::debug!(size, content_type, "Uploaded to storage");
        Ok(())
    }

    /// `POST /api/tools/{tool}/jobs`
    async fn create_job(
        &self,
        tool: Tool,
        body: CreateJobBody,
        idempotency_key: &str,
    ) -> Result<CreateJobResponse, StudioApiError> {
        let url = self.endpoint(&["api", "tools", tool.slug(), "jobs"])?;
        tracing::debug!(tool = %tool, idempotency_key, "Creating job");
        let response = self
            .authorized(self.client.post(url))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `GET /api/tools/{tool}/jobs/{jobId}`
    async fn job_status(
        &self,
        tool: Tool,
        job_id: &str,
    ) -> Result<JobStatusResponse, StudioApiError> {
        let url = self.endpoint(&["api", "tools", tool.slug(), "jobs", job_id])?;
        let response = self.authorized(self.client.get(url)).send().await?;
        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> StudioApi {
        StudioApi::with_client(reqwest::Client::new(), base, None).unwrap()
    }

    #[test]
    fn endpoint_joins_segments() {
        let url = api("http://localhost:3000")
            .endpoint(&["api", "tools", "meme-generator", "jobs"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/tools/meme-generator/jobs");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let url = api("https://studio.example.com/v2/")
            .endpoint(&["api", "uploads"])
            .unwrap();
        assert_eq!(url.as_str(), "https://studio.example.com/v2/api/uploads");
    }

    #[test]
    fn endpoint_encodes_job_id() {
        let url = api("http://localhost:3000")
            .endpoint(&["jobs", "a/b c"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/jobs/a%2Fb%20c");
    }

    #[test]
    fn unparseable_base_rejected() {
        assert!(StudioApi::with_client(reqwest::Client::new(), "not a url", None).is_err());
        assert!(StudioApi::with_client(reqwest::Client::new(), "mailto:x@y.z", None).is_err());
    }

    #[test]
    fn transient_classification() {
        let err = |status| StudioApiError::ApiError {
            status,
            body: String::new(),
        };
        assert!(err(503).is_transient());
        assert!(err(429).is_transient());
        assert!(err(408).is_transient());
        assert!(!err(404).is_transient());
        assert!(!err(422).is_transient());
        assert!(!StudioApiError::InvalidUrl("x".into()).is_transient());
    }

    #[test]
    fn server_message_prefers_json_error_field() {
        let err = StudioApiError::ApiError {
            status: 422,
            body: r#"{"error":"Unsupported video codec"}"#.into(),
        };
        assert_eq!(err.server_message(), "Unsupported video codec");

        let err = StudioApiError::ApiError {
            status: 400,
            body: r#"{"message":"Bad size"}"#.into(),
        };
        assert_eq!(err.server_message(), "Bad size");

        let err = StudioApiError::ApiError {
            status: 502,
            body: "upstream down".into(),
        };
        assert_eq!(err.server_message(), "upstream down");
        assert_eq!(err.status(), Some(502));
    }
}
