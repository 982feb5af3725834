//! REST API client for the humanization backend.
//!
//! Wraps the backend's HTTP endpoints (file upload, job submission, job
//! status, style profile listing) using [`reqwest`].

use async_trait::async_trait;
use humanize_core::request::JobRequest;
use humanize_core::status::JobStatusRecord;
use humanize_core::style::StyleProfile;
use humanize_core::types::JobId;
use serde::Deserialize;

use crate::backend::JobBackend;
use crate::error::SubmissionError;

/// HTTP client for a humanization backend.
#[derive(Clone)]
pub struct HumanizeApi {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

/// Response returned by `POST /api/humanize` after queuing a job.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier of the queued job.
    pub job_id: JobId,
    /// Remaining credits for non-premium accounts.
    #[serde(default)]
    pub credits_remaining: Option<i64>,
}

/// Response returned by `POST /api/upload`.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    /// Plain text extracted from the uploaded file.
    pub text: String,
}

/// Error envelope the backend uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code. `detail` is the backend's
    /// message when it sent one, otherwise the raw body.
    #[error("{detail}")]
    Api {
        /// HTTP status code.
        status: u16,
        detail: String,
    },
}

impl ApiError {
    /// HTTP status code, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
        }
    }
}

impl HumanizeApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful to share a connection pool or a configured timeout).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            token: None,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// HTTP API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload a file and return the text the backend extracted from it.
    ///
    /// Sends a multipart `POST /api/upload` with the bytes in the `file` field.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .authorized(self.client.post(self.url("/api/upload")))
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = Self::parse_response(response).await?;
        Ok(body.text)
    }

    /// Submit a transformation request.
    ///
    /// Sends `POST /api/humanize` with the flat request JSON. Returns the
    /// server-assigned job id.
    pub async fn submit_job(&self, request: &JobRequest) -> Result<SubmitResponse, ApiError> {
        let response = self
            .authorized(self.client.post(self.url("/api/humanize")))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current status record of a job via `GET /api/job/{id}`.
    pub async fn get_job(&self, job_id: &JobId) -> Result<JobStatusRecord, ApiError> {
        let response = self
            .authorized(self.client.get(self.url(&format!("/api/job/{job_id}"))))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List the caller's style profiles via `GET /api/style-profiles`.
    pub async fn list_style_profiles(&self) -> Result<Vec<StyleProfile>, ApiError> {
        let response = self
            .authorized(self.client.get(self.url("/api/style-profiles")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`] carrying the
    /// backend's `detail` message (or the raw body) on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                detail: error_detail(&body, status),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Pull the human-readable message out of an error body.
///
/// `{"detail": "..."}` yields the string verbatim; structured details (the
/// backend's validation errors) are kept as compact JSON; anything else falls
/// back to the raw body, or the status reason when the body is empty.
fn error_detail(body: &str, status: reqwest::StatusCode) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(message),
        }) => message,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl JobBackend for HumanizeApi {
    async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        self.upload(file_name, bytes).await
    }

    async fn submit(&self, request: &JobRequest) -> Result<JobId, SubmissionError> {
        let response = self.submit_job(request).await?;
        tracing::debug!(
            job_id = %response.job_id,
            credits_remaining = ?response.credits_remaining,
            "Job accepted by backend",
        );
        Ok(response.job_id)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusRecord, ApiError> {
        self.get_job(job_id).await
    }
}
