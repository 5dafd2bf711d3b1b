//! Job submission: optional upload pre-step, then a single create request.
//!
//! A failed submission leaves nothing behind: no [`Job`] is returned and
//! the caller decides whether to retry from scratch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use studio_backend::api::StudioApiError;
use studio_backend::backend::JobBackend;
use studio_backend::media::{detect_content_type, upload_filename};
use studio_backend::messages::{CreateJobBody, UploadTargetRequest};
use studio_core::error::CoreError;
use studio_core::input::{check_upload_size, validate_source_url, ContentSource, JobRequest};
use studio_core::job::Job;

/// Bytes inspected for magic-number content detection.
const SNIFF_LEN: usize = 64;

/// Errors from submitting a job.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The input failed local validation; nothing was sent.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// The local file could not be read.
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The server refused the payload size.
    #[error("The file is too large for the server to accept")]
    PayloadTooLarge,

    /// The server rejected the request as invalid.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Acquiring the upload target or transferring bytes failed.
    #[error("Upload failed: {0}")]
    Upload(#[source] StudioApiError),

    /// The create request failed.
    #[error("Job creation failed: {0}")]
    Create(#[source] StudioApiError),

    /// The create endpoint answered with something unusable.
    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),
}

impl SubmitError {
    /// Map a backend error, recognizing size and validation rejections.
    fn classify(err: StudioApiError, wrap: fn(StudioApiError) -> SubmitError) -> SubmitError {
        match err.status() {
            Some(413) => SubmitError::PayloadTooLarge,
            Some(400) | Some(422) => SubmitError::Rejected(err.server_message()),
            _ => wrap(err),
        }
    }
}

/// Packages a [`JobRequest`] and sends it to the backend.
pub struct Submitter<B> {
    backend: Arc<B>,
    max_upload_bytes: u64,
}

impl<B> Clone for Submitter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

impl<B: JobBackend> Submitter<B> {
    pub fn new(backend: Arc<B>, max_upload_bytes: u64) -> Self {
        Self {
            backend,
            max_upload_bytes,
        }
    }

    /// Submit a request and return the newly created job.
    ///
    /// Local files are uploaded first and the stored object's URL is used
    /// as the job source.
    pub async fn submit(&self, request: &JobRequest) -> Result<Job, SubmitError> {
        let tool = request.tool();
        request.options.validate()?;

        let source_url = match &request.source {
            ContentSource::Url(url) => {
                validate_source_url(url)?;
                url.clone()
            }
            ContentSource::File(path) => self.upload(path).await?,
        };

        let idempotency_key = uuid::Uuid::new_v4().to_string();
        let body = CreateJobBody {
            source_url,
            options: request.options.clone(),
        };

        let response = self
            .backend
            .create_job(tool, body, &idempotency_key)
            .await
            .map_err(|e| SubmitError::classify(e, SubmitError::Create))?;

        if response.job_id.trim().is_empty() {
            return Err(SubmitError::InvalidResponse(
                "create response carried an empty job id".to_string(),
            ));
        }

        let job = Job::new(response.job_id.clone(), tool, response.snapshot());

        tracing::info!(
            tool = %tool,
            job_id = %job.id,
            position = ?job.snapshot.position,
            queue_length = ?job.snapshot.queue_length,
            "Job submitted",
        );

        Ok(job)
    }

    /// Run the upload pre-step and return the stored object's URL.
    async fn upload(&self, path: &Path) -> Result<String, SubmitError> {
        let io_err = |source| SubmitError::Io {
            path: path.to_path_buf(),
            source,
        };

        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        if !metadata.is_file() {
            return Err(CoreError::Validation(format!("'{}' is not a file", path.display())).into());
        }
        if metadata.len() > self.max_upload_bytes {
            return Err(CoreError::PayloadTooLarge {
                size: metadata.len(),
                limit: self.max_upload_bytes,
            }
            .into());
        }

        // Metadata can understate the size (a growing file, procfs), so
        // the cap is enforced again on what was actually read.
        let mut bytes = Vec::new();
        tokio::fs::File::open(path)
            .await
            .map_err(io_err)?
            .take(self.max_upload_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .await
            .map_err(io_err)?;
        check_upload_size(bytes.len() as u64, self.max_upload_bytes)?;
        let content_type = detect_content_type(path, &bytes[..bytes.len().min(SNIFF_LEN)])?;
        let size = bytes.len() as u64;

        let target = self
            .backend
            .request_upload(UploadTargetRequest {
                filename: upload_filename(path),
                content_type: content_type.to_string(),
                size,
            })
            .await
            .map_err(|e| SubmitError::classify(e, SubmitError::Upload))?;

        self.backend
            .upload(&target, content_type, bytes)
            .await
            .map_err(|e| SubmitError::classify(e, SubmitError::Upload))?;

        tracing::debug!(
            path = %path.display(),
            content_type,
            size,
            file_url = %target.file_url,
            "Upload complete",
        );

        Ok(target.file_url)
    }
}
