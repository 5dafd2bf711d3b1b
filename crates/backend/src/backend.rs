//! The seam between the job poller and the remote service.
//!
//! [`StudioApi`](crate::api::StudioApi) is the production implementation;
//! tests substitute scripted backends.

use async_trait::async_trait;
use studio_core::tool::Tool;

use crate::api::StudioApiError;
use crate::messages::{
    CreateJobBody, CreateJobResponse, JobStatusResponse, UploadTarget, UploadTargetRequest,
};

/// Operations the submitter and poller need from the backend.
#[async_trait]
pub trait JobBackend: Send + Sync + 'static {
    /// Acquire a destination for a local file's bytes.
    async fn request_upload(
        &self,
        request: UploadTargetRequest,
    ) -> Result<UploadTarget, StudioApiError>;

    /// Transfer raw bytes to a previously acquired upload target.
    async fn upload(
        &self,
        target: &UploadTarget,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StudioApiError>;

    /// Create a job. `idempotency_key` is unique per submission attempt.
    async fn create_job(
        &self,
        tool: Tool,
        body: CreateJobBody,
        idempotency_key: &str,
    ) -> Result<CreateJobResponse, StudioApiError>;

    /// Fetch the current state of a job.
    async fn job_status(
        &self,
        tool: Tool,
        job_id: &str,
    ) -> Result<JobStatusResponse, StudioApiError>;
}
