#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use studio_backend::api::StudioApiError;
use studio_backend::backend::JobBackend;
use studio_backend::messages::{
    CreateJobBody, CreateJobResponse, JobStatusResponse, UploadTarget, UploadTargetRequest,
};
use studio_core::input::DEFAULT_MAX_UPLOAD_BYTES;
use studio_core::job::JobPhase;
use studio_core::tool::Tool;
use studio_jobs::backoff::PollPolicy;
use studio_jobs::poller::StatusPoller;
use studio_jobs::session::ToolSession;
use studio_jobs::submitter::Submitter;

/// One scripted answer from the status endpoint.
#[derive(Debug, Clone)]
pub enum Step {
    Status(JobStatusResponse),
    /// Answer with this HTTP status.
    Error(u16),
    /// Never answer.
    Hang,
}

pub fn phase(p: JobPhase) -> Step {
    Step::Status(JobStatusResponse::phase(p))
}

pub fn queued_at(position: u32, queue_length: Option<u32>) -> Step {
    Step::Status(JobStatusResponse {
        position: Some(position),
        queue_length,
        ..JobStatusResponse::phase(JobPhase::Queued)
    })
}

pub fn completed_image(url: &str, credits: u32) -> Step {
    Step::Status(JobStatusResponse {
        image_url: Some(url.to_string()),
        credits_used: Some(credits),
        ..JobStatusResponse::phase(JobPhase::Completed)
    })
}

pub fn failed(error: &str) -> Step {
    Step::Status(JobStatusResponse {
        error: Some(error.to_string()),
        ..JobStatusResponse::phase(JobPhase::Failed)
    })
}

fn api_error(status: u16) -> StudioApiError {
    StudioApiError::ApiError {
        status,
        body: format!(r#"{{"error":"scripted {status}"}}"#),
    }
}

/// A backend that answers from scripts and counts every call.
///
/// Each created job takes the next script from the queue (job ids are
/// `job-1`, `job-2`, ...). When a job's script runs out its last step
/// repeats.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    active: Mutex<HashMap<String, VecDeque<Step>>>,
    status_calls: Mutex<HashMap<String, usize>>,
    create_failure: Mutex<Option<u16>>,
    pub created: AtomicUsize,
    pub create_bodies: Mutex<Vec<CreateJobBody>>,
    pub idempotency_keys: Mutex<Vec<String>>,
    pub upload_requests: Mutex<Vec<UploadTargetRequest>>,
    pub uploads: Mutex<Vec<(String, String, usize)>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the status script for the next created job.
    pub fn push_script(&self, steps: Vec<Step>) {
        self.scripts.lock().unwrap().push_back(steps);
    }

    /// Make the next create calls fail with `status` until cleared.
    pub fn fail_creates_with(&self, status: Option<u16>) {
        *self.create_failure.lock().unwrap() = status;
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.created.load(Ordering::SeqCst)
            + self.status_calls.lock().unwrap().values().sum::<usize>()
            + self.upload_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn request_upload(
        &self,
        request: UploadTargetRequest,
    ) -> Result<UploadTarget, StudioApiError> {
        let name = request.filename.clone();
        self.upload_requests.lock().unwrap().push(request);
        Ok(UploadTarget {
            upload_url: format!("https://storage.test/put/{name}"),
            file_url: format!("https://cdn.test/{name}"),
            headers: HashMap::new(),
        })
    }

    async fn upload(
        &self,
        target: &UploadTarget,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StudioApiError> {
        self.uploads.lock().unwrap().push((
            target.upload_url.clone(),
            content_type.to_string(),
            bytes.len(),
        ));
        Ok(())
    }

    async fn create_job(
        &self,
        _tool: Tool,
        body: CreateJobBody,
        idempotency_key: &str,
    ) -> Result<CreateJobResponse, StudioApiError> {
        if let Some(status) = *self.create_failure.lock().unwrap() {
            self.created.fetch_add(1, Ordering::SeqCst);
            return Err(api_error(status));
        }

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let job_id = format!("job-{n}");
        self.create_bodies.lock().unwrap().push(body);
        self.idempotency_keys
            .lock()
            .unwrap()
            .push(idempotency_key.to_string());

        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        self.active
            .lock()
            .unwrap()
            .insert(job_id.clone(), script.into());

        Ok(CreateJobResponse {
            job_id,
            position: Some(3),
            queue_length: Some(6),
            estimated_wait_time: Some(30.0),
        })
    }

    async fn job_status(
        &self,
        _tool: Tool,
        job_id: &str,
    ) -> Result<JobStatusResponse, StudioApiError> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;

        let step = {
            let mut active = self.active.lock().unwrap();
            match active.get_mut(job_id) {
                None => None,
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
            }
        };

        match step {
            None => Err(api_error(404)),
            Some(Step::Status(status)) => Ok(status),
            Some(Step::Error(status)) => Err(api_error(status)),
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// A policy with the production cadence and the given give-up limits.
pub fn policy(max_errors: Option<u32>, max_wait: Option<Duration>) -> PollPolicy {
    PollPolicy {
        max_consecutive_errors: max_errors,
        max_wait,
        request_timeout: Duration::from_secs(5),
        ..PollPolicy::default()
    }
}

pub fn session(
    tool: Tool,
    backend: &Arc<ScriptedBackend>,
    policy: PollPolicy,
) -> ToolSession<ScriptedBackend> {
    ToolSession::new(
        tool,
        Submitter::new(Arc::clone(backend), DEFAULT_MAX_UPLOAD_BYTES),
        StatusPoller::new(Arc::clone(backend), policy),
    )
}
