//! Per-tool job session: the submit → poll → present state machine.
//!
//! ```text
//! idle --submit--> loading --(poll: queued/processing)--> loading
//! loading --(poll: completed)--> success
//! loading --(poll: failed)--> error
//! success --reset--> idle
//! error --retry--> loading
//! error --reset--> idle
//! ```
//!
//! A [`ToolSession`] exclusively owns its state. Each submission runs in
//! a spawned task tagged with a generation number; the task reports back
//! over a channel and the session drops any report whose generation is
//! not current. Cancelling a submission (new submit, reset, drop) fires
//! its [`CancellationToken`] so no further status query is issued.

use std::fmt;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use studio_backend::backend::JobBackend;
use studio_core::error::CoreError;
use studio_core::input::{validate_source_url, ContentSource, JobRequest};
use studio_core::job::{Artifact, Job, JobPhase, JobResult, QueueSnapshot};
use studio_core::tool::Tool;
use studio_core::types::Credits;

use crate::events::ToolEvent;
use crate::poller::{PollOutcome, StatusPoller};
use crate::submitter::{SubmitError, Submitter};

/// Broadcast channel capacity for session events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// What the session is currently showing.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing submitted, ready for input.
    Idle,
    /// Submitting or waiting on the job. `job` is `None` until the
    /// backend has accepted the submission.
    Loading { job: Option<Job> },
    /// The job completed.
    Success {
        job: Job,
        artifact: Artifact,
        credits_used: Credits,
    },
    /// Submission failed, the server failed the job, or polling gave up.
    Error { job: Option<Job>, message: String },
}

/// Discriminant of [`SessionState`], for transition checks and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateKind::Idle => "idle",
            StateKind::Loading => "loading",
            StateKind::Success => "success",
            StateKind::Error => "error",
        })
    }
}

impl SessionState {
    pub fn kind(&self) -> StateKind {
        match self {
            SessionState::Idle => StateKind::Idle,
            SessionState::Loading { .. } => StateKind::Loading,
            SessionState::Success { .. } => StateKind::Success,
            SessionState::Error { .. } => StateKind::Error,
        }
    }

    /// `true` for success and error, which only user action leaves.
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::Success { .. } | SessionState::Error { .. })
    }

    /// The job currently associated with the state, if any.
    pub fn job(&self) -> Option<&Job> {
        match self {
            SessionState::Idle => None,
            SessionState::Loading { job } | SessionState::Error { job, .. } => job.as_ref(),
            SessionState::Success { job, .. } => Some(job),
        }
    }
}

/// Errors from driving a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request failed local validation; the state is unchanged.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// The action is not allowed from the current state.
    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: StateKind, action: &'static str },
}

// ---------------------------------------------------------------------------
// Task reports
// ---------------------------------------------------------------------------

enum Report {
    Submitted(Job),
    Progress {
        phase: JobPhase,
        snapshot: QueueSnapshot,
    },
    Finished(PollOutcome),
    SubmitFailed(SubmitError),
}

struct Envelope {
    generation: u64,
    report: Report,
}

struct ActiveSubmission {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// ToolSession
// ---------------------------------------------------------------------------

/// Job state for one tool, owned by one view or command.
pub struct ToolSession<B: JobBackend> {
    tool: Tool,
    submitter: Submitter<B>,
    poller: StatusPoller<B>,
    state: SessionState,
    last_request: Option<JobRequest>,
    generation: u64,
    active: Option<ActiveSubmission>,
    report_tx: mpsc::UnboundedSender<Envelope>,
    report_rx: mpsc::UnboundedReceiver<Envelope>,
    event_tx: broadcast::Sender<ToolEvent>,
}

impl<B: JobBackend> ToolSession<B> {
    pub fn new(tool: Tool, submitter: Submitter<B>, poller: StatusPoller<B>) -> Self {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tool,
            submitter,
            poller,
            state: SessionState::Idle,
            last_request: None,
            generation: 0,
            active: None,
            report_tx,
            report_rx,
            event_tx,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Subscribe to events from this session.
    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.event_tx.subscribe()
    }

    /// Start a new submission, replacing any job in progress.
    ///
    /// Validation runs synchronously; on failure nothing is sent and the
    /// state is left as it was. Must be called within a Tokio runtime.
    pub fn submit(&mut self, request: JobRequest) -> Result<(), SessionError> {
        self.validate(&request)?;

        self.cancel_active();
        self.generation += 1;
        let generation = self.generation;

        tracing::info!(tool = %self.tool, generation, "Starting submission");

        self.state = SessionState::Loading { job: None };
        self.last_request = Some(request.clone());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_submission(
            self.submitter.clone(),
            self.poller.clone(),
            request,
            generation,
            cancel.clone(),
            self.report_tx.clone(),
        ));
        self.active = Some(ActiveSubmission { cancel, handle });
        Ok(())
    }

    /// Re-submit the last request. Only valid in the error state.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        let from = self.state.kind();
        if from != StateKind::Error {
            return Err(SessionError::InvalidTransition {
                from,
                action: "retry",
            });
        }
        let request = self
            .last_request
            .clone()
            .ok_or(SessionError::InvalidTransition {
                from,
                action: "retry",
            })?;
        tracing::info!(tool = %self.tool, "Retrying submission");
        self.submit(request)
    }

    /// Drop all job state and return to idle.
    pub fn reset(&mut self) {
        self.cancel_active();
        self.generation += 1;
        self.state = SessionState::Idle;
        self.last_request = None;
        tracing::debug!(tool = %self.tool, "Session reset");
        let _ = self.event_tx.send(ToolEvent::SessionReset { tool: self.tool });
    }

    /// Wait for and apply the next report of the current submission.
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn next_update(&mut self) -> Option<&SessionState> {
        self.active.as_ref()?;

        loop {
            let envelope = self.report_rx.recv().await?;
            if envelope.generation != self.generation {
                tracing::trace!(
                    stale = envelope.generation,
                    current = self.generation,
                    "Dropping report from superseded submission",
                );
                continue;
            }
            self.apply(envelope.report);
            return Some(&self.state);
        }
    }

    /// Drive the session until it settles in success or error.
    ///
    /// Returns immediately if nothing is in flight.
    pub async fn wait_settled(&mut self) -> &SessionState {
        loop {
            let done = match self.next_update().await {
                Some(state) => state.is_settled(),
                None => true,
            };
            if done {
                return &self.state;
            }
        }
    }

    // ---- private helpers ----

    fn validate(&self, request: &JobRequest) -> Result<(), CoreError> {
        if request.tool() != self.tool {
            return Err(CoreError::Validation(format!(
                "{} options sent to the {} tool",
                request.tool(),
                self.tool
            )));
        }
        if let ContentSource::Url(url) = &request.source {
            validate_source_url(url)?;
        }
        request.options.validate()
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            tracing::debug!(tool = %self.tool, generation = self.generation, "Cancelled active submission");
            // The task exits at its next cancellation check; it is not awaited.
            drop(active.handle);
        }
    }

    fn apply(&mut self, report: Report) {
        let tool = self.tool;
        match report {
            Report::Submitted(job) => {
                let _ = self.event_tx.send(ToolEvent::JobSubmitted {
                    tool,
                    job_id: job.id.clone(),
                    snapshot: job.snapshot,
                });
                self.state = SessionState::Loading { job: Some(job) };
            }
            Report::Progress { phase, snapshot } => {
                if let SessionState::Loading { job: Some(job) } = &mut self.state {
                    if job.observe(phase, &snapshot) {
                        let _ = self.event_tx.send(ToolEvent::JobProgress {
                            tool,
                            job_id: job.id.clone(),
                            phase,
                            snapshot: job.snapshot,
                        });
                    }
                }
            }
            Report::Finished(outcome) => {
                self.active = None;
                let mut job = match std::mem::replace(&mut self.state, SessionState::Idle) {
                    SessionState::Loading { job } => job,
                    other => other.job().cloned(),
                };
                self.state = match outcome {
                    PollOutcome::Finished(JobResult::Completed {
                        artifact,
                        credits_used,
                    }) => match job.take() {
                        Some(mut job) => {
                            job.observe(JobPhase::Completed, &QueueSnapshot::default());
                            tracing::info!(tool = %tool, job_id = %job.id, credits_used, "Job completed");
                            let _ = self.event_tx.send(ToolEvent::JobCompleted {
                                tool,
                                job_id: job.id.clone(),
                                artifact: artifact.clone(),
                                credits_used,
                            });
                            SessionState::Success {
                                job,
                                artifact,
                                credits_used,
                            }
                        }
                        None => self.fail(None, "job completed before it was submitted".to_string()),
                    },
                    PollOutcome::Finished(JobResult::Failed { error }) => {
                        if let Some(job) = job.as_mut() {
                            job.observe(JobPhase::Failed, &QueueSnapshot::default());
                        }
                        self.fail(job, error)
                    }
                    PollOutcome::GaveUp { reason } => self.fail(job, reason),
                    PollOutcome::Cancelled => SessionState::Idle,
                };
            }
            Report::SubmitFailed(err) => {
                self.active = None;
                self.state = self.fail(None, err.to_string());
            }
        }
    }

    fn fail(&self, job: Option<Job>, message: String) -> SessionState {
        let job_id = job.as_ref().map(|j| j.id.clone());
        tracing::warn!(tool = %self.tool, job_id = ?job_id, error = %message, "Job failed");
        let _ = self.event_tx.send(ToolEvent::JobFailed {
            tool: self.tool,
            job_id,
            error: message.clone(),
        });
        SessionState::Error { job, message }
    }
}

impl<B: JobBackend> Drop for ToolSession<B> {
    fn drop(&mut self) {
        self.cancel_active();
    }
}

/// Body of the spawned submission task.
async fn run_submission<B: JobBackend>(
    submitter: Submitter<B>,
    poller: StatusPoller<B>,
    request: JobRequest,
    generation: u64,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Envelope>,
) {
    let send = |report: Report| {
        let _ = tx.send(Envelope { generation, report });
    };

    let submitted = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = submitter.submit(&request) => result,
    };

    let job = match submitted {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(tool = %request.tool(), error = %e, "Submission failed");
            send(Report::SubmitFailed(e));
            return;
        }
    };

    let tool = job.tool;
    let job_id = job.id.clone();
    send(Report::Submitted(job));

    let outcome = poller
        .poll(tool, &job_id, &cancel, |phase, snapshot| {
            send(Report::Progress { phase, snapshot });
        })
        .await;

    if outcome != PollOutcome::Cancelled {
        send(Report::Finished(outcome));
    }
}
