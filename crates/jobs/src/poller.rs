//! Fixed-interval status polling for a single job.
//!
//! [`StatusPoller::poll`] queries the status endpoint until the job
//! reaches a terminal phase, the caller cancels, or a give-up limit from
//! the [`PollPolicy`] is hit. Queries are strictly sequential: the next
//! one is never issued while the previous is outstanding, and ticks
//! missed during a slow query are skipped rather than bunched up.
//!
//! Transient query failures (transport, timeout, `408`, `429`, `5xx`) are
//! logged and retried with backoff and never fail the job on their own.
//! A `404` or any other client error ends polling: retrying the same
//! request cannot succeed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use studio_backend::backend::JobBackend;
use studio_core::job::{JobPhase, JobResult, QueueSnapshot};
use studio_core::tool::Tool;

use crate::backoff::{next_delay, PollPolicy};

/// Shortest interval the poller will run at.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Failure message when the backend no longer knows the job.
pub const JOB_NOT_FOUND_ERROR: &str = "job not found";

/// Prefix of the failure message when the backend refuses a status query
/// outright (auth, bad request).
pub const STATUS_REJECTED_ERROR: &str = "status check rejected";

/// How a polling run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The server reported a terminal phase.
    Finished(JobResult),
    /// A give-up limit was reached before the job finished.
    GaveUp { reason: String },
    /// The caller cancelled.
    Cancelled,
}

/// Queries job status on a fixed interval.
pub struct StatusPoller<B> {
    backend: Arc<B>,
    policy: PollPolicy,
}

impl<B> Clone for StatusPoller<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            policy: self.policy.clone(),
        }
    }
}

impl<B: JobBackend> StatusPoller<B> {
    pub fn new(backend: Arc<B>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll `job_id` until it is terminal, cancelled, or given up.
    ///
    /// `on_update` is called with every non-terminal phase and the raw
    /// (partial) snapshot of that response. No query is started after
    /// `cancel` fires, and an in-flight query is abandoned.
    pub async fn poll<F>(
        &self,
        tool: Tool,
        job_id: &str,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> PollOutcome
    where
        F: FnMut(JobPhase, QueueSnapshot) + Send,
    {
        let interval = self.policy.interval.max(MIN_INTERVAL);
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut delay = interval;
        let mut consecutive_errors: u32 = 0;
        let mut polls: u64 = 0;

        tracing::debug!(
            tool = %tool,
            job_id,
            interval_ms = interval.as_millis() as u64,
            "Polling started",
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(job_id, polls, "Polling cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            if let Some(max_wait) = self.policy.max_wait {
                if started.elapsed() >= max_wait {
                    tracing::warn!(job_id, polls, waited_secs = max_wait.as_secs(), "Giving up on job");
                    return PollOutcome::GaveUp {
                        reason: format!(
                            "gave up waiting after {}s; the job may still finish on the server",
                            max_wait.as_secs()
                        ),
                    };
                }
            }

            polls += 1;
            let query = tokio::time::timeout(
                self.policy.request_timeout,
                self.backend.job_status(tool, job_id),
            );
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(job_id, polls, "Polling cancelled mid-request");
                    return PollOutcome::Cancelled;
                }
                result = query => result,
            };

            let failure = match result {
                Ok(Ok(status)) => {
                    consecutive_errors = 0;
                    if delay != interval {
                        delay = interval;
                        ticker.reset_after(interval);
                    }

                    let phase = status.status;
                    tracing::debug!(
                        job_id,
                        phase = %phase,
                        position = ?status.position,
                        queue_length = ?status.queue_length,
                        "Job status",
                    );

                    let snapshot = status.snapshot();
                    match status.into_result(tool) {
                        Some(result) => {
                            tracing::info!(job_id, polls, phase = %phase, "Job reached terminal phase");
                            return PollOutcome::Finished(result);
                        }
                        None => {
                            on_update(phase, snapshot);
                            continue;
                        }
                    }
                }
                Ok(Err(e)) if e.status() == Some(404) => {
                    tracing::error!(job_id, "Job not found on server");
                    return PollOutcome::Finished(JobResult::Failed {
                        error: JOB_NOT_FOUND_ERROR.to_string(),
                    });
                }
                Ok(Err(e)) if !e.is_transient() => {
                    tracing::error!(job_id, status = ?e.status(), error = %e, "Status query rejected");
                    return PollOutcome::Finished(JobResult::Failed {
                        error: format!("{STATUS_REJECTED_ERROR}: {}", e.server_message()),
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "status query timed out after {}s",
                    self.policy.request_timeout.as_secs()
                ),
            };

            consecutive_errors += 1;
            tracing::warn!(
                job_id,
                consecutive_errors,
                error = %failure,
                "Status query failed, will retry",
            );

            if let Some(max) = self.policy.max_consecutive_errors {
                if consecutive_errors >= max {
                    tracing::error!(job_id, consecutive_errors, "Giving up on job");
                    return PollOutcome::GaveUp {
                        reason: format!(
                            "gave up after {consecutive_errors} failed status checks: {failure}"
                        ),
                    };
                }
            }

            delay = next_delay(delay, &self.policy).max(interval);
            ticker.reset_after(delay);
        }
    }
}
