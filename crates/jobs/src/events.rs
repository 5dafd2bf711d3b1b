//! Events published by a [`ToolSession`](crate::session::ToolSession).
//!
//! Only the session's current submission produces events; reports from
//! a superseded job are dropped before they get here. Transient polling
//! failures are deliberately absent: they are logged, not surfaced.

use serde::Serialize;
use studio_core::job::{Artifact, JobPhase, QueueSnapshot};
use studio_core::tool::Tool;
use studio_core::types::{Credits, JobId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolEvent {
    /// The backend accepted a submission.
    JobSubmitted {
        tool: Tool,
        job_id: JobId,
        snapshot: QueueSnapshot,
    },

    /// A status query returned a non-terminal phase.
    JobProgress {
        tool: Tool,
        job_id: JobId,
        phase: JobPhase,
        /// Merged snapshot, not the raw partial update.
        snapshot: QueueSnapshot,
    },

    /// The job finished with an artifact.
    JobCompleted {
        tool: Tool,
        job_id: JobId,
        artifact: Artifact,
        credits_used: Credits,
    },

    /// The submission or the job failed.
    JobFailed {
        tool: Tool,
        /// `None` when the failure happened before a job existed.
        job_id: Option<JobId>,
        error: String,
    },

    /// The session went back to idle.
    SessionReset { tool: Tool },
}
