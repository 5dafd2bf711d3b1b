//! Job model: phases, queue snapshots, and terminal results.
//!
//! A [`Job`] is only ever mutated through [`Job::observe`], which applies
//! a server-reported phase and queue snapshot. Once the job reaches a
//! terminal phase every further observation is refused.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::tool::Tool;
use crate::types::{Credits, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle phase of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    /// Accepted by the create endpoint, not yet observed by the poller.
    Submitted,
    /// Waiting in the remote processing queue.
    Queued,
    /// A worker is producing the artifact.
    Processing,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobPhase {
    /// `true` for [`Completed`](Self::Completed) and [`Failed`](Self::Failed).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Submitted => "submitted",
            JobPhase::Queued => "queued",
            JobPhase::Processing => "processing",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Queue snapshot
// ---------------------------------------------------------------------------

/// Advisory queue metadata for a job. Every field may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    /// Zero-based position in the remote queue.
    pub position: Option<u32>,
    /// Total number of jobs in the queue.
    pub queue_length: Option<u32>,
    /// Server estimate of the remaining wait.
    pub estimated_wait: Option<Duration>,
}

impl QueueSnapshot {
    /// `true` when no field is known.
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.queue_length.is_none() && self.estimated_wait.is_none()
    }

    /// Merge a partial update into this snapshot.
    ///
    /// Only fields present in `update` overwrite prior values; absent
    /// fields keep what was previously known. After merging, a known
    /// queue length is never smaller than a known position.
    pub fn merge(&mut self, update: &QueueSnapshot) {
        if let Some(position) = update.position {
            self.position = Some(position);
        }
        if let Some(length) = update.queue_length {
            self.queue_length = Some(length);
        }
        if let Some(wait) = update.estimated_wait {
            self.estimated_wait = Some(wait);
        }
        if let (Some(position), Some(length)) = (self.position, self.queue_length) {
            if length < position {
                self.queue_length = Some(position);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Client-side view of one remote job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub tool: Tool,
    pub phase: JobPhase,
    pub snapshot: QueueSnapshot,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Create a job from a successful create response.
    pub fn new(id: JobId, tool: Tool, initial: QueueSnapshot) -> Self {
        let now = Utc::now();
        let mut snapshot = QueueSnapshot::default();
        snapshot.merge(&initial);
        Self {
            id,
            tool,
            phase: JobPhase::Submitted,
            snapshot,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a server observation.
    ///
    /// Returns `false` (and changes nothing) when the job is already in a
    /// terminal phase.
    pub fn observe(&mut self, phase: JobPhase, update: &QueueSnapshot) -> bool {
        if self.phase.is_terminal() {
            tracing::warn!(
                job_id = %self.id,
                current = %self.phase,
                reported = %phase,
                "Ignoring observation for terminal job",
            );
            return false;
        }
        self.phase = phase;
        self.snapshot.merge(update);
        self.updated_at = Utc::now();
        true
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One generated thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// What a completed job produced, per tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// Background remover output.
    Image { url: String },
    /// Meme generator output: caption suggestions plus an optional render.
    Captions {
        captions: Vec<String>,
        image_url: Option<String>,
    },
    /// Thumbnail generator output.
    Thumbnails { thumbnails: Vec<Thumbnail> },
}

impl Artifact {
    /// The URL a "download" action would fetch, if the artifact has one.
    pub fn primary_url(&self) -> Option<&str> {
        match self {
            Artifact::Image { url } => Some(url),
            Artifact::Captions { image_url, .. } => image_url.as_deref(),
            Artifact::Thumbnails { thumbnails } => thumbnails.first().map(|t| t.url.as_str()),
        }
    }
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    Completed {
        artifact: Artifact,
        credits_used: Credits,
    },
    Failed {
        error: String,
    },
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Completed { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
