//! Human-readable lines for session events and results.

use std::time::Duration;

use studio_core::job::{Artifact, JobPhase, QueueSnapshot};
use studio_jobs::events::ToolEvent;

/// Format an advisory wait as `45s` or `2m 05s`.
pub fn format_wait(wait: Duration) -> String {
    let secs = wait.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// Describe where a job sits in the queue. Unknown fields are left out.
pub fn describe_queue(phase: JobPhase, snapshot: &QueueSnapshot) -> String {
    let mut line = phase.to_string();
    match (snapshot.position, snapshot.queue_length) {
        (Some(position), Some(length)) => line.push_str(&format!(", position {position} of {length}")),
        (Some(position), None) => line.push_str(&format!(", position {position}")),
        (None, Some(length)) => line.push_str(&format!(", {length} in queue")),
        (None, None) => {}
    }
    if let Some(wait) = snapshot.estimated_wait {
        line.push_str(&format!(", about {} left", format_wait(wait)));
    }
    line
}

/// Progress line for an event, if it is one the user should see live.
///
/// Completion and failure are reported from the final session state.
pub fn progress_line(event: &ToolEvent) -> Option<String> {
    match event {
        ToolEvent::JobSubmitted {
            tool,
            job_id,
            snapshot,
        } => Some(format!(
            "{tool} job {job_id} submitted ({})",
            describe_queue(JobPhase::Submitted, snapshot)
        )),
        ToolEvent::JobProgress {
            phase, snapshot, ..
        } => Some(describe_queue(*phase, snapshot)),
        ToolEvent::JobCompleted { .. }
        | ToolEvent::JobFailed { .. }
        | ToolEvent::SessionReset { .. } => None,
    }
}

/// Result lines for a finished artifact.
pub fn artifact_lines(artifact: &Artifact) -> Vec<String> {
    match artifact {
        Artifact::Image { url } => vec![format!("Image: {url}")],
        Artifact::Captions {
            captions,
            image_url,
        } => {
            let mut lines: Vec<String> = captions
                .iter()
                .enumerate()
                .map(|(i, caption)| format!("{}. {caption}", i + 1))
                .collect();
            if let Some(url) = image_url {
                lines.push(format!("Image: {url}"));
            }
            lines
        }
        Artifact::Thumbnails { thumbnails } => thumbnails
            .iter()
            .map(|t| match (t.width, t.height) {
                (Some(w), Some(h)) => format!("{} ({w}x{h})", t.url),
                _ => t.url.clone(),
            })
            .collect(),
    }
}
