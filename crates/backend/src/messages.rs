//! Wire messages for the backend's JSON endpoints.
//!
//! All bodies use camelCase field names. Queue metadata and result
//! fields are optional on every response; conversion helpers turn them
//! into the domain [`QueueSnapshot`] and [`JobResult`].

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use studio_core::job::{Artifact, JobPhase, JobResult, QueueSnapshot, Thumbnail};
use studio_core::tool::{Tool, ToolOptions};

/// Message used when a completed job carries no usable result.
pub const MISSING_RESULT_ERROR: &str = "job completed without a result";
/// Message used when a failed job carries no error text.
pub const UNKNOWN_FAILURE_ERROR: &str = "job failed";

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Body of `POST /api/uploads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetRequest {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Where to `PUT` the raw bytes, and how to reference them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// Pre-signed destination for the bytes.
    pub upload_url: String,
    /// URL of the stored object, used as the job's source.
    pub file_url: String,
    /// Extra headers the storage service requires on the `PUT`.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Body of `POST /api/tools/{tool}/jobs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobBody {
    pub source_url: String,
    pub options: ToolOptions,
}

/// Response of the create endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: String,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub queue_length: Option<u32>,
    /// Seconds.
    #[serde(default)]
    pub estimated_wait_time: Option<f64>,
}

impl CreateJobResponse {
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            position: self.position,
            queue_length: self.queue_length,
            estimated_wait: wait_from_secs(self.estimated_wait_time),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Response of `GET /api/tools/{tool}/jobs/{jobId}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: JobPhase,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub queue_length: Option<u32>,
    /// Seconds.
    #[serde(default)]
    pub estimated_wait_time: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub captions: Option<Vec<String>>,
    #[serde(default)]
    pub thumbnails: Option<Vec<Thumbnail>>,
    #[serde(default)]
    pub credits_used: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatusResponse {
    /// A response carrying only a phase. Handy for building fixtures.
    pub fn phase(status: JobPhase) -> Self {
        Self {
            status,
            position: None,
            queue_length: None,
            estimated_wait_time: None,
            image_url: None,
            captions: None,
            thumbnails: None,
            credits_used: None,
            error: None,
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            position: self.position,
            queue_length: self.queue_length,
            estimated_wait: wait_from_secs(self.estimated_wait_time),
        }
    }

    /// Convert a terminal response into a [`JobResult`] for `tool`.
    ///
    /// Returns `None` for non-terminal phases. A completed response that
    /// lacks the field the tool produces becomes a failure.
    pub fn into_result(self, tool: Tool) -> Option<JobResult> {
        match self.status {
            JobPhase::Completed => {
                let credits_used = self.credits_used.unwrap_or(0);
                let artifact = match tool {
                    Tool::BackgroundRemover => self.image_url.map(|url| Artifact::Image { url }),
                    Tool::MemeGenerator => self
                        .captions
                        .filter(|c| !c.is_empty())
                        .map(|captions| Artifact::Captions {
                            captions,
                            image_url: self.image_url,
                        }),
                    Tool::ThumbnailGenerator => self
                        .thumbnails
                        .filter(|t| !t.is_empty())
                        .map(|thumbnails| Artifact::Thumbnails { thumbnails }),
                };
                Some(match artifact {
                    Some(artifact) => JobResult::Completed {
                        artifact,
                        credits_used,
                    },
                    None => JobResult::Failed {
                        error: MISSING_RESULT_ERROR.to_string(),
                    },
                })
            }
            JobPhase::Failed => Some(JobResult::Failed {
                error: self
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_FAILURE_ERROR.to_string()),
            }),
            _ => None,
        }
    }
}

/// Convert an advisory wait in seconds, dropping negative or non-finite values.
fn wait_from_secs(secs: Option<f64>) -> Option<Duration> {
    secs.and_then(|s| Duration::try_from_secs_f64(s).ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(json: serde_json::Value) -> JobStatusResponse {
        serde_json::from_value(json).expect("valid status response")
    }

    // -- create --------------------------------------------------------------

    #[test]
    fn create_response_with_only_job_id() {
        let resp: CreateJobResponse =
            serde_json::from_value(serde_json::json!({"jobId": "abc"})).unwrap();
        assert_eq!(resp.job_id, "abc");
        assert!(resp.snapshot().is_empty());
    }

    #[test]
    fn create_response_snapshot() {
        let resp: CreateJobResponse = serde_json::from_value(serde_json::json!({
            "jobId": "abc", "position": 3, "queueLength": 8, "estimatedWaitTime": 12.5
        }))
        .unwrap();
        let s = resp.snapshot();
        assert_eq!(s.position, Some(3));
        assert_eq!(s.queue_length, Some(8));
        assert_eq!(s.estimated_wait, Some(Duration::from_millis(12_500)));
    }

    #[test]
    fn negative_wait_is_dropped() {
        let resp = parse(serde_json::json!({"status": "queued", "estimatedWaitTime": -4.0}));
        assert_eq!(resp.snapshot().estimated_wait, None);
    }

    #[test]
    fn create_body_serializes_options_inline() {
        let body = CreateJobBody {
            source_url: "https://cdn/x.png".into(),
            options: studio_core::tool::BackgroundRemoverOptions::default().into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sourceUrl"], "https://cdn/x.png");
        assert_eq!(json["options"]["format"], "png");
    }

    // -- into_result ---------------------------------------------------------

    #[test]
    fn non_terminal_has_no_result() {
        let resp = parse(serde_json::json!({"status": "processing"}));
        assert!(resp.into_result(Tool::MemeGenerator).is_none());
    }

    #[test]
    fn completed_background_removal() {
        let resp = parse(serde_json::json!({
            "status": "completed", "imageUrl": "https://cdn/cut.png", "creditsUsed": 2
        }));
        assert_eq!(
            resp.into_result(Tool::BackgroundRemover),
            Some(JobResult::Completed {
                artifact: Artifact::Image {
                    url: "https://cdn/cut.png".into()
                },
                credits_used: 2,
            })
        );
    }

    #[test]
    fn completed_memes_keep_optional_image() {
        let resp = parse(serde_json::json!({
            "status": "completed", "captions": ["when the build passes"], "creditsUsed": 1
        }));
        assert_matches!(
            resp.into_result(Tool::MemeGenerator),
            Some(JobResult::Completed {
                artifact: Artifact::Captions { captions, image_url: None },
                credits_used: 1,
            }) if captions.len() == 1
        );
    }

    #[test]
    fn completed_thumbnails_parse_dimensions() {
        let resp = parse(serde_json::json!({
            "status": "completed",
            "thumbnails": [{"url": "https://cdn/1.jpg", "width": 1280, "height": 720}, {"url": "https://cdn/2.jpg"}]
        }));
        let result = resp.into_result(Tool::ThumbnailGenerator).unwrap();
        assert_matches!(
            result,
            JobResult::Completed { artifact: Artifact::Thumbnails { thumbnails }, credits_used: 0 }
                if thumbnails.len() == 2 && thumbnails[0].width == Some(1280)
        );
    }

    #[test]
    fn completed_without_tool_field_is_failure() {
        let resp = parse(serde_json::json!({"status": "completed", "imageUrl": "https://cdn/x.png"}));
        assert_eq!(
            resp.into_result(Tool::ThumbnailGenerator),
            Some(JobResult::Failed {
                error: MISSING_RESULT_ERROR.into()
            })
        );
    }

    #[test]
    fn failed_uses_server_message() {
        let resp = parse(serde_json::json!({"status": "failed", "error": "No face detected"}));
        assert_eq!(
            resp.into_result(Tool::MemeGenerator),
            Some(JobResult::Failed {
                error: "No face detected".into()
            })
        );
    }

    #[test]
    fn failed_without_message_gets_generic_text() {
        let resp = parse(serde_json::json!({"status": "failed", "error": " "}));
        assert_eq!(
            resp.into_result(Tool::MemeGenerator),
            Some(JobResult::Failed {
                error: UNKNOWN_FAILURE_ERROR.into()
            })
        );
    }

    #[test]
    fn upload_target_headers_default_empty() {
        let target: UploadTarget = serde_json::from_value(serde_json::json!({
            "uploadUrl": "https://s3/put", "fileUrl": "https://cdn/obj"
        }))
        .unwrap();
        assert!(target.headers.is_empty());
    }
}
