//! User input for a job submission and its local validation.
//!
//! Everything here runs before any network call: a request with no
//! content source, a malformed URL, out-of-range options, or an
//! oversized file never reaches the backend.

use std::path::PathBuf;

use crate::error::CoreError;
use crate::tool::{Tool, ToolOptions};

/// Default ceiling on local file uploads (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Where the content to process comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// A local file that must be uploaded before the job is created.
    File(PathBuf),
    /// A remote URL the backend fetches itself.
    Url(String),
}

impl ContentSource {
    pub fn is_file(&self) -> bool {
        matches!(self, ContentSource::File(_))
    }
}

/// A validated submission: one content source plus tool options.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub source: ContentSource,
    pub options: ToolOptions,
}

impl JobRequest {
    /// Build a request from the raw inputs a tool form collects.
    ///
    /// At least one of `file` and `url` must be given. When both are
    /// present the file takes precedence.
    pub fn new(
        file: Option<PathBuf>,
        url: Option<String>,
        options: impl Into<ToolOptions>,
    ) -> Result<Self, CoreError> {
        let options = options.into();
        let url = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

        let source = match (file, url) {
            (Some(path), url) => {
                if url.is_some() {
                    tracing::debug!(path = %path.display(), "Both file and URL given, using file");
                }
                ContentSource::File(path)
            }
            (None, Some(url)) => {
                validate_source_url(&url)?;
                ContentSource::Url(url)
            }
            (None, None) => {
                return Err(CoreError::Validation(
                    "Provide a file or a URL to process".to_string(),
                ))
            }
        };

        options.validate()?;

        Ok(Self { source, options })
    }

    pub fn tool(&self) -> Tool {
        self.options.tool()
    }
}

/// Validate that a source URL uses `http://` or `https://` and has a host.
pub fn validate_source_url(url: &str) -> Result<(), CoreError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Source URL must start with http:// or https://, got: '{url}'"
            ))
        })?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(CoreError::Validation(format!(
            "Source URL has no host: '{url}'"
        )));
    }
    Ok(())
}

/// Check a local file's size against the upload limit.
pub fn check_upload_size(size: u64, limit: u64) -> Result<(), CoreError> {
    if size == 0 {
        return Err(CoreError::Validation("File is empty".to_string()));
    }
    if size > limit {
        return Err(CoreError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
