//! Command-line arguments for the `studio` binary.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use studio_core::error::CoreError;
use studio_core::input::JobRequest;
use studio_core::tool::{
    AspectRatio, BackgroundRemoverOptions, MemeGeneratorOptions, ModelChoice, OutputFormat,
    OutputSize, SubjectType, ThumbnailGeneratorOptions, DEFAULT_MEME_COUNT,
    DEFAULT_THUMBNAIL_COUNT,
};

#[derive(Debug, Parser)]
#[command(name = "studio", version, about = "Run creator-studio tool jobs and wait for the result")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backend base URL. Overrides `STUDIO_API_URL`.
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Milliseconds between status checks. Overrides `POLL_INTERVAL_MS`.
    #[arg(long, global = true, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,
}

/// Where the content comes from and where the result goes.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Local image or video to upload. Takes precedence over `--url`.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Remote image or video the backend should fetch.
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Download the primary result to this path.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cut the subject out of an image.
    RemoveBackground {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t)]
        size: OutputSize,
        #[arg(long, default_value_t)]
        format: OutputFormat,
        #[arg(long, default_value_t)]
        subject_type: SubjectType,
    },

    /// Generate meme captions for an image or clip.
    Meme {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, default_value_t = DEFAULT_MEME_COUNT)]
        count: u8,
        #[arg(long, default_value_t)]
        model: ModelChoice,
    },

    /// Generate video thumbnails.
    Thumbnail {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value_t = DEFAULT_THUMBNAIL_COUNT)]
        count: u8,
        #[arg(long, default_value_t)]
        aspect_ratio: AspectRatio,
        #[arg(long, default_value_t)]
        model: ModelChoice,
    },
}

impl Command {
    fn source(&self) -> &SourceArgs {
        match self {
            Command::RemoveBackground { source, .. }
            | Command::Meme { source, .. }
            | Command::Thumbnail { source, .. } => source,
        }
    }

    pub fn output(&self) -> Option<&Path> {
        self.source().output.as_deref()
    }

    /// Build and validate the job request for this command.
    pub fn into_request(self) -> Result<JobRequest, CoreError> {
        match self {
            Command::RemoveBackground {
                source,
                size,
                format,
                subject_type,
            } => JobRequest::new(
                source.file,
                source.url,
                BackgroundRemoverOptions {
                    size,
                    format,
                    subject_type,
                },
            ),
            Command::Meme {
                source,
                style,
                topic,
                count,
                model,
            } => JobRequest::new(
                source.file,
                source.url,
                MemeGeneratorOptions {
                    style,
                    topic,
                    count,
                    model,
                },
            ),
            Command::Thumbnail {
                source,
                style,
                title,
                count,
                aspect_ratio,
                model,
            } => JobRequest::new(
                source.file,
                source.url,
                ThumbnailGeneratorOptions {
                    style,
                    title,
                    count,
                    aspect_ratio,
                    model,
                },
            ),
        }
    }
}
