//! `studio` -- submit a tool job and wait for the result.
//!
//! # Environment variables
//!
//! | Variable                      | Default                 | Description                          |
//! |-------------------------------|-------------------------|--------------------------------------|
//! | `STUDIO_API_URL`              | `http://localhost:3000` | Backend base URL                     |
//! | `STUDIO_API_TOKEN`            | --                      | Bearer token for backend requests    |
//! | `POLL_INTERVAL_MS`            | `2000`                  | Milliseconds between status checks   |
//! | `POLL_MAX_BACKOFF_SECS`       | `30`                    | Longest delay after failed checks    |
//! | `POLL_MAX_CONSECUTIVE_ERRORS` | `20`                    | Give up after this many (`0` = never)|
//! | `POLL_MAX_WAIT_SECS`          | `900`                   | Give up after this long (`0` = never)|
//! | `REQUEST_TIMEOUT_SECS`        | `30`                    | Per-request timeout                  |
//! | `MAX_UPLOAD_BYTES`            | `26214400`              | Largest local file accepted          |
//! | `LOG_FORMAT`                  | --                      | `json` for JSON log lines            |

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_backend::api::StudioApi;
use studio_backend::config::ClientConfig;
use studio_cli::args::Cli;
use studio_cli::render;
use studio_jobs::backoff::PollPolicy;
use studio_jobs::events::ToolEvent;
use studio_jobs::poller::StatusPoller;
use studio_jobs::session::{SessionState, ToolSession};
use studio_jobs::submitter::Submitter;

enum Step {
    Update { settled: bool },
    Interrupted,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }

    let mut policy = PollPolicy::from_env()?;
    if let Some(ms) = cli.poll_interval_ms {
        anyhow::ensure!(ms > 0, "--poll-interval-ms must be greater than zero");
        policy = policy.with_interval(Duration::from_millis(ms));
    }

    let output = cli.command.output().map(Path::to_path_buf);
    let request = cli.command.into_request()?;
    let tool = request.tool();

    tracing::debug!(
        tool = %tool,
        api_url = %config.api_url,
        interval_ms = policy.interval.as_millis() as u64,
        "Starting studio-cli",
    );

    let api = Arc::new(StudioApi::new(&config)?);
    let mut session = ToolSession::new(
        tool,
        Submitter::new(Arc::clone(&api), config.max_upload_bytes),
        StatusPoller::new(Arc::clone(&api), policy),
    );
    let mut events = session.subscribe();

    session.submit(request)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let step = tokio::select! {
            update = session.next_update() => Step::Update {
                settled: update.map_or(true, SessionState::is_settled),
            },
            _ = &mut ctrl_c => Step::Interrupted,
        };

        print_progress(&mut events);

        match step {
            Step::Update { settled: false } => continue,
            Step::Update { settled: true } => break,
            Step::Interrupted => {
                session.reset();
                anyhow::bail!("Cancelled; the job may still finish on the server");
            }
        }
    }

    match session.state() {
        SessionState::Success {
            job,
            artifact,
            credits_used,
        } => {
            println!("Done: {tool} job {}", job.id);
            for line in render::artifact_lines(artifact) {
                println!("  {line}");
            }
            println!("Credits used: {credits_used}");

            if let Some(path) = output {
                let url = artifact
                    .primary_url()
                    .context("The result has no downloadable file")?;
                let bytes = api
                    .download(url)
                    .await
                    .with_context(|| format!("Failed to download {url}"))?;
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), size = bytes.len(), "Result saved");
                println!("Saved to {}", path.display());
            }
            Ok(())
        }
        SessionState::Error { job, message } => match job {
            Some(job) => anyhow::bail!("{tool} job {} failed: {message}", job.id),
            None => anyhow::bail!("{message}"),
        },
        other => anyhow::bail!("Session ended while {}", other.kind()),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "studio_cli=info,studio_jobs=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_progress(events: &mut broadcast::Receiver<ToolEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(line) = render::progress_line(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress output fell behind");
            }
            Err(_) => break,
        }
    }
}
