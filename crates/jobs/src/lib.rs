//! Submit-then-poll orchestration for the studio tools.
//!
//! A [`session::ToolSession`] owns one tool's job state. Submitting a
//! request spawns a task that runs the [`submitter::Submitter`] and then
//! the [`poller::StatusPoller`], reporting back to the session over a
//! channel. The session applies only reports from its current
//! submission, so a superseded job can never leak into the state of the
//! job that replaced it.

pub mod backoff;
pub mod events;
pub mod poller;
pub mod session;
pub mod submitter;
