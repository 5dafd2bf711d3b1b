//! Command-line front end for the studio tools.
//!
//! The `studio` binary builds a [`studio_jobs::session::ToolSession`]
//! against the configured backend, submits one job, prints progress as
//! the poller reports it, and exits once the job settles.

pub mod args;
pub mod render;
