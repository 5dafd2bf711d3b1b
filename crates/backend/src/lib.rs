//! HTTP client for the studio tools backend.
//!
//! Provides the typed wire messages, the [`backend::JobBackend`] seam the
//! job poller is written against, a [`reqwest`]-based implementation of
//! it, environment-driven client configuration, and content-type
//! detection for the upload pre-step.

pub mod api;
pub mod backend;
pub mod config;
pub mod media;
pub mod messages;
