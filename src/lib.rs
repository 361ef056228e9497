//! # zipstream
//!
//! Streams an on-demand ZIP archive of a directory to HTTP clients, paced at a
//! configurable rate, and tears the archiver process down as soon as the client goes
//! away.
//!
//! ## Core Components
//!
//! - [`archive`]: directory lookup, archiver process and throttled chunk reader
//! - [`routes`]: HTTP handlers, including the streaming responder
//! - [`app`]: router assembly
//! - [`config`]: layered configuration (defaults, file, environment, command line)
//! - [`error`]: error types and their HTTP responses
//! - [`metrics`]: request and stream counters
//! - [`middleware`]: security headers
//! - [`state`]: shared, read-only application state

pub mod app;
pub mod archive;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

#[cfg(test)]
mod tests;
