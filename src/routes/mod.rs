//! HTTP route handlers.
//!
//! - `archive`: the streaming archive download
//! - `health`: health, readiness, metrics and version endpoints

use crate::error::AppError;

pub mod archive;
pub mod health;

/// Fallback for every unknown path, including `/archive//` with an empty identifier.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}
