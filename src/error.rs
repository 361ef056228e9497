use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

use crate::archive::ArchiveError;

/// Message sent with a 404 when the identifier does not name an archive directory.
pub const ARCHIVE_NOT_FOUND: &str = "Archive does not exist or has been deleted";

/// nginx' "client closed request"; only ever seen in logs since the client is gone.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// The primary error type for request handlers.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For when a requested archive or route does not exist. Rendered as plain text.
    NotFound(String),
    /// For when the archiver process could not be started.
    ProcessSpawn(String),
    /// For I/O errors while reading the archiver's output.
    ///
    /// Log-only: the archive handler never reads before the headers are sent, and a
    /// read error mid-body aborts the connection instead of producing a response.
    StreamRead(String),
    /// For when the archive root itself cannot be listed (misconfiguration).
    DirectoryEnumeration(String),
    /// For requests that ended because the client went away or timed out.
    ///
    /// Log-only: by the time a request is cancelled nobody is left to read a response.
    /// The 499 mapping only gives access logs a status to record.
    Cancelled,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ProcessSpawn(msg) => write!(f, "Archiver error: {}", msg),
            AppError::StreamRead(msg) => write!(f, "Stream error: {}", msg),
            AppError::DirectoryEnumeration(msg) => write!(f, "Archive root error: {}", msg),
            AppError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::NotFound(msg) => {
                let mut res = (StatusCode::NOT_FOUND, msg).into_response();
                res.headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
                return res;
            }
            AppError::Cancelled => {
                tracing::debug!("Request cancelled before a response was produced");
                let status = StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST);
                return status.into_response();
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Error ID: {}", error_id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::ProcessSpawn(msg) => {
                tracing::error!("Archiver spawn failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ARCHIVER_ERROR",
                    "The archive could not be created".to_string(),
                    None,
                )
            }
            AppError::StreamRead(msg) => {
                tracing::error!("Archive stream failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STREAM_ERROR",
                    "Reading the archive failed".to_string(),
                    None,
                )
            }
            AppError::DirectoryEnumeration(msg) => {
                tracing::error!("Archive root unreadable: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ARCHIVE_ROOT_ERROR",
                    "The archive storage is unavailable".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Cancelled => AppError::Cancelled,
            ArchiveError::Spawn { .. } => AppError::ProcessSpawn(err.to_string()),
            ArchiveError::Read(_) => AppError::StreamRead(err.to_string()),
            ArchiveError::DirectoryEnumeration { .. } => AppError::DirectoryEnumeration(err.to_string()),
            ArchiveError::Wait(_) => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
