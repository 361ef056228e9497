use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, touches nothing
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: the archive root must be a directory we can list
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let probe = tokio::fs::read_dir(state.root.as_path());
    match tokio::time::timeout(std::time::Duration::from_secs(5), probe).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP zipstream_requests Archive requests received\n# TYPE zipstream_requests counter\nzipstream_requests {}\n\
# HELP zipstream_not_found Archive requests answered with 404\n# TYPE zipstream_not_found counter\nzipstream_not_found {}\n\
# HELP zipstream_archives_started Archiver processes spawned\n# TYPE zipstream_archives_started counter\nzipstream_archives_started {}\n\
# HELP zipstream_archives_completed Archives streamed to the end\n# TYPE zipstream_archives_completed counter\nzipstream_archives_completed {}\n\
# HELP zipstream_archives_cancelled Archives abandoned by the client or timed out\n# TYPE zipstream_archives_cancelled counter\nzipstream_archives_cancelled {}\n\
# HELP zipstream_archives_failed Archives aborted by an error\n# TYPE zipstream_archives_failed counter\nzipstream_archives_failed {}\n\
# HELP zipstream_active_streams Archives currently streaming\n# TYPE zipstream_active_streams gauge\nzipstream_active_streams {}\n\
# HELP zipstream_chunks_sent Chunks sent\n# TYPE zipstream_chunks_sent counter\nzipstream_chunks_sent {}\n\
# HELP zipstream_bytes_sent Archive bytes sent\n# TYPE zipstream_bytes_sent counter\nzipstream_bytes_sent {}\n\
# HELP zipstream_uptime_seconds Uptime seconds\n# TYPE zipstream_uptime_seconds gauge\nzipstream_uptime_seconds {}\n",
        m.requests,
        m.not_found,
        m.archives_started,
        m.archives_completed,
        m.archives_cancelled,
        m.archives_failed,
        m.active_streams,
        m.chunks_sent,
        m.bytes_sent,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
