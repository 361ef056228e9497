//! Router assembly shared by the binary and the tests.

use axum::http::header::CONTENT_TYPE;
use axum::middleware::from_fn_with_state;
use axum::{routing::get, Router};
use tower_http::compression::predicate::{DefaultPredicate, Predicate};
use tower_http::{compression::CompressionLayer, services::ServeFile, trace::TraceLayer};

use crate::routes::{self, archive::ARCHIVE_CONTENT_TYPE};
use crate::{middleware, state::AppState};

// ZIP output is already compressed, and wrapping it would delay chunks in the encoder.
#[derive(Clone)]
struct NoArchiveDefault(DefaultPredicate);

impl Predicate for NoArchiveDefault {
    fn should_compress<B: axum::body::HttpBody>(&self, res: &axum::http::Response<B>) -> bool {
        if let Some(ct) = res.headers().get(CONTENT_TYPE) {
            if let Ok(s) = ct.to_str() {
                if s.starts_with(ARCHIVE_CONTENT_TYPE) {
                    return false;
                }
            }
        }
        self.0.should_compress(res)
    }
}

/// Builds the full application router with all layers.
pub fn build_router(state: AppState) -> Router {
    let compression = CompressionLayer::new().compress_when(NoArchiveDefault(DefaultPredicate::new()));
    let cfg_arc = state.config.clone();
    let index = ServeFile::new(&state.config.server.index_file);

    Router::new()
        .route_service("/", index)
        .route("/archive/{id}/", get(routes::archive::download_archive))
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        .route("/metrics/prometheus", get(routes::health::metrics_prometheus))
        .route("/version", get(routes::health::version))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(compression)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg_arc, middleware::security_headers::security_headers_middleware))
}
