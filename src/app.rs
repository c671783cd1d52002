use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method},
    response::Redirect,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::{
    admin, auth, comments, config::StorageConfig, error::AppError, preview, ratings, resources,
    state::AppState, storage,
};

const PRESIGN_TTL_SECS: u64 = 600;

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(resources::router(state.config.upload_max_bytes))
        .merge(ratings::router())
        .merge(comments::router())
        .merge(preview::router())
        .merge(admin::router())
        .route("/health", get(|| async { "ok" }));

    let api = match &state.config.storage {
        StorageConfig::Local { upload_dir } => {
            api.nest_service(storage::UPLOADS_PREFIX, ServeDir::new(upload_dir))
        }
        StorageConfig::S3 { .. } => api.route("/uploads/*key", get(redirect_upload)),
    };

    let cors = cors_layer(state.config.cors_origin.as_deref());

    api.with_state(state).layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(
                |res: &axum::http::Response<_>, _latency: std::time::Duration, span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, "response");
                    } else {
                        tracing::info!(%status, "response");
                    }
                },
            ),
    )
}

/// Credentialed CORS for a configured frontend origin, permissive otherwise.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true),
        Err(e) => {
            warn!(error = %e, origin, "invalid CORS_ORIGIN; falling back to permissive");
            CorsLayer::permissive()
        }
    }
}

/// GET /uploads/*key → 307 to a short-lived presigned URL.
async fn redirect_upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Redirect, AppError> {
    let path = storage::public_path(&key);
    let key = storage::key_from_public_path(&path).ok_or(AppError::NotFound("File"))?;
    let url = state.storage.presign_get(key, PRESIGN_TTL_SECS).await?;
    Ok(Redirect::temporary(&url))
}
