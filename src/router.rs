use std::sync::Arc;

use axum::{
    error_handling::HandleErrorLayer,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    BoxError, Router,
};
use http::{header, HeaderValue, Method};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{config::Config, error::AppError, handlers, middleware_layer, state::AppState};

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 1024 * 1024;

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(86400))
}

/// Routes that need no session: registration, login and the QR handshake.
fn public_routes(state: &AppState, rate_limited: bool) -> Router<AppState> {
    let routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/qr/start", post(handlers::qr::start))
        .route("/api/qr/image", get(handlers::qr::image))
        .route("/api/qr/status", post(handlers::qr::status))
        .route("/api/qr/login", post(handlers::qr::login));

    if !rate_limited {
        return routes;
    }

    let period_ms = (1000 / state.config.rate_limit_per_second).max(1);
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(period_ms)
        .burst_size(state.config.rate_limit_burst)
        .use_headers()
        .finish();

    match governor_conf {
        Some(conf) => routes.layer(GovernorLayer::new(Arc::new(conf))),
        None => {
            tracing::warn!("⚠️ Invalid rate limit settings; public routes are not rate limited");
            routes
        }
    }
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/profile", get(handlers::auth::profile))
        .route(
            "/api/credentials",
            post(handlers::credentials::create_credential)
                .get(handlers::credentials::list_credentials),
        )
        .route(
            "/api/credentials/active",
            get(handlers::credentials::list_active_credentials),
        )
        .route(
            "/api/credentials/qr",
            post(handlers::credentials::create_credential_from_qr),
        )
        .route(
            "/api/credentials/{id}",
            get(handlers::credentials::get_credential)
                .put(handlers::credentials::update_credential)
                .delete(handlers::credentials::delete_credential),
        )
        .route(
            "/api/credentials/{id}/active",
            put(handlers::credentials::set_active_credential),
        )
        .route("/api/drive/user", get(handlers::drive::user_info))
        .route(
            "/api/drive/tasks",
            get(handlers::drive::list_tasks)
                .post(handlers::drive::add_tasks)
                .delete(handlers::drive::delete_tasks),
        )
        .route("/api/drive/tasks/clear", post(handlers::drive::clear_tasks))
        .route("/api/drive/files", get(handlers::drive::list_files))
        .route("/api/drive/files/{id}", get(handlers::drive::file_info))
        .route(
            "/api/drive/files/{id}/download",
            post(handlers::drive::download),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
}

async fn handle_layer_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout("Request deadline exceeded".to_string())
    } else {
        AppError::Internal(format!("Unhandled middleware error: {}", err))
    }
}

/// Builds the full application router.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `rate_limited` - Whether to put the per-IP limiter on public routes. It
///   keys on the peer address, so the server must be run with connect info.
pub fn build(state: AppState, rate_limited: bool) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .merge(public_routes(&state, rate_limited))
        .merge(protected_routes(&state))
        .fallback(|| async { AppError::NotFound })
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_layer_error))
                .timeout(config.request_timeout()),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(&config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
}
