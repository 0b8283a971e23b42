use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The connection pool could not be built.
    #[error("Connection pool setup error: {0}")]
    PoolSetup(#[from] deadpool_postgres::CreatePoolError),

    /// A transport error while talking to the remote drive.
    #[error("Upstream request error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] sonic_rs::Error),

    /// A column was missing or had an unexpected type.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The resource exists but belongs to someone else.
    #[error("Forbidden")]
    Forbidden,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A uniqueness conflict, e.g. duplicate registration.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The user has no active upstream credential.
    #[error("No active credential")]
    NoActiveCredential,

    /// The remote drive rejected the credential or could not be reached while checking it.
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuthFailed(String),

    /// The remote drive failed a proxied call.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The QR handshake could not be completed.
    #[error("QR login failed: {0}")]
    QrLoginFailed(String),

    /// A deadline was exceeded.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The stable, machine-readable error kind returned to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Authentication(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::NoActiveCredential => "no_active_credential",
            AppError::UpstreamAuthFailed(_) => "upstream_auth_failed",
            AppError::Http(e) if e.is_timeout() => "timeout",
            AppError::Http(_) | AppError::Upstream(_) => "upstream_error",
            AppError::QrLoginFailed(_) => "qr_login_failed",
            AppError::Timeout(_) => "timeout",
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::PoolSetup(_)
            | AppError::Json(_)
            | AppError::MissingData(_)
            | AppError::Encryption(_)
            | AppError::Internal(_) => "internal_error",
        }
    }

    /// The HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            "validation_error" | "qr_login_failed" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" | "no_active_credential" => StatusCode::CONFLICT,
            "upstream_auth_failed" | "upstream_error" => StatusCode::BAD_GATEWAY,
            "timeout" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }

            AppError::Pool(ref e) => {
                tracing::error!("Connection pool error: {}", e);
                "Database unavailable".to_string()
            }

            AppError::PoolSetup(ref e) => {
                tracing::error!("Connection pool setup error: {}", e);
                "Database unavailable".to_string()
            }

            AppError::Json(ref e) => {
                tracing::error!("JSON error: {}", e);
                "Internal server error".to_string()
            }

            AppError::MissingData(ref column) => {
                tracing::error!("Missing data in row: {}", column);
                "Internal server error".to_string()
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                "Encryption error".to_string()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }

            AppError::Http(ref e) => {
                tracing::warn!("Upstream transport error: {}", e);
                if e.is_timeout() {
                    "Upstream service timed out".to_string()
                } else {
                    "Upstream service is unavailable".to_string()
                }
            }

            AppError::Upstream(ref msg) => {
                tracing::warn!("Upstream error: {}", msg);
                "Upstream service rejected the request".to_string()
            }

            AppError::UpstreamAuthFailed(ref msg) => {
                tracing::warn!("Upstream authentication failed: {}", msg);
                "Upstream credential was rejected or could not be verified".to_string()
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                msg.clone()
            }

            AppError::Forbidden => {
                tracing::warn!("Ownership check failed");
                "Forbidden".to_string()
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                "Resource not found".to_string()
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                msg.clone()
            }

            AppError::NoActiveCredential => {
                tracing::debug!("No active credential");
                "No active credential; activate one first".to_string()
            }

            AppError::QrLoginFailed(ref msg) => {
                tracing::warn!("QR login failed: {}", msg);
                msg.clone()
            }

            AppError::Timeout(ref msg) => {
                tracing::warn!("Timed out: {}", msg);
                msg.clone()
            }
        };

        let status = self.status();
        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": {
                "kind": self.kind(),
                "message": message
            }
        }))
        .unwrap_or_else(|_| {
            r#"{"error":{"kind":"internal_error","message":"Internal server error"}}"#.to_string()
        });

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_and_lookup_errors_map_to_distinct_statuses() {
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Authentication("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn upstream_failures_are_distinguishable_from_internal_ones() {
        let upstream = AppError::UpstreamAuthFailed("cookie rejected".into());
        let internal = AppError::Internal("pool exhausted".into());
        assert_eq!(upstream.kind(), "upstream_auth_failed");
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(internal.kind(), "internal_error");
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked_to_the_response() {
        let response = AppError::Internal("secret table layout".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains(r#""kind":"internal_error""#));
        assert!(!body.contains("secret table layout"));
    }
}
