use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::user::AuthUser,
    state::AppState,
};

/// Extracts the bearer token from the `Authorization` header.
///
/// # Arguments
///
/// * `headers` - The request headers.
///
/// # Returns
///
/// An `Option` containing the token if the header is well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// A middleware that requires a valid bearer session.
///
/// On success the resolved user is inserted as an [`AuthUser`] extension.
/// Missing, malformed, unknown and expired tokens all answer 401 before any
/// handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking authentication...");

    let Some(token) = bearer_token(request.headers()) else {
        tracing::debug!("❌ Missing or malformed Authorization header");
        return AppError::Authentication("Missing bearer token".to_string()).into_response();
    };

    let user = match state.sessions.validate_session(token).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    tracing::debug!("✅ User authenticated: {}", user.id);

    request.extensions_mut().insert(AuthUser::from(user));

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_tokens() {
        assert_eq!(bearer_token(&headers_with("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers_with("bearer abc123")), Some("abc123"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&headers_with("Basic abc123")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with("abc123")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
