use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use garde::Validate;
use serde::Deserialize;

use crate::{
    error::Result,
    extract::{AppJson, AppQuery},
    models::qr::AppVariant,
    state::AppState,
    validation::{credentials::validate_identity_field, validate_request, ValidationRules},
};

#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct QrImageQuery {
    #[garde(custom(validate_identity_field))]
    pub uid: String,
}

/// A handshake triple as returned by `start`.
#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct QrStatusRequest {
    #[garde(custom(validate_identity_field))]
    pub uid: String,
    #[garde(custom(validate_identity_field))]
    pub sign: String,
    #[garde(skip)]
    pub time: i64,
}

#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct QrLoginRequest {
    #[garde(custom(validate_identity_field))]
    pub uid: String,
    #[garde(custom(validate_identity_field))]
    pub sign: String,
    #[garde(skip)]
    pub time: i64,
    #[serde(default)]
    #[garde(skip)]
    pub app: AppVariant,
}

pub async fn start(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let session = state.qr.start().await?;
    Ok(Json(session))
}

/// Streams the QR image with its sniffed content type; never cached.
pub async fn image(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<QrImageQuery>,
) -> Result<impl IntoResponse> {
    validate_request(&query, &state.config.validation)?;

    let image = state.qr.fetch_display_image(&query.uid).await?;
    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        image.bytes,
    ))
}

pub async fn status(
    State(state): State<AppState>,
    AppJson(payload): AppJson<QrStatusRequest>,
) -> Result<impl IntoResponse> {
    validate_request(&payload, &state.config.validation)?;

    let poll = state
        .qr
        .poll(&payload.uid, &payload.sign, payload.time)
        .await?;
    Ok(Json(poll))
}

/// Completes the handshake and hands the identity fields to the caller.
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<QrLoginRequest>,
) -> Result<impl IntoResponse> {
    validate_request(&payload, &state.config.validation)?;

    let identity = state
        .qr
        .complete(&payload.uid, &payload.sign, payload.time, payload.app)
        .await?;
    Ok(Json(identity))
}
