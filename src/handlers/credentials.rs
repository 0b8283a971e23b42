use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    extract::{AppJson, AppPath},
    models::{
        credential::{Credential, CredentialSummary, IdentityFields},
        qr::AppVariant,
        user::AuthUser,
    },
    state::AppState,
    validation::{
        credentials::{validate_credential_name, validate_identity_field},
        validate_request, ValidationRules,
    },
};

/// The request payload for adding a credential.
#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct CreateCredentialRequest {
    #[garde(custom(validate_credential_name))]
    pub name: String,
    #[garde(custom(validate_identity_field))]
    pub uid: String,
    #[garde(custom(validate_identity_field))]
    pub cid: String,
    #[garde(custom(validate_identity_field))]
    pub seid: String,
    #[garde(custom(validate_identity_field))]
    pub kid: String,
    #[serde(default)]
    #[garde(skip)]
    pub activate: bool,
}

/// The request payload for replacing a credential's name and identity fields.
#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct UpdateCredentialRequest {
    #[garde(custom(validate_credential_name))]
    pub name: String,
    #[garde(custom(validate_identity_field))]
    pub uid: String,
    #[garde(custom(validate_identity_field))]
    pub cid: String,
    #[garde(custom(validate_identity_field))]
    pub seid: String,
    #[garde(custom(validate_identity_field))]
    pub kid: String,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// Completes a QR login and stores the result as a credential.
#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct QrCredentialRequest {
    #[garde(custom(validate_credential_name))]
    pub name: String,
    #[garde(custom(validate_identity_field))]
    pub uid: String,
    #[garde(custom(validate_identity_field))]
    pub sign: String,
    #[garde(skip)]
    pub time: i64,
    #[serde(default)]
    #[garde(skip)]
    pub app: AppVariant,
    #[serde(default)]
    #[garde(skip)]
    pub activate: bool,
}

#[derive(Serialize)]
pub struct CredentialResponse {
    pub credential: Credential,
}

#[derive(Serialize)]
pub struct CredentialListResponse {
    pub credentials: Vec<CredentialSummary>,
}

fn parse_credential_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid credential id".to_string()))
}

pub async fn create_credential(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<CreateCredentialRequest>,
) -> Result<impl IntoResponse> {
    validate_request(&payload, &state.config.validation)?;

    let identity = IdentityFields::new(payload.uid, payload.cid, payload.seid, payload.kid);
    let credential = state
        .credentials
        .add(user.id, &payload.name, &identity, payload.activate)
        .await?;

    Ok((StatusCode::CREATED, Json(CredentialResponse { credential })))
}

pub async fn list_credentials(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let credentials = state.credentials.list(user.id).await?;
    Ok(Json(CredentialListResponse { credentials }))
}

/// Lists the active credential as a summary; zero or one element.
pub async fn list_active_credentials(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let credentials = state
        .credentials
        .list_active(user.id)
        .await?
        .iter()
        .map(CredentialSummary::from)
        .collect();

    Ok(Json(CredentialListResponse { credentials }))
}

pub async fn get_credential(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse> {
    let id = parse_credential_id(&id)?;
    let credential = state.credentials.get_by_id(user.id, id).await?;
    Ok(Json(CredentialResponse { credential }))
}

pub async fn update_credential(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<String>,
    AppJson(payload): AppJson<UpdateCredentialRequest>,
) -> Result<impl IntoResponse> {
    let id = parse_credential_id(&id)?;
    validate_request(&payload, &state.config.validation)?;

    let identity = IdentityFields::new(payload.uid, payload.cid, payload.seid, payload.kid);
    let credential = state
        .credentials
        .update(user.id, id, &payload.name, &identity)
        .await?;

    Ok(Json(CredentialResponse { credential }))
}

pub async fn set_active_credential(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<String>,
    AppJson(payload): AppJson<SetActiveRequest>,
) -> Result<impl IntoResponse> {
    let id = parse_credential_id(&id)?;
    state
        .credentials
        .set_active(user.id, id, payload.active)
        .await?;

    let credential = state.credentials.get_by_id(user.id, id).await?;
    Ok(Json(CredentialResponse { credential }))
}

pub async fn delete_credential(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse> {
    let id = parse_credential_id(&id)?;
    state.credentials.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Completes a confirmed QR login and stores the identity under the caller.
pub async fn create_credential_from_qr(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<QrCredentialRequest>,
) -> Result<impl IntoResponse> {
    validate_request(&payload, &state.config.validation)?;

    let identity = state
        .qr
        .complete(&payload.uid, &payload.sign, payload.time, payload.app)
        .await?;

    let credential = state
        .credentials
        .add(user.id, &payload.name, &identity, payload.activate)
        .await?;

    Ok((StatusCode::CREATED, Json(CredentialResponse { credential })))
}
