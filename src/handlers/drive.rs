use axum::{
    extract::State,
    response::IntoResponse,
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    extract::{AppJson, AppPath, AppQuery},
    models::user::AuthUser,
    state::AppState,
    validation::{
        credentials::validate_identity_field,
        drive::{
            validate_clear_flag, validate_offline_urls, validate_optional_id, validate_page,
            validate_task_hashes,
        },
        validate_request, ValidationRules,
    },
};

/// Root directory id on the remote drive.
const ROOT_DIR_ID: &str = "0";
const FIRST_PAGE: u32 = 1;

#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct TaskListQuery {
    #[garde(custom(validate_page))]
    pub page: Option<u32>,
}

#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct AddTasksRequest {
    #[garde(custom(validate_offline_urls))]
    pub urls: Vec<String>,
    #[garde(custom(validate_optional_id))]
    pub save_dir_id: Option<String>,
}

#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct DeleteTasksRequest {
    #[garde(custom(validate_task_hashes))]
    pub hashes: Vec<String>,
    #[serde(default)]
    #[garde(skip)]
    pub delete_files: bool,
}

#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct ClearTasksRequest {
    #[serde(default)]
    #[garde(custom(validate_clear_flag))]
    pub flag: u8,
}

#[derive(Deserialize, Validate)]
#[garde(context(ValidationRules))]
pub struct ListFilesQuery {
    #[garde(custom(validate_optional_id))]
    pub dir_id: Option<String>,
}

#[derive(Serialize)]
pub struct AddTasksResponse {
    pub hashes: Vec<String>,
}

#[derive(Serialize)]
pub struct DriveAck {
    pub success: bool,
}

fn validate_path_id(name: &str, value: &str, rules: &ValidationRules) -> Result<()> {
    validate_identity_field(value, rules)
        .map_err(|e| AppError::Validation(format!("{}: {}", name, e)))
}

pub async fn user_info(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let client = state.upstream.resolve_active_client(user.id).await?;
    Ok(Json(client.user_info().await?))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppQuery(query): AppQuery<TaskListQuery>,
) -> Result<impl IntoResponse> {
    validate_request(&query, &state.config.validation)?;

    let client = state.upstream.resolve_active_client(user.id).await?;
    let tasks = client
        .list_offline_tasks(query.page.unwrap_or(FIRST_PAGE))
        .await?;
    Ok(Json(tasks))
}

pub async fn add_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<AddTasksRequest>,
) -> Result<impl IntoResponse> {
    validate_request(&payload, &state.config.validation)?;

    let save_dir_id = payload.save_dir_id.as_deref().unwrap_or(ROOT_DIR_ID);
    let client = state.upstream.resolve_active_client(user.id).await?;
    let hashes = client.add_offline_tasks(&payload.urls, save_dir_id).await?;

    tracing::info!("✅ User {} queued {} offline tasks", user.id, hashes.len());
    Ok(Json(AddTasksResponse { hashes }))
}

pub async fn delete_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<DeleteTasksRequest>,
) -> Result<impl IntoResponse> {
    validate_request(&payload, &state.config.validation)?;

    let client = state.upstream.resolve_active_client(user.id).await?;
    client
        .delete_offline_tasks(&payload.hashes, payload.delete_files)
        .await?;

    tracing::info!("🗑️ User {} deleted {} offline tasks", user.id, payload.hashes.len());
    Ok(Json(DriveAck { success: true }))
}

pub async fn clear_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<ClearTasksRequest>,
) -> Result<impl IntoResponse> {
    validate_request(&payload, &state.config.validation)?;

    let client = state.upstream.resolve_active_client(user.id).await?;
    client.clear_offline_tasks(payload.flag).await?;

    Ok(Json(DriveAck { success: true }))
}

pub async fn list_files(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppQuery(query): AppQuery<ListFilesQuery>,
) -> Result<impl IntoResponse> {
    validate_request(&query, &state.config.validation)?;

    let dir_id = query.dir_id.as_deref().unwrap_or(ROOT_DIR_ID);
    let client = state.upstream.resolve_active_client(user.id).await?;
    Ok(Json(client.list_files(dir_id).await?))
}

pub async fn file_info(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(file_id): AppPath<String>,
) -> Result<impl IntoResponse> {
    validate_path_id("file_id", &file_id, &state.config.validation)?;

    let client = state.upstream.resolve_active_client(user.id).await?;
    Ok(Json(client.file_info(&file_id).await?))
}

pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(pick_code): AppPath<String>,
) -> Result<impl IntoResponse> {
    validate_path_id("pick_code", &pick_code, &state.config.validation)?;

    let client = state.upstream.resolve_active_client(user.id).await?;
    Ok(Json(client.download_info(&pick_code).await?))
}
