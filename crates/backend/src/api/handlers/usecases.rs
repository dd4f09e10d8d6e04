use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use contracts::usecases::common::{
    UseCaseError, UseCaseResult, CONFLICT, EXTERNAL_ERROR, NOT_FOUND, VALIDATION_ERROR,
};
use contracts::usecases::u501_import_clientes::{
    BulkSaveReport, ConfirmDuplicatesRequest, ImportSessionView, SaveOutcome, StartImportRequest,
    UpdateCellRequest,
};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::sync::Arc;

use crate::usecases::u501_import_clientes::ImportExecutor;

type ApiError = (StatusCode, Json<UseCaseError>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// HTTP-статус для кода ошибки UseCase
pub fn status_for(err: &UseCaseError) -> StatusCode {
    match err.code.as_str() {
        VALIDATION_ERROR => StatusCode::BAD_REQUEST,
        NOT_FOUND => StatusCode::NOT_FOUND,
        CONFLICT => StatusCode::CONFLICT,
        EXTERNAL_ERROR => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: UseCaseError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::warn!("Request rejected ({}): {}", status.as_u16(), err);
    }
    (status, Json(err))
}

fn respond<T>(result: UseCaseResult<T>) -> ApiResult<T> {
    result.map(Json).map_err(error_response)
}

// ============================================================================
// UseCase u501: Import clientes
// ============================================================================

static IMPORT_EXECUTOR: OnceCell<Arc<ImportExecutor>> = OnceCell::new();

/// Регистрирует executor импорта (вызывается один раз из main)
pub fn initialize_u501(executor: Arc<ImportExecutor>) -> anyhow::Result<()> {
    IMPORT_EXECUTOR
        .set(executor)
        .map_err(|_| anyhow::anyhow!("u501 import executor is already initialized"))
}

fn executor() -> Result<&'static ImportExecutor, ApiError> {
    IMPORT_EXECUTOR
        .get()
        .map(|e| e.as_ref())
        .ok_or_else(|| error_response(UseCaseError::internal("Import executor is not initialized")))
}

/// POST /api/u501/import/start
pub async fn u501_start_import(Json(request): Json<StartImportRequest>) -> ApiResult<ImportSessionView> {
    respond(executor()?.start_import(request).await)
}

#[derive(Debug, Deserialize)]
pub struct CsvImportQuery {
    pub file_name: Option<String>,
}

/// POST /api/u501/import/csv?file_name=clientes.csv
pub async fn u501_start_import_csv(
    Query(query): Query<CsvImportQuery>,
    body: Bytes,
) -> ApiResult<ImportSessionView> {
    let file_name = query.file_name.unwrap_or_else(|| "import.csv".to_string());
    respond(executor()?.start_import_csv(&file_name, &body).await)
}

/// GET /api/u501/import/:session_id
pub async fn u501_get_session(Path(session_id): Path<String>) -> ApiResult<ImportSessionView> {
    respond(executor()?.get_session(&session_id).await)
}

/// DELETE /api/u501/import/:session_id
pub async fn u501_close_session(Path(session_id): Path<String>) -> Result<StatusCode, ApiError> {
    executor()?
        .close_session(&session_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// PUT /api/u501/import/:session_id/rows/:row_index
pub async fn u501_update_cell(
    Path((session_id, row_index)): Path<(String, usize)>,
    Json(request): Json<UpdateCellRequest>,
) -> ApiResult<ImportSessionView> {
    respond(executor()?.update_cell(&session_id, row_index, request).await)
}

/// DELETE /api/u501/import/:session_id/rows/:row_index
pub async fn u501_remove_row(
    Path((session_id, row_index)): Path<(String, usize)>,
) -> ApiResult<ImportSessionView> {
    respond(executor()?.remove_row(&session_id, row_index).await)
}

/// POST /api/u501/import/:session_id/rows/:row_index/save
pub async fn u501_save_row(Path((session_id, row_index)): Path<(String, usize)>) -> ApiResult<SaveOutcome> {
    respond(executor()?.save_individual_client(&session_id, row_index).await)
}

/// POST /api/u501/import/:session_id/save-all
pub async fn u501_save_all(Path(session_id): Path<String>) -> ApiResult<BulkSaveReport> {
    respond(executor()?.save_all_valid_clients(&session_id).await)
}

/// POST /api/u501/import/:session_id/confirm
pub async fn u501_confirm_duplicates(
    Path(session_id): Path<String>,
    Json(request): Json<ConfirmDuplicatesRequest>,
) -> ApiResult<BulkSaveReport> {
    respond(
        executor()?
            .confirm_save_omitting_existing_cedulas(&session_id, request)
            .await,
    )
}

/// POST /api/u501/import/:session_id/conflict/dismiss
pub async fn u501_dismiss_conflict(Path(session_id): Path<String>) -> ApiResult<ImportSessionView> {
    respond(executor()?.dismiss_conflict(&session_id).await)
}

/// POST /api/u501/import/:session_id/omit-existing
pub async fn u501_omit_existing(Path(session_id): Path<String>) -> ApiResult<ImportSessionView> {
    respond(executor()?.omit_existing_cedulas(&session_id).await)
}

/// DELETE /api/u501/import/:session_id/toasts/:toast_id
pub async fn u501_dismiss_toast(
    Path((session_id, toast_id)): Path<(String, String)>,
) -> ApiResult<ImportSessionView> {
    respond(executor()?.dismiss_toast(&session_id, &toast_id).await)
}
