//! The five `/api/collab/*` handlers (spec.md §6). Each is a thin adapter:
//! parse the document id, build a [`doccoord_kv::pipeline::RequestContext`]
//! where one is needed, call the engine, shape the JSON response.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doccoord_kv::ids::{DocumentId, SessionId};
use doccoord_kv::model::Version;
use doccoord_kv::pipeline::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/collab/ImportFile", post(import_file))
        .route("/api/collab/UpdateAction", post(update_action))
        .route("/api/collab/GetActionsFromServer", post(get_actions_from_server))
        .route("/api/collab/ShouldSave", post(should_save))
        .route("/api/collab/SaveDocument", post(save_document))
}

fn parse_file_id(file_id: &str) -> Result<DocumentId, ApiError> {
    DocumentId::parse(file_id).map_err(|_| ApiError::UnknownFile)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportFileRequest {
    file_id: String,
    #[serde(default)]
    user_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportFileResponse {
    sfdt: serde_json::Value,
    version: Version,
}

async fn import_file(
    State(state): State<AppState>,
    Json(req): Json<ImportFileRequest>,
) -> Result<Json<ImportFileResponse>, ApiError> {
    let document = parse_file_id(&req.file_id)?;
    let result = state
        .engine
        .sync
        .import(document, None, req.user_name.as_deref())
        .await?;
    Ok(Json(ImportFileResponse { sfdt: result.sfdt, version: result.version }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateActionRequest {
    file_id: String,
    version: Version,
    operations: serde_json::Value,
    #[serde(default)]
    is_transformed: Option<bool>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    session_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateActionResponse {
    version: Version,
    is_transformed: bool,
    operations: serde_json::Value,
}

async fn update_action(
    State(state): State<AppState>,
    Json(req): Json<UpdateActionRequest>,
) -> Result<Json<UpdateActionResponse>, ApiError> {
    let document = parse_file_id(&req.file_id)?;
    let ctx = RequestContext {
        document,
        session_id: req.session_id.map(SessionId).unwrap_or_default(),
        user_name: req.user_name.unwrap_or_else(|| "anonymous".to_string()),
    };
    let committed = state.engine.pipeline.submit(&ctx, req.version, req.operations).await?;
    Ok(Json(UpdateActionResponse {
        version: committed.version,
        is_transformed: committed.is_transformed,
        operations: committed.payload,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetActionsRequest {
    file_id: String,
    version: Version,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetActionsResponse {
    operations: Vec<doccoord_kv::model::Operation>,
    resync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    window_start: Option<Version>,
}

async fn get_actions_from_server(
    State(state): State<AppState>,
    Json(req): Json<GetActionsRequest>,
) -> Result<Json<GetActionsResponse>, ApiError> {
    let document = parse_file_id(&req.file_id)?;
    let pending = state.engine.sync.get_since(document, req.version)?;
    Ok(Json(GetActionsResponse {
        operations: pending.ops,
        resync: pending.resync,
        window_start: pending.resync.then_some(pending.window_start),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShouldSaveRequest {
    file_id: String,
    latest_applied_version: Version,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShouldSaveResponse {
    should_save: bool,
    current_persisted_version: Version,
}

async fn should_save(
    State(state): State<AppState>,
    Json(req): Json<ShouldSaveRequest>,
) -> Result<Json<ShouldSaveResponse>, ApiError> {
    let document = parse_file_id(&req.file_id)?;
    let result = state.engine.persistence.should_save(document, req.latest_applied_version)?;
    Ok(Json(ShouldSaveResponse {
        should_save: result.should_save,
        current_persisted_version: result.persisted_version,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveDocumentRequest {
    file_id: String,
    sfdt: serde_json::Value,
    latest_applied_version: Version,
    #[serde(default)]
    user_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveDocumentResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<bool>,
}

async fn save_document(
    State(state): State<AppState>,
    Json(req): Json<SaveDocumentRequest>,
) -> Result<Json<SaveDocumentResponse>, ApiError> {
    let document = parse_file_id(&req.file_id)?;
    let user_name = req.user_name.unwrap_or_else(|| "anonymous".to_string());
    let result = state
        .engine
        .persistence
        .save(document, &user_name, req.sfdt, req.latest_applied_version)
        .await?;
    Ok(Json(SaveDocumentResponse {
        success: true,
        message: if result.skipped { "already persisted".to_string() } else { "saved".to_string() },
        skipped: result.skipped.then_some(true),
    }))
}
