//! HTTP handlers for the auth and project routes.
//!
//! Handlers validate input, call into the session or repository, and map
//! results to JSON responses. Field names follow the frontend contract
//! (`projectName`, `folderId`), so requests and responses are camelCase.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use scribe_core::{ProjectName, ProjectSummary};
use scribe_drive::DriveError;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Query parameters of the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

/// Query parameters of the project load route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadQuery {
    pub project_name: Option<String>,
}

/// Body of the createHierarchy route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHierarchyRequest {
    pub project_name: Option<String>,
}

/// Body of the save route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub project_name: Option<String>,
    pub content: Option<String>,
}

/// Body of the delete route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub project_name: Option<String>,
}

/// Response of the createHierarchy route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHierarchyResponse {
    pub folder_id: String,
    pub message: String,
}

/// Response of the list route.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub projects: Vec<ProjectSummary>,
}

/// `GET /auth/google` — redirect to the provider consent page.
pub async fn auth_google(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::temporary(&state.session.authorize_url())
}

/// `GET /auth/callback` — exchange the code, then bounce back to the
/// frontend with a success or failure flag.
pub async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = query.code else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "authorization code is required" })),
        )
            .into_response();
    };

    match state.session.exchange_code(&code).await {
        Ok(_) => {
            info!("authorization completed");
            Redirect::to(&format!("{}?auth=true", state.frontend_url)).into_response()
        }
        Err(e) => {
            warn!("authorization callback failed: {}", e);
            Redirect::to(&format!("{}?auth=false", state.frontend_url)).into_response()
        }
    }
}

/// `GET /auth/status` — 200 when a usable credential exists, 401 otherwise.
pub async fn auth_status(State(state): State<Arc<AppState>>) -> Response {
    let authenticated = state.session.is_authenticated();
    let status = if authenticated {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (status, Json(json!({ "authenticated": authenticated }))).into_response()
}

/// `POST /auth/logout` — revoke the credential. Idempotent.
pub async fn auth_logout(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    state.session.revoke()?;
    Ok(Json(json!({ "message": "Successfully logged out." })))
}

/// `POST /api/project/createHierarchy` — create the folder structure and
/// initial content file for a new project.
pub async fn create_hierarchy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateHierarchyRequest>,
) -> ApiResult<Json<CreateHierarchyResponse>> {
    let name = require_name(req.project_name)?;
    let folder = state.repository.create_project(&name).await?;
    Ok(Json(CreateHierarchyResponse {
        folder_id: folder.id,
        message: format!("Project \"{}\" created successfully.", name),
    }))
}

/// `GET /api/project/load?projectName=` — download the project content.
pub async fn load_project(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoadQuery>,
) -> ApiResult<Json<Value>> {
    let name = require_name(query.project_name)?;
    let content = state.repository.load_project(&name).await?;
    Ok(Json(json!({ "content": content })))
}

/// `POST /api/project/save` — overwrite the project content in full.
pub async fn save_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveRequest>,
) -> ApiResult<Json<Value>> {
    let name = require_name(req.project_name)?;
    let content = req
        .content
        .ok_or_else(|| ApiError::from(DriveError::invalid_input("content is required")))?;

    state.repository.save_project(&name, &content).await?;
    Ok(Json(
        json!({ "message": format!("Project \"{}\" saved successfully.", name) }),
    ))
}

/// `POST /api/project/delete` — delete the project folder and its contents.
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteRequest>,
) -> ApiResult<Json<Value>> {
    let name = require_name(req.project_name)?;
    state.repository.delete_project(&name).await?;
    Ok(Json(
        json!({ "message": format!("Project \"{}\" deleted successfully.", name) }),
    ))
}

/// `GET /api/project/list` — all projects under the root folder.
pub async fn list_projects(State(state): State<Arc<AppState>>) -> ApiResult<Json<ListResponse>> {
    let projects = state.repository.list_projects().await?;
    Ok(Json(ListResponse { projects }))
}

/// Validates the `projectName` field shared by the project routes.
fn require_name(raw: Option<String>) -> Result<ProjectName, ApiError> {
    let raw = raw.ok_or_else(|| DriveError::invalid_input("projectName is required"))?;
    let name = ProjectName::parse(raw).map_err(DriveError::from)?;
    Ok(name)
}
