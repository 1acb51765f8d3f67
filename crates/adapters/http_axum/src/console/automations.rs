//! Console handlers for automation definitions and their lifecycle.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use council_app::ports::{ArtifactWriter, DefinitionStore};
use council_app::services::{CreateAutomation, ListFilter, Page};
use council_domain::automation::{Automation, AutomationStatus};
use council_domain::error::CouncilError;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string of `GET /console/automations`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<AutomationStatus>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl From<ListQuery> for ListFilter {
    fn from(query: ListQuery) -> Self {
        let defaults = ListFilter::default();
        Self {
            status: query.status,
            skip: query.skip.unwrap_or(defaults.skip),
            limit: query.limit.unwrap_or(defaults.limit),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Automation>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /console/automations`: one page of definitions.
pub async fn list<S, A>(
    State(state): State<AppState<S, A>>,
    Query(query): Query<ListQuery>,
) -> Json<Page>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Json(state.manager.list(query.into()))
}

/// `POST /console/automations`: create a draft automation.
pub async fn create<S, A>(
    State(state): State<AppState<S, A>>,
    body: Result<Json<CreateAutomation>, JsonRejection>,
) -> Result<CreateResponse, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let created = state.manager.create(request).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `GET /console/automations/{name}`
pub async fn get<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
) -> Result<Json<Automation>, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Ok(Json(state.manager.get(&name)?))
}

/// `DELETE /console/automations/{name}`: drop routes, definition and artifacts.
pub async fn delete<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    if state.manager.delete(&name).await? {
        Ok(DeleteResponse::NoContent)
    } else {
        Err(CouncilError::automation_not_found(&name).into())
    }
}

/// `POST /console/automations/{name}/activate`
pub async fn activate<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
) -> Result<Json<Automation>, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Ok(Json(state.manager.activate(&name).await?))
}

/// `POST /console/automations/{name}/deactivate`
pub async fn deactivate<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
) -> Result<Json<Automation>, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Ok(Json(state.manager.deactivate(&name).await?))
}

/// `POST /console/automations/{name}/reregister`
pub async fn reregister<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
) -> Result<Json<Automation>, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Ok(Json(state.manager.reregister(&name).await?))
}
