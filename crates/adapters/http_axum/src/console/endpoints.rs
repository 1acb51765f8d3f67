//! Console handlers editing the endpoints of one automation.
//!
//! Endpoints are addressed by `?path=&method=` because their paths contain
//! slashes and placeholders.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use council_app::ports::{ArtifactWriter, DefinitionStore};
use council_domain::automation::{Automation, Endpoint, HttpMethod};

use crate::error::ApiError;
use crate::state::AppState;

/// Identity of the endpoint being edited.
#[derive(Debug, Deserialize)]
pub struct EndpointQuery {
    pub path: String,
    pub method: String,
}

impl EndpointQuery {
    fn method(&self) -> Result<HttpMethod, ApiError> {
        self.method
            .parse()
            .map_err(|err: council_domain::automation::UnknownMethod| {
                ApiError::BadRequest(err.to_string())
            })
    }
}

#[derive(Debug, Serialize)]
pub struct EndpointList {
    pub total: usize,
    pub endpoints: Vec<Endpoint>,
    pub automation: String,
}

fn parse_body(body: Result<Json<Endpoint>, JsonRejection>) -> Result<Endpoint, ApiError> {
    body.map(|Json(endpoint)| endpoint)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// `GET /console/automations/{name}/endpoints`
pub async fn list<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
) -> Result<Json<EndpointList>, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    let automation = state.manager.get(&name)?;
    Ok(Json(EndpointList {
        total: automation.endpoints.len(),
        endpoints: automation.endpoints,
        automation: automation.name,
    }))
}

/// `POST /console/automations/{name}/endpoints`
pub async fn add<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
    body: Result<Json<Endpoint>, JsonRejection>,
) -> Result<(StatusCode, Json<Automation>), ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    let endpoint = parse_body(body)?;
    let automation = state.manager.add_endpoint(&name, endpoint).await?;
    Ok((StatusCode::CREATED, Json(automation)))
}

/// `PUT /console/automations/{name}/endpoints?path=&method=`
pub async fn update<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
    Query(query): Query<EndpointQuery>,
    body: Result<Json<Endpoint>, JsonRejection>,
) -> Result<Json<Automation>, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    let method = query.method()?;
    let endpoint = parse_body(body)?;
    let automation = state
        .manager
        .update_endpoint(&name, &query.path, method, endpoint)
        .await?;
    Ok(Json(automation))
}

/// `DELETE /console/automations/{name}/endpoints?path=&method=`
pub async fn remove<S, A>(
    State(state): State<AppState<S, A>>,
    Path(name): Path<String>,
    Query(query): Query<EndpointQuery>,
) -> Result<Json<Automation>, ApiError>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    let method = query.method()?;
    let automation = state
        .manager
        .remove_endpoint(&name, &query.path, method)
        .await?;
    Ok(Json(automation))
}
