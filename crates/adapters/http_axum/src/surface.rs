//! The generated automation surface: an axum fallback that hands every
//! unmatched request to the dispatcher.

use std::str::FromStr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use council_app::dispatcher::{DispatchError, DispatchRequest};
use council_app::handler::Params;
use council_app::ports::{ArtifactWriter, BackendStatus, DefinitionStore};
use council_domain::automation::HttpMethod;

use crate::STORAGE_HEADER;
use crate::error::{DispatchFailure, unknown_method};
use crate::state::AppState;

/// Fallback handler serving every live automation route.
pub async fn dispatch<S, A>(
    State(state): State<AppState<S, A>>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, DispatchFailure>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    let path = uri.path().to_string();
    let Ok(method) = HttpMethod::from_str(method.as_str()) else {
        return Ok(unknown_method(&method, &path));
    };
    let request = DispatchRequest {
        method,
        path,
        query: query_params(query),
        body: parse_body(&body)?,
    };
    let response = state.manager.dispatcher().dispatch(request).await?;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let mut http = (status, Json(response.body)).into_response();
    if response.storage == BackendStatus::Degraded {
        http.headers_mut().insert(
            STORAGE_HEADER,
            HeaderValue::from_static(BackendStatus::Degraded.as_str()),
        );
    }
    Ok(http)
}

fn query_params(query: Vec<(String, String)>) -> Params {
    query
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

fn parse_body(body: &Bytes) -> Result<Option<Value>, DispatchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|err| DispatchError::ParameterValidation(format!("body: invalid JSON ({err})")))
}
