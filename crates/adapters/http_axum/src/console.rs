//! Console management API, mounted under `/console`.

#[allow(clippy::missing_errors_doc)]
pub mod automations;
#[allow(clippy::missing_errors_doc)]
pub mod endpoints;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use council_app::dispatcher::RouteInfo;
use council_app::ports::{ArtifactWriter, DefinitionStore};

use crate::state::AppState;

/// Build the `/console` sub-router.
pub fn routes<S, A>() -> Router<AppState<S, A>>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/routes", get(live_routes::<S, A>))
        .route(
            "/automations",
            get(automations::list::<S, A>).post(automations::create::<S, A>),
        )
        .route(
            "/automations/{name}",
            get(automations::get::<S, A>).delete(automations::delete::<S, A>),
        )
        .route(
            "/automations/{name}/activate",
            post(automations::activate::<S, A>),
        )
        .route(
            "/automations/{name}/deactivate",
            post(automations::deactivate::<S, A>),
        )
        .route(
            "/automations/{name}/reregister",
            post(automations::reregister::<S, A>),
        )
        .route(
            "/automations/{name}/endpoints",
            get(endpoints::list::<S, A>)
                .post(endpoints::add::<S, A>)
                .put(endpoints::update::<S, A>)
                .delete(endpoints::remove::<S, A>),
        )
}

#[derive(Serialize)]
struct ConsoleHealth {
    service: &'static str,
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<ConsoleHealth> {
    Json(ConsoleHealth {
        service: "console",
        status: "healthy",
        message: "Console API is operating normally",
    })
}

/// `GET /console/routes`: every live route of the generated surface.
async fn live_routes<S, A>(State(state): State<AppState<S, A>>) -> Json<Vec<RouteInfo>>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Json(state.manager.dispatcher().routes())
}
