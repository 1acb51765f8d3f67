//! Axum router assembly.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use council_app::ports::{ArtifactWriter, DefinitionStore};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Serves `/health`, nests the console API under `/console` and hands
/// everything else to the dispatcher. Includes a [`TraceLayer`] that logs each
/// HTTP request/response at the `DEBUG` level.
pub fn build<S, A>(state: AppState<S, A>) -> Router
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check::<S, A>))
        .nest("/console", crate::console::routes())
        .fallback(crate::surface::dispatch::<S, A>)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
    version: &'static str,
    registered_automations: usize,
    automations: Vec<String>,
}

async fn health_check<S, A>(State(state): State<AppState<S, A>>) -> Json<Health>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    let automations: Vec<String> = state
        .manager
        .registry()
        .list()
        .into_iter()
        .map(|automation| automation.name)
        .collect();
    Json(Health {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        registered_automations: automations.len(),
        automations,
    })
}
