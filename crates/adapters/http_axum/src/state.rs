//! Shared application state for axum handlers.

use std::sync::Arc;

use council_app::ports::{ArtifactWriter, DefinitionStore};
use council_app::services::AutomationManager;

/// Application state shared across all axum handlers.
///
/// Generic over the definition store and artifact writer to avoid dynamic
/// dispatch. `Clone` is implemented manually so the underlying types do not
/// need to be `Clone`; only the `Arc` is cloned.
pub struct AppState<S, A> {
    pub manager: Arc<AutomationManager<S, A>>,
}

impl<S, A> Clone for AppState<S, A> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<S, A> AppState<S, A>
where
    S: DefinitionStore + Send + Sync + 'static,
    A: ArtifactWriter + Send + Sync + 'static,
{
    pub fn new(manager: AutomationManager<S, A>) -> Self {
        Self::from_arc(Arc::new(manager))
    }

    /// Use this when the manager is shared with tasks outside the router.
    pub fn from_arc(manager: Arc<AutomationManager<S, A>>) -> Self {
        Self { manager }
    }
}
