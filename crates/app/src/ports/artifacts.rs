//! Artifact writer port: generated companion files of an automation.

use std::future::Future;

use council_domain::automation::Automation;
use council_domain::error::CouncilError;

/// Emits and purges artifacts generated for an automation.
pub trait ArtifactWriter {
    /// Emit artifacts for a freshly created automation.
    fn generate(
        &self,
        automation: &Automation,
    ) -> impl Future<Output = Result<(), CouncilError>> + Send;

    /// Remove every artifact generated for `name`.
    fn purge(&self, name: &str) -> impl Future<Output = Result<(), CouncilError>> + Send;
}

/// Artifact writer that emits nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

impl ArtifactWriter for NoArtifacts {
    async fn generate(&self, _automation: &Automation) -> Result<(), CouncilError> {
        Ok(())
    }

    async fn purge(&self, _name: &str) -> Result<(), CouncilError> {
        Ok(())
    }
}
