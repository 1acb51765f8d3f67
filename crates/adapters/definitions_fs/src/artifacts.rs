//! Filesystem implementation of [`ArtifactWriter`].

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use council_app::ports::ArtifactWriter;
use council_domain::automation::{Automation, join_path};
use council_domain::error::CouncilError;

use crate::error::FsError;
use crate::store::write_atomic;

/// Writes `{dir}/{name}/README.md` for every created automation.
#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    dir: PathBuf,
}

impl FsArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn readme(automation: &Automation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", automation.name);
    if !automation.description.is_empty() {
        let _ = writeln!(out, "{}\n", automation.description);
    }
    let _ = writeln!(out, "- version: {}", automation.version);
    let _ = writeln!(out, "- base path: `{}`", automation.base_path);
    let _ = writeln!(
        out,
        "- storage: `{}` resource `{}`\n",
        automation.storage_binding.backend, automation.storage_binding.resource
    );
    out.push_str("## Endpoints\n\n");
    if automation.endpoints.is_empty() {
        out.push_str(
            "No endpoints declared yet. Activating the automation adds the default CRUD set.\n",
        );
    }
    for endpoint in &automation.endpoints {
        let handler = endpoint.handler_path.as_deref().unwrap_or("built-in CRUD");
        let _ = write!(
            out,
            "- `{} {}` ({handler})",
            endpoint.method,
            join_path(&automation.base_path, &endpoint.path)
        );
        if endpoint.summary.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, ": {}", endpoint.summary);
        }
    }
    out.push_str(
        "\n## Handlers\n\n\
         Set an endpoint's `handler_path` to the name of a handler registered at \
         startup to replace the built-in CRUD behaviour.\n",
    );
    out
}

impl ArtifactWriter for FsArtifactWriter {
    async fn generate(&self, automation: &Automation) -> Result<(), CouncilError> {
        let path = self.dir.join(&automation.name).join("README.md");
        write_atomic(&path, readme(automation).as_bytes()).await?;
        tracing::debug!(path = %path.display(), "artifacts generated");
        Ok(())
    }

    async fn purge(&self, name: &str) -> Result<(), CouncilError> {
        let path = self.dir.join(name);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FsError::io(path)(err).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::automation::{Endpoint, HttpMethod};

    fn orders() -> Automation {
        Automation::builder()
            .name("orders")
            .description("Customer orders")
            .endpoint(Endpoint::new(HttpMethod::Get, "/{id}").summary("Fetch one order"))
            .build()
            .unwrap()
    }

    #[test]
    fn should_list_full_route_paths_in_readme() {
        let text = readme(&orders());
        assert!(text.starts_with("# orders\n\nCustomer orders\n"));
        assert!(text.contains("- `GET /api/orders/{id}` (built-in CRUD): Fetch one order\n"));
    }

    #[tokio::test]
    async fn should_generate_and_purge_readme() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path());

        writer.generate(&orders()).await.unwrap();
        let readme = dir.path().join("orders").join("README.md");
        assert!(readme.exists());

        writer.purge("orders").await.unwrap();
        assert!(!dir.path().join("orders").exists());
        writer.purge("orders").await.unwrap();
    }
}
