//! JSON-file implementation of [`DefinitionStore`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::AsyncWriteExt;

use council_app::ports::{DefinitionStore, StoredDefinition};
use council_domain::error::{CouncilError, ValidationError};

use crate::error::FsError;

const EXTENSION: &str = "json";

/// Definition store keeping `{dir}/{name}.json`.
#[derive(Debug, Clone)]
pub struct FsDefinitionStore {
    dir: PathBuf,
}

impl FsDefinitionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, CouncilError> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name != "..";
        if plain {
            Ok(self.dir.join(format!("{name}.{EXTENSION}")))
        } else {
            Err(ValidationError::InvalidName(name.to_string()).into())
        }
    }

    async fn read_document(path: &Path) -> Result<Value, String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| format!("unreadable: {err}"))?;
        serde_json::from_slice(&bytes).map_err(|err| format!("invalid JSON: {err}"))
    }
}

/// Write `bytes` to `path` so that the file is either absent, the old
/// content or the complete new content.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FsError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(FsError::io(parent))?;
    }
    let temp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    let mut file = tokio::fs::File::create(&temp)
        .await
        .map_err(FsError::io(&temp))?;
    file.write_all(bytes).await.map_err(FsError::io(&temp))?;
    file.sync_all().await.map_err(FsError::io(&temp))?;
    drop(file);
    if let Err(err) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(FsError::io(path)(err));
    }
    Ok(())
}

impl DefinitionStore for FsDefinitionStore {
    async fn load_all(&self) -> Result<Vec<StoredDefinition>, CouncilError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(dir = %self.dir.display(), "definitions directory missing, starting empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(FsError::io(&self.dir)(err).into()),
        };

        let mut definitions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(FsError::io(&self.dir))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let key = entry.file_name().to_string_lossy().into_owned();
            let document = Self::read_document(&path).await;
            definitions.push(StoredDefinition { key, document });
        }
        definitions.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(definitions)
    }

    async fn write(&self, name: &str, document: &Value) -> Result<(), CouncilError> {
        let path = self.path_for(name)?;
        let mut bytes = serde_json::to_vec_pretty(document).map_err(FsError::from)?;
        bytes.push(b'\n');
        write_atomic(&path, &bytes).await?;
        tracing::debug!(path = %path.display(), "definition written");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool, CouncilError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(FsError::io(path)(err).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn should_write_pretty_json_and_load_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDefinitionStore::new(dir.path());
        let document = json!({"name": "orders", "endpoints": []});

        store.write("orders", &document).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("orders.json")).unwrap();
        assert!(raw.contains("\n  \"name\": \"orders\""));
        let loaded = store.load_all().await.unwrap();
        assert_eq!(
            loaded,
            vec![StoredDefinition {
                key: "orders.json".to_string(),
                document: Ok(document),
            }]
        );
    }

    #[tokio::test]
    async fn should_replace_without_leaving_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDefinitionStore::new(dir.path());
        store.write("orders", &json!({"v": 1})).await.unwrap();
        store.write("orders", &json!({"v": 2})).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["orders.json".to_string()]);
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded[0].document, Ok(json!({"v": 2})));
    }

    #[tokio::test]
    async fn should_surface_corrupt_documents_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let store = FsDefinitionStore::new(dir.path());
        store.write("orders", &json!({"name": "orders"})).await.unwrap();

        let loaded = store.load_all().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].key, "broken.json");
        assert!(loaded[0].document.is_err());
        assert!(loaded[1].document.is_ok());
    }

    #[tokio::test]
    async fn should_start_empty_when_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDefinitionStore::new(dir.path().join("not-yet"));
        assert!(store.load_all().await.unwrap().is_empty());
        store.write("orders", &json!({})).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_report_whether_remove_found_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDefinitionStore::new(dir.path());
        store.write("orders", &json!({})).await.unwrap();
        assert!(store.remove("orders").await.unwrap());
        assert!(!store.remove("orders").await.unwrap());
    }

    #[tokio::test]
    async fn should_refuse_names_escaping_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDefinitionStore::new(dir.path());
        let err = store.write("../evil", &json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            CouncilError::Validation(ValidationError::InvalidName(_))
        ));
    }
}
