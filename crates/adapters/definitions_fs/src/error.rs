use std::path::PathBuf;

use council_domain::error::CouncilError;

/// Errors originating from the filesystem adapters.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("io error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode definition")]
    Encode(#[from] serde_json::Error),
}

impl FsError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl From<FsError> for CouncilError {
    fn from(err: FsError) -> Self {
        Self::Storage(Box::new(err))
    }
}
