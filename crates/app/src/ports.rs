//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod artifacts;
pub mod definitions;
pub mod records;

pub use artifacts::{ArtifactWriter, NoArtifacts};
pub use definitions::{DefinitionStore, StoredDefinition};
pub use records::{
    BackendConnection, BackendConnector, BackendStatus, RecordRepository, StorageError,
};
