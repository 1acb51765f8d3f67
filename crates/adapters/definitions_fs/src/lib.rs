//! # council-adapter-definitions-fs
//!
//! Filesystem adapters for the definition and artifact ports.
//!
//! - [`FsDefinitionStore`]: one pretty-printed `{name}.json` per automation,
//!   written through a temporary file, fsync and rename so readers never see a
//!   partial document.
//! - [`FsArtifactWriter`]: a `{name}/README.md` describing the generated
//!   surface, removed again when the automation is deleted.

mod artifacts;
mod error;
mod store;

pub use artifacts::FsArtifactWriter;
pub use error::FsError;
pub use store::FsDefinitionStore;
