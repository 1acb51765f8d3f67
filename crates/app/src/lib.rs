//! # council-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DefinitionStore`: durable collection of automation documents
//!   - `ArtifactWriter`: one-time artifact emission on creation, purge on delete
//!   - `RecordRepository` / `BackendConnector`: uniform record storage
//! - Own the **Automation Registry** (validated, indexed definitions)
//! - Resolve storage bindings through the **Storage Factory**
//! - Bind endpoints to handlers through the **Handler Resolver**
//! - Keep the live route table in the **Dispatcher** and serve requests from it
//! - Orchestrate all of the above in the **Automation Manager**
//!
//! ## Dependency rule
//! Depends on `council-domain` only (plus `tokio::sync`, `arc-swap` and
//! `async-trait`). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod builtin;
pub mod dispatcher;
pub mod handler;
pub mod memory;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod services;
pub mod storage;
