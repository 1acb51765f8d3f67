//! # council-domain
//!
//! Pure domain model for council, a server that turns declarative
//! automation definitions into live HTTP routes.
//!
//! ## Responsibilities
//! - Foundational types: identifiers, error conventions, timestamps
//! - Define **Automations** (named, versioned bundles of endpoints bound to a store)
//! - Define **Endpoints** (one `(path, method)` route with a parameter schema
//!   and response-shaping flags)
//! - Define **Storage bindings** (backend type tag + connection config + resource)
//! - Synthesize the default CRUD endpoint set
//! - Contain all invariant enforcement
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod record;
