//! # council-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **console management API** under `/console` (create, list,
//!   activate, edit endpoints, delete, inspect live routes).
//! - Hand every other request to the [`Dispatcher`](council_app::dispatcher::Dispatcher)
//!   through an axum fallback, so generated automation routes change at
//!   runtime without rebuilding the axum router.
//! - Map application errors into structured `{error, message}` bodies.
//!
//! ## Dependency rule
//! Depends on `council-app` (services, dispatcher) and `council-domain`
//! (request/response types). Never leaks axum types into either.

pub mod console;
pub mod error;
pub mod router;
pub mod state;
pub mod surface;

/// Response header set when a route is served by the in-memory fallback.
pub const STORAGE_HEADER: &str = "x-council-storage";
