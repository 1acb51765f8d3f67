//! Default CRUD endpoint set synthesized on first activation.

use serde_json::json;

use super::endpoint::{Endpoint, EndpointParameter, HttpMethod, ParamType};

/// Default page size of the synthesized list endpoint.
pub const DEFAULT_LIST_LIMIT: u64 = 100;

/// The five endpoints every activated automation without endpoints receives.
#[must_use]
pub fn default_crud_endpoints() -> Vec<Endpoint> {
    let id_param = || EndpointParameter::required("id", ParamType::String).describe("Record id");
    vec![
        Endpoint::new(HttpMethod::Get, "/")
            .summary("List records")
            .wrapped(true)
            .param(
                EndpointParameter::optional(
                    "limit",
                    ParamType::Integer,
                    Some(json!(DEFAULT_LIST_LIMIT)),
                )
                .describe("Maximum number of records"),
            )
            .param(
                EndpointParameter::optional("offset", ParamType::Integer, Some(json!(0)))
                    .describe("Records to skip"),
            ),
        Endpoint::new(HttpMethod::Get, "/{id}")
            .summary("Get a record")
            .single(true)
            .wrapped(true)
            .param(id_param()),
        Endpoint::new(HttpMethod::Post, "/")
            .summary("Create a record")
            .single(true),
        Endpoint::new(HttpMethod::Put, "/{id}")
            .summary("Replace a record")
            .single(true)
            .wrapped(true)
            .param(id_param()),
        Endpoint::new(HttpMethod::Delete, "/{id}")
            .summary("Delete a record")
            .single(true)
            .param(id_param()),
    ]
}
