//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use council_app::dispatcher::DispatchError;
use council_app::handler::HandlerError;
use council_domain::error::CouncilError;

/// JSON error body returned by every route.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error: kind,
            message,
        }),
    )
        .into_response()
}

/// `route_not_found` for a verb no automation can declare.
pub(crate) fn unknown_method(method: &axum::http::Method, path: &str) -> Response {
    tracing::debug!(%method, path, "request with unsupported method");
    error_response(
        StatusCode::NOT_FOUND,
        "route_not_found",
        format!("no route for {method} {path}"),
    )
}

/// Maps [`CouncilError`] and malformed console requests to an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Council(CouncilError),
    /// The request itself could not be understood.
    BadRequest(String),
}

impl From<CouncilError> for ApiError {
    fn from(err: CouncilError) -> Self {
        Self::Council(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "validation_error", message),
            Self::Council(CouncilError::Validation(err)) => {
                (StatusCode::BAD_REQUEST, "validation_error", err.to_string())
            }
            Self::Council(CouncilError::NotFound(err)) => {
                (StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            Self::Council(CouncilError::EndpointNotFound(err)) => {
                (StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            Self::Council(CouncilError::DuplicateName(err)) => {
                (StatusCode::CONFLICT, "duplicate_name", err.to_string())
            }
            Self::Council(CouncilError::Storage(err)) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };
        if status.is_client_error() {
            tracing::debug!(%status, kind, %message, "console request rejected");
        }
        error_response(status, kind, message)
    }
}

/// Maps [`DispatchError`] from the generated surface to an HTTP response.
///
/// Handler failures other than a missing or duplicate record or bad input are
/// logged and answered with a generic message.
#[derive(Debug)]
pub struct DispatchFailure(pub DispatchError);

impl From<DispatchError> for DispatchFailure {
    fn from(err: DispatchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for DispatchFailure {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self.0 {
            err @ DispatchError::RouteNotFound { .. } => {
                (StatusCode::NOT_FOUND, "route_not_found", err.to_string())
            }
            DispatchError::ParameterValidation(message)
            | DispatchError::Handler(HandlerError::InvalidInput(message)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "parameter_validation", message)
            }
            DispatchError::Handler(err @ HandlerError::RecordNotFound(_)) => {
                (StatusCode::NOT_FOUND, "record_not_found", err.to_string())
            }
            DispatchError::Handler(err @ HandlerError::DuplicateRecord(_)) => {
                (StatusCode::CONFLICT, "duplicate_record", err.to_string())
            }
            DispatchError::Handler(err) => {
                tracing::error!(error = %err, "handler failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "handler_error",
                    "the handler failed to process the request".to_string(),
                )
            }
        };
        if status.is_client_error() {
            tracing::debug!(%status, kind, %message, "request rejected");
        }
        error_response(status, kind, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_app::ports::StorageError;
    use council_domain::automation::HttpMethod;
    use council_domain::error::DuplicateNameError;

    #[test]
    fn should_map_duplicate_name_to_conflict() {
        let response =
            ApiError::from(CouncilError::from(DuplicateNameError("orders".to_string()))).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn should_map_storage_error_to_internal_error() {
        let err = CouncilError::storage(std::io::Error::other("disk full"));
        assert_eq!(
            ApiError::from(err).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn should_map_route_not_found_to_404() {
        let failure = DispatchFailure(DispatchError::RouteNotFound {
            method: HttpMethod::Get,
            path: "/nowhere".to_string(),
        });
        assert_eq!(failure.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_hide_backend_failures_behind_500() {
        let failure = DispatchFailure(DispatchError::Handler(HandlerError::Backend(
            StorageError::InvalidConfig("secret detail".to_string()),
        )));
        assert_eq!(
            failure.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
