//! Error handling.

use axum::{
    extract::rejection::QueryRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};

/// Script server error type
///
/// This type encapsulates the various errors that may occur while acquiring, caching and
/// transforming instrument scripts.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Error reading or writing local storage
    #[error("local storage error")]
    Io(#[from] std::io::Error),

    /// A reduction input read by an instrument transform is absent
    #[error("reduction {reduction_id} has no input {key} required by the {instrument} transform")]
    MissingReductionInput {
        instrument: String,
        reduction_id: i64,
        key: String,
    },

    /// No transform is registered for the instrument
    #[error("No transform for instrument {instrument}")]
    MissingTransform { instrument: String },

    /// Error deserialising the query string
    #[error("request query is not valid")]
    QueryRejection(#[from] QueryRejection),

    /// Error validating the query string
    #[error("request query is not valid")]
    QueryValidation(#[from] validator::ValidationErrors),

    /// No reduction exists for the requested id
    #[error("no reduction for id {id}")]
    ReductionNotFound { id: i64 },

    /// Error decoding stored reductions
    #[error("failed to decode stored reductions")]
    ReductionStoreDecode(#[from] serde_json::Error),

    /// The remote script repository has no such instrument or version
    #[error("script repository has no {path}")]
    RemoteNotFound { path: String },

    /// The remote script repository could not be reached or failed to respond
    #[error("script repository is unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    /// Neither the remote repository nor the local cache could supply a script
    #[error("no script found for instrument {instrument}{}", at_version(.version))]
    ScriptNotFound {
        instrument: String,
        version: Option<String>,
    },

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// An identifier contains path characters
    #[error("potentially unsafe path was requested: {identifier}")]
    UnsafeIdentifier { identifier: String },
}

fn at_version(version: &Option<String>) -> String {
    version
        .as_ref()
        .map(|version| format!(" at version {version}"))
        .unwrap_or_default()
}

impl IntoResponse for ScriptError {
    /// Convert from a `ScriptError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Return a 503 service unavailable ErrorResponse
    fn service_unavailable<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error)
    }
}

impl From<ScriptError> for ErrorResponse {
    /// Convert from a `ScriptError` into an `ErrorResponse`.
    fn from(error: ScriptError) -> Self {
        let response = match &error {
            // Bad request
            ScriptError::QueryRejection(_)
            | ScriptError::QueryValidation(_)
            | ScriptError::UnsafeIdentifier { .. } => Self::bad_request(&error),

            // Not found
            ScriptError::ReductionNotFound { .. }
            | ScriptError::RemoteNotFound { .. }
            | ScriptError::ScriptNotFound { .. } => Self::not_found(&error),

            // Service unavailable
            ScriptError::RemoteUnavailable { .. } => Self::service_unavailable(&error),

            // Internal server error
            ScriptError::Io(_)
            | ScriptError::MissingReductionInput { .. }
            | ScriptError::MissingTransform { .. }
            | ScriptError::ReductionStoreDecode(_)
            | ScriptError::SemaphoreAcquireError(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
