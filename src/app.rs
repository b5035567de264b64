use crate::app_state::SharedAppState;
use crate::error::ScriptError;
use crate::metrics::{metrics_handler, record_response_metrics, request_counter};
use crate::models;
use crate::validated_query::ValidatedQuery;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use tower::Layer;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

impl IntoResponse for models::PreScriptResponse {
    /// Convert from a `PreScriptResponse` into an [axum::response::Response].
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Returns a [axum::Router] for the FIA API script endpoints
///
/// The router is populated with a route for each script endpoint and the health and metrics
/// endpoints.
/// Each script route is wrapped in tracing and CORS layers.
///
/// # Arguments
///
/// * `state`: Shared application state, including the script resolver
fn router(state: SharedAppState) -> Router {
    fn scripts() -> Router<SharedAppState> {
        Router::new()
            .route("/:instrument/script", get(latest_script))
            .route("/:instrument/script/sha/:sha", get(script_at_version))
            .layer(
                ServiceBuilder::new()
                    .layer(
                        TraceLayer::new_for_http()
                            .make_span_with(DefaultMakeSpan::new().include_headers(true))
                            .on_request(request_counter)
                            .on_response(record_response_metrics),
                    )
                    .layer(CorsLayer::permissive()),
            )
    }

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics_handler))
        .nest("/instrument", scripts())
        .with_state(state)
}

/// FIA API Service type alias
///
/// This type implements [tower::Service] and is served by [crate::server::serve].
pub type Service = NormalizePath<Router>;

/// Returns a [Service] for the FIA API
///
/// The service is populated with all routes as well as the following middleware:
///
/// * a [tower_http::normalize_path::NormalizePathLayer] for trimming trailing slashes from
///   requests
///
/// # Arguments
///
/// * `state`: Shared application state
pub fn service(state: SharedAppState) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Handler for the latest script of an instrument
///
/// # Arguments
///
/// * `state`: Shared application state
/// * `instrument`: Instrument name from the request path
/// * `query`: Optional reduction to transform the script for
async fn latest_script(
    State(state): State<SharedAppState>,
    Path(instrument): Path<String>,
    ValidatedQuery(query): ValidatedQuery<models::ScriptQuery>,
) -> Result<models::PreScriptResponse, ScriptError> {
    let script = state
        .resolver
        .resolve_latest_script(&instrument, query.reduction_id)
        .await?;
    Ok(script.into())
}

/// Handler for the script of an instrument at a specific commit hash
async fn script_at_version(
    State(state): State<SharedAppState>,
    Path((instrument, sha)): Path<(String, String)>,
    ValidatedQuery(query): ValidatedQuery<models::ScriptQuery>,
) -> Result<models::PreScriptResponse, ScriptError> {
    let script = state
        .resolver
        .resolve_script_at_version(&instrument, &sha, query.reduction_id)
        .await?;
    Ok(script.into())
}
