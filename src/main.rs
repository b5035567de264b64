//! This file defines the fia-api binary entry point.

use fia_api::app;
use fia_api::app_state::AppState;
use fia_api::cli;
use fia_api::metrics;
use fia_api::server;
use fia_api::tracing;

use std::process::ExitCode;
use std::sync::Arc;

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    tracing::init_tracing(&args);
    metrics::register_metrics();

    let (state, cache_writer) = match AppState::new(&args).await {
        Ok(initialised) => initialised,
        Err(err) => {
            ::tracing::error!(error = %err, "failed to initialise application state");
            tracing::shutdown_tracing();
            return ExitCode::FAILURE;
        }
    };
    let service = app::service(Arc::new(state));
    let result = server::serve(&args, service).await;

    // The service owned the last reference to the state, so the cache writer now drains its
    // queue and stops.
    if let Err(err) = cache_writer.await {
        ::tracing::error!(error = %err, "cache writer failed");
    }
    tracing::shutdown_tracing();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("server error: {}", err);
            ExitCode::FAILURE
        }
    }
}
