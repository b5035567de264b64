//! This crate provides the script service of the Facility Instrument Automation (FIA) API.
//! It serves the reduction script of a scientific instrument, optionally personalised with the
//! inputs of a stored reduction.
//!
//! A generic template script is fetched from a source controlled repository, either at its
//! newest version or pinned to a commit hash. When the repository cannot be reached the last
//! template served for the instrument is read from a local cache instead. If a reduction is
//! named, an instrument specific transform rewrites the lines of the template that hold the
//! reduction's inputs. Templates are written back to the local cache in the background, so
//! keeping the cache warm never delays a response.
//!
//! The service is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [reqwest] is used to talk to the GitHub hosted script repository.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [tracing] and [prometheus] provide logging and metrics.

pub mod app;
pub mod app_state;
pub mod cache_writer;
pub mod cli;
pub mod error;
pub mod metrics;
pub mod models;
pub mod path_guard;
pub mod reduction_store;
pub mod resolver;
pub mod resource_manager;
pub mod script_cache;
pub mod script_source;
pub mod script_source_github;
pub mod server;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod transforms;
pub mod validated_query;
