//! Background cache writer.
//!
//! Persists resolved template scripts to the [LocalScriptCache] on a separate task, so that
//! warming the cache never adds latency to a request.

use crate::metrics::CACHE_WRITES;
use crate::script_cache::LocalScriptCache;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A template script waiting to be cached.
///
/// Owns its text, so later changes to the script being served cannot affect what is cached.
#[derive(Debug, PartialEq)]
pub struct CacheWriteJob {
    /// Instrument name
    pub instrument: String,
    /// Untransformed template text
    pub text: String,
}

/// Handle used to schedule cache writes on the background worker.
///
/// The worker stops once every handle has been dropped and all queued jobs are written.
#[derive(Clone, Debug)]
pub struct CacheWriter {
    sender: mpsc::UnboundedSender<CacheWriteJob>,
}

impl CacheWriter {
    /// Start a worker writing to `cache`.
    ///
    /// Returns the handle used to schedule writes and the worker's [JoinHandle].
    pub fn spawn(cache: LocalScriptCache) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(cache, receiver));
        (Self { sender }, worker)
    }

    /// Queue a template script to be cached. Never blocks and never fails the caller.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Validated instrument name
    /// * `text`: Untransformed template text
    pub fn schedule(&self, instrument: &str, text: String) {
        let job = CacheWriteJob {
            instrument: instrument.to_string(),
            text,
        };
        if let Err(err) = self.sender.send(job) {
            tracing::warn!(
                instrument = %err.0.instrument,
                "cache writer has stopped, script not cached"
            );
            CACHE_WRITES.with_label_values(&["dropped"]).inc();
        }
    }
}

/// Write queued jobs until every sender is dropped.
async fn run(cache: LocalScriptCache, mut receiver: mpsc::UnboundedReceiver<CacheWriteJob>) {
    while let Some(job) = receiver.recv().await {
        match cache.write(&job.instrument, &job.text).await {
            Ok(()) => {
                tracing::debug!(instrument = %job.instrument, "cached script");
                CACHE_WRITES.with_label_values(&["ok"]).inc();
            }
            Err(err) => {
                tracing::error!(instrument = %job.instrument, error = %err, "failed to cache script");
                CACHE_WRITES.with_label_values(&["error"]).inc();
            }
        }
    }
    tracing::debug!("cache writer stopped");
}
