//! Remote script source.

use crate::error::ScriptError;

use async_trait::async_trait;

/// A template script as held by the remote repository.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteScript {
    /// Script body
    pub text: String,
    /// Content version (commit hash) of the script
    pub version_id: String,
}

/// Remote script source trait.
///
/// Defines the interface to the source controlled location holding instrument template
/// scripts. Implementations never retry: a failed call surfaces immediately so that the
/// caller can fall back to its local cache.
///
/// Failures are reported as [ScriptError::RemoteNotFound] when the instrument or version is
/// unknown upstream, and as [ScriptError::RemoteUnavailable] for any transport failure, timeout
/// or unexpected response.
#[async_trait]
pub trait RemoteScriptSource: Send + Sync {
    /// Fetch the newest template script for an instrument.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Validated instrument name
    async fn fetch_latest(&self, instrument: &str) -> Result<RemoteScript, ScriptError>;

    /// Fetch the template script for an instrument at a specific version.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Validated instrument name
    /// * `version_id`: Validated content version
    async fn fetch_at_version(
        &self,
        instrument: &str,
        version_id: &str,
    ) -> Result<RemoteScript, ScriptError>;

    /// Return the newest content version of an instrument's template script.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Validated instrument name
    async fn latest_version(&self, instrument: &str) -> Result<String, ScriptError>;
}
