//! Data types and associated functions and methods

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lines containing any of these markers carry credentials and are never sent to clients.
const TOKEN_MARKERS: [&str; 2] = ["ghp_", "network.github.api_token"];

/// A template script for an instrument, optionally transformed for a reduction.
///
/// Created fresh for each resolution. Only the untransformed `text` is ever cached.
#[derive(Clone, Debug, PartialEq)]
pub struct PreScript {
    /// Script body
    pub text: String,
    /// Whether `text` reflects the newest remote version known at resolution time
    pub is_latest: bool,
    /// Content version (commit hash) of `text`, if known
    pub version_id: Option<String>,
}

impl PreScript {
    /// Return a new PreScript.
    pub fn new(text: impl Into<String>, is_latest: bool, version_id: Option<String>) -> Self {
        PreScript {
            text: text.into(),
            is_latest,
            version_id,
        }
    }
}

/// Instrument specific reduction parameters.
///
/// Opaque to everything except the matching instrument transform.
pub type ReductionInputs = serde_json::Map<String, serde_json::Value>;

/// A stored reduction, read only here.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Reduction {
    /// Reduction identifier
    pub id: i64,
    /// Parameters the reduction was (or will be) run with
    #[serde(default)]
    pub reduction_inputs: ReductionInputs,
}

/// Query parameters accepted by the script endpoints
#[derive(Debug, Default, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct ScriptQuery {
    /// Reduction whose inputs should be substituted into the script
    #[validate(range(min = 1, message = "reduction_id must be greater than 0"))]
    pub reduction_id: Option<i64>,
}

/// Script response body
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct PreScriptResponse {
    /// Script text, filtered for credentials
    pub value: String,
    /// Whether the script is known to be the latest version
    pub is_latest: bool,
    /// Commit hash of the script, if known
    pub sha: Option<String>,
}

impl From<PreScript> for PreScriptResponse {
    fn from(script: PreScript) -> Self {
        PreScriptResponse {
            value: filter_script_for_tokens(&script.text),
            is_latest: script.is_latest,
            sha: script.version_id,
        }
    }
}

/// Remove every line of a script that carries a token.
///
/// Other lines, including their line endings, are kept as they are.
pub fn filter_script_for_tokens(script: &str) -> String {
    script
        .split_inclusive('\n')
        .filter(|line| !TOKEN_MARKERS.iter().any(|marker| line.contains(marker)))
        .collect()
}
