use crate::cli::CommandLineArgs;
use crate::error::ScriptError;
use crate::resource_manager::ResourceManager;
use crate::script_source::{RemoteScript, RemoteScriptSource};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Connection details of a GitHub hosted script repository.
#[derive(Clone, Debug)]
pub struct GitHubSourceConfig {
    /// Base URL serving raw files by git reference
    pub raw_url: Url,
    /// Base URL of the repository in the GitHub REST API
    pub api_url: Url,
    /// Branch treated as latest
    pub branch: String,
    /// Optional token for authenticated requests
    pub token: Option<String>,
    /// Timeout applied to each request
    pub timeout: Duration,
    /// Optional limit on simultaneous connections
    pub connection_limit: Option<usize>,
}

impl From<&CommandLineArgs> for GitHubSourceConfig {
    fn from(args: &CommandLineArgs) -> Self {
        Self {
            raw_url: args.script_raw_url.clone(),
            api_url: args.script_api_url.clone(),
            branch: args.script_branch.clone(),
            token: args.github_token.clone(),
            timeout: Duration::from_secs(args.remote_timeout),
            connection_limit: args.remote_connection_limit,
        }
    }
}

/// Entry of the GitHub list commits response.
#[derive(Debug, Deserialize)]
struct Commit {
    sha: String,
}

/// GitHub script source.
///
/// Implements [RemoteScriptSource] for a GitHub repository laid out as
/// `<INSTRUMENT>/reduce.py`.
#[derive(Debug)]
pub struct GitHubScriptSource {
    reqwest_client: reqwest::Client,
    config: GitHubSourceConfig,
    resource_manager: ResourceManager,
}

impl GitHubScriptSource {
    /// Create a new GitHub script source.
    pub fn new(config: GitHubSourceConfig) -> Result<Self, ScriptError> {
        let reqwest_client = reqwest::Client::builder()
            .timeout(config.timeout)
            // The GitHub API rejects requests without a user agent.
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ScriptError::RemoteUnavailable {
                reason: format!("failed to build HTTP client: {}", err),
            })?;
        let resource_manager = ResourceManager::new(config.connection_limit);
        Ok(Self {
            reqwest_client,
            config,
            resource_manager,
        })
    }

    /// Path of an instrument's script within the repository.
    fn script_path(instrument: &str) -> String {
        format!("{}/reduce.py", instrument.to_uppercase())
    }

    /// URL of an instrument's raw script at a git reference.
    fn raw_script_url(&self, instrument: &str, reference: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.raw_url.as_str().trim_end_matches('/'),
            reference,
            Self::script_path(instrument)
        )
    }

    /// URL listing the newest commit touching an instrument's script on the branch.
    fn commits_url(&self, instrument: &str) -> String {
        format!(
            "{}/commits?sha={}&path={}&per_page=1",
            self.config.api_url.as_str().trim_end_matches('/'),
            self.config.branch,
            Self::script_path(instrument)
        )
    }

    /// Send a GET request and return the response body.
    ///
    /// # Arguments
    ///
    /// * `url`: URL to request
    /// * `path`: Repository path reported if the URL does not exist
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn get_text(&self, url: &str, path: &str) -> Result<String, ScriptError> {
        // Acquire connection permit to be freed via drop when this function returns
        let _conn_permit = self.resource_manager.remote_connection().await?;
        let request = self.reqwest_client.get(url);
        let request = if let Some(token) = &self.config.token {
            request.bearer_auth(token)
        } else {
            request
        };
        let response = match request.send().await {
            Ok(response) => match response.status() {
                reqwest::StatusCode::OK => response,
                reqwest::StatusCode::NOT_FOUND => {
                    return Err(ScriptError::RemoteNotFound {
                        path: path.to_string(),
                    })
                }
                status => {
                    return Err(ScriptError::RemoteUnavailable {
                        reason: format!("request to {} failed with status: {}", url, status),
                    })
                }
            },
            Err(err) => return Err(unavailable(url, err)),
        };
        response.text().await.map_err(|err| unavailable(url, err))
    }
}

/// Map a transport error onto [ScriptError::RemoteUnavailable].
fn unavailable(url: &str, err: reqwest::Error) -> ScriptError {
    let reason = if err.is_timeout() {
        format!("request to {} timed out", url)
    } else {
        format!("request to {} failed: {}", url, err)
    };
    ScriptError::RemoteUnavailable { reason }
}

#[async_trait]
impl RemoteScriptSource for GitHubScriptSource {
    /// Resolve the newest commit hash first, then fetch the script at that hash so that the
    /// text and version always agree.
    async fn fetch_latest(&self, instrument: &str) -> Result<RemoteScript, ScriptError> {
        let version_id = self.latest_version(instrument).await?;
        self.fetch_at_version(instrument, &version_id).await
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn fetch_at_version(
        &self,
        instrument: &str,
        version_id: &str,
    ) -> Result<RemoteScript, ScriptError> {
        let url = self.raw_script_url(instrument, version_id);
        let path = format!("{}@{}", Self::script_path(instrument), version_id);
        let text = self.get_text(&url, &path).await?;
        Ok(RemoteScript {
            text,
            version_id: version_id.to_string(),
        })
    }

    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn latest_version(&self, instrument: &str) -> Result<String, ScriptError> {
        let url = self.commits_url(instrument);
        let path = Self::script_path(instrument);
        let body = self.get_text(&url, &path).await?;
        let commits: Vec<Commit> =
            serde_json::from_str(&body).map_err(|err| ScriptError::RemoteUnavailable {
                reason: format!("unexpected response from {}: {}", url, err),
            })?;
        // An empty listing means no commit on the branch touches the script.
        commits
            .into_iter()
            .next()
            .map(|commit| commit.sha)
            .ok_or(ScriptError::RemoteNotFound { path })
    }
}
