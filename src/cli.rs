//! Command Line Interface (CLI) arguments.

use clap::Parser;
use url::Url;

/// FIA API command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "FIA_API_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "FIA_API_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "FIA_API_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/fia-api/certs/cert.pem",
        env = "FIA_API_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/fia-api/certs/key.pem",
        env = "FIA_API_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "FIA_API_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "FIA_API_ENABLE_JAEGER")]
    pub enable_jaeger: bool,
    /// Base URL serving raw script files, as `<url>/<ref>/<INSTRUMENT>/reduce.py`
    #[arg(
        long,
        default_value = "https://raw.githubusercontent.com/fiaisis/autoreduction-scripts",
        env = "FIA_API_SCRIPT_RAW_URL"
    )]
    pub script_raw_url: Url,
    /// Base URL of the GitHub API for the script repository
    #[arg(
        long,
        default_value = "https://api.github.com/repos/fiaisis/autoreduction-scripts",
        env = "FIA_API_SCRIPT_API_URL"
    )]
    pub script_api_url: Url,
    /// Branch of the script repository treated as latest
    #[arg(long, default_value = "main", env = "FIA_API_SCRIPT_BRANCH")]
    pub script_branch: String,
    /// Optional GitHub token used to authenticate requests to the script repository
    #[arg(long, env = "FIA_API_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
    /// Timeout in seconds for each request to the script repository
    #[arg(long, default_value_t = 30, env = "FIA_API_REMOTE_TIMEOUT")]
    pub remote_timeout: u64,
    /// Maximum number of simultaneous connections to the script repository
    #[arg(long, env = "FIA_API_REMOTE_CONNECTION_LIMIT")]
    pub remote_connection_limit: Option<usize>,
    /// Directory holding the last served template script of each instrument
    #[arg(
        long,
        default_value = "~/.local/share/fia-api/scripts",
        env = "FIA_API_LOCAL_SCRIPT_DIR"
    )]
    pub local_script_dir: String,
    /// Optional JSON file containing the reductions available to script transforms
    #[arg(long, env = "FIA_API_REDUCTIONS_FILE")]
    pub reductions_file: Option<String>,
    /// Whether a script requested by commit hash is compared with the latest commit hash.
    /// When disabled such scripts are never reported as latest.
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "FIA_API_COMPARE_PINNED_WITH_LATEST"
    )]
    pub compare_pinned_with_latest: bool,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
