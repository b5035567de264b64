use crate::cache_writer::CacheWriter;
use crate::cli::CommandLineArgs;
use crate::error::ScriptError;
use crate::reduction_store::{InMemoryReductionRepository, ReductionRepository};
use crate::resolver::ScriptResolver;
use crate::script_cache::LocalScriptCache;
use crate::script_source_github::GitHubScriptSource;
use crate::transforms::TransformRegistry;

use expanduser::expanduser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Shared application state passed to each script request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Script resolver.
    pub resolver: ScriptResolver,
}

impl AppState {
    /// Create and return an [AppState] together with the [JoinHandle] of its background cache
    /// writer.
    ///
    /// The cache writer stops once the returned state has been dropped.
    pub async fn new(args: &CommandLineArgs) -> Result<(Self, JoinHandle<()>), ScriptError> {
        let cache = LocalScriptCache::new(expand_path(&args.local_script_dir)?);
        let reductions: Arc<dyn ReductionRepository> = match &args.reductions_file {
            Some(path) => Arc::new(
                InMemoryReductionRepository::from_json_file(&expand_path(path)?).await?,
            ),
            None => {
                tracing::warn!("no reductions file configured, no reductions will be found");
                Arc::new(InMemoryReductionRepository::default())
            }
        };
        let source = Arc::new(GitHubScriptSource::new(args.into())?);
        let (cache_writer, worker) = CacheWriter::spawn(cache.clone());
        let resolver = ScriptResolver::new(
            source,
            cache,
            reductions,
            TransformRegistry::default(),
            cache_writer,
            args.compare_pinned_with_latest,
        );
        let state = Self {
            args: args.clone(),
            resolver,
        };
        Ok((state, worker))
    }

    /// Create an [AppState] from its parts.
    pub fn from_parts(args: &CommandLineArgs, resolver: ScriptResolver) -> Self {
        Self {
            args: args.clone(),
            resolver,
        }
    }
}

/// Expand a leading `~` in a configured path.
fn expand_path(path: &str) -> Result<PathBuf, ScriptError> {
    Ok(expanduser(path)?)
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
