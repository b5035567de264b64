//! Script resolution.
//!
//! Decides where a template script comes from (the remote repository, a pinned remote version,
//! or the local cache), personalises it for a reduction when asked to, and hands the
//! untransformed template to the background cache writer.

use crate::cache_writer::CacheWriter;
use crate::error::ScriptError;
use crate::metrics::SCRIPTS_RESOLVED;
use crate::models::PreScript;
use crate::path_guard;
use crate::reduction_store::ReductionRepository;
use crate::script_cache::LocalScriptCache;
use crate::script_source::RemoteScriptSource;
use crate::transforms::TransformRegistry;

use std::sync::Arc;
use strum_macros::Display;

/// Where a resolved template script came from.
#[derive(Clone, Copy, Debug, Display, PartialEq)]
#[strum(serialize_all = "lowercase")]
enum ScriptOrigin {
    /// Latest version from the remote repository
    Remote,
    /// Local cache, after the remote repository could not be reached
    Cache,
    /// Pinned version from the remote repository
    Version,
}

/// Resolves template scripts for instruments.
pub struct ScriptResolver {
    source: Arc<dyn RemoteScriptSource>,
    cache: LocalScriptCache,
    reductions: Arc<dyn ReductionRepository>,
    transforms: TransformRegistry,
    cache_writer: CacheWriter,
    compare_pinned_with_latest: bool,
}

impl ScriptResolver {
    /// Create a new resolver.
    ///
    /// # Arguments
    ///
    /// * `source`: Remote repository of template scripts
    /// * `cache`: Local cache read when the remote repository is unavailable
    /// * `reductions`: Repository of reductions
    /// * `transforms`: Transform for each supported instrument
    /// * `cache_writer`: Background writer populating `cache`
    /// * `compare_pinned_with_latest`: Whether to look up the latest version when a pinned
    ///   version is requested, to report whether the two match. When false, pinned scripts are
    ///   never reported as latest.
    pub fn new(
        source: Arc<dyn RemoteScriptSource>,
        cache: LocalScriptCache,
        reductions: Arc<dyn ReductionRepository>,
        transforms: TransformRegistry,
        cache_writer: CacheWriter,
        compare_pinned_with_latest: bool,
    ) -> Self {
        Self {
            source,
            cache,
            reductions,
            transforms,
            cache_writer,
            compare_pinned_with_latest,
        }
    }

    /// Resolve the newest template script of an instrument, transformed for a reduction if one
    /// is given.
    ///
    /// Falls back to the local cache when the remote repository is unavailable.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Untrusted instrument name
    /// * `reduction_id`: Optional reduction to transform the script for
    #[tracing::instrument(skip(self))]
    pub async fn resolve_latest_script(
        &self,
        instrument: &str,
        reduction_id: Option<i64>,
    ) -> Result<PreScript, ScriptError> {
        let instrument = path_guard::validate(instrument)?;
        let (script, origin) = match self.source.fetch_latest(instrument).await {
            Ok(remote) => (
                PreScript::new(remote.text, true, Some(remote.version_id)),
                ScriptOrigin::Remote,
            ),
            Err(ScriptError::RemoteUnavailable { reason }) => {
                tracing::warn!(%reason, "script repository unavailable, trying local cache");
                match self.cache.read(instrument).await? {
                    Some(text) => (PreScript::new(text, false, None), ScriptOrigin::Cache),
                    None => return Err(not_found(instrument, None)),
                }
            }
            Err(ScriptError::RemoteNotFound { .. }) => return Err(not_found(instrument, None)),
            Err(err) => return Err(err),
        };
        self.schedule_cache_write(instrument, &script);
        self.finish(instrument, script, origin, reduction_id).await
    }

    /// Resolve an instrument's template script at a specific version, transformed for a
    /// reduction if one is given.
    ///
    /// There is no cache fallback for pinned versions.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Untrusted instrument name
    /// * `version_id`: Untrusted content version
    /// * `reduction_id`: Optional reduction to transform the script for
    #[tracing::instrument(skip(self))]
    pub async fn resolve_script_at_version(
        &self,
        instrument: &str,
        version_id: &str,
        reduction_id: Option<i64>,
    ) -> Result<PreScript, ScriptError> {
        let instrument = path_guard::validate(instrument)?;
        let version_id = path_guard::validate(version_id)?;
        let remote = match self.source.fetch_at_version(instrument, version_id).await {
            Ok(remote) => remote,
            Err(ScriptError::RemoteNotFound { .. }) => {
                return Err(not_found(instrument, Some(version_id)))
            }
            Err(err) => return Err(err),
        };
        let is_latest = self.is_latest(instrument, &remote.version_id).await;
        let script = PreScript::new(remote.text, is_latest, Some(remote.version_id));
        if script.is_latest {
            self.schedule_cache_write(instrument, &script);
        }
        self.finish(instrument, script, ScriptOrigin::Version, reduction_id)
            .await
    }

    /// Whether `version_id` is the newest version of the instrument's script.
    ///
    /// False when the comparison is disabled or the latest version cannot be determined.
    async fn is_latest(&self, instrument: &str, version_id: &str) -> bool {
        if !self.compare_pinned_with_latest {
            return false;
        }
        match self.source.latest_version(instrument).await {
            Ok(latest) => latest == version_id,
            Err(err) => {
                tracing::warn!(error = %err, "unable to determine latest script version");
                false
            }
        }
    }

    /// Queue the untransformed template for the local cache.
    fn schedule_cache_write(&self, instrument: &str, script: &PreScript) {
        self.cache_writer.schedule(instrument, script.text.clone());
    }

    /// Count the resolution and apply the reduction's transform, if any.
    async fn finish(
        &self,
        instrument: &str,
        mut script: PreScript,
        origin: ScriptOrigin,
        reduction_id: Option<i64>,
    ) -> Result<PreScript, ScriptError> {
        SCRIPTS_RESOLVED
            .with_label_values(&[&origin.to_string()])
            .inc();
        tracing::debug!(%origin, is_latest = script.is_latest, sha = ?script.version_id, "resolved template script");
        if let Some(id) = reduction_id {
            let reduction = self
                .reductions
                .find_reduction_by_id(id)
                .await?
                .ok_or(ScriptError::ReductionNotFound { id })?;
            self.transforms
                .get_transform(instrument)?
                .apply(&mut script, &reduction)?;
        }
        Ok(script)
    }
}

fn not_found(instrument: &str, version_id: Option<&str>) -> ScriptError {
    ScriptError::ScriptNotFound {
        instrument: instrument.to_string(),
        version: version_id.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, FakeScriptSource};

    use tempfile::TempDir;
    use tokio::task::JoinHandle;

    struct Fixture {
        resolver: ScriptResolver,
        source: Arc<FakeScriptSource>,
        cache: LocalScriptCache,
        worker: JoinHandle<()>,
        _dir: TempDir,
    }

    impl Fixture {
        /// Drop the resolver and wait for queued cache writes.
        async fn flush(self) -> (LocalScriptCache, TempDir) {
            drop(self.resolver);
            self.worker.await.unwrap();
            (self.cache, self._dir)
        }
    }

    fn fixture(source: FakeScriptSource, compare_pinned_with_latest: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalScriptCache::new(dir.path());
        let (cache_writer, worker) = CacheWriter::spawn(cache.clone());
        let source = Arc::new(source);
        let resolver = ScriptResolver::new(
            source.clone(),
            cache.clone(),
            Arc::new(test_utils::reductions()),
            TransformRegistry::default(),
            cache_writer,
            compare_pinned_with_latest,
        );
        Fixture {
            resolver,
            source,
            cache,
            worker,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_latest() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let script = fixture
            .resolver
            .resolve_latest_script("mari", None)
            .await
            .unwrap();
        assert_eq!(
            PreScript::new(test_utils::MARI_TEMPLATE, true, Some("2222".to_string())),
            script
        );
        let (cache, _dir) = fixture.flush().await;
        assert_eq!(
            Some(test_utils::MARI_TEMPLATE.to_string()),
            cache.read("mari").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_latest_unsafe_instrument() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        for instrument in ["../mari", "mari.py", "a\\b", "."] {
            let err = fixture
                .resolver
                .resolve_latest_script(instrument, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ScriptError::UnsafeIdentifier { .. }), "{:?}", err);
        }
        assert_eq!(0, fixture.source.calls());
    }

    #[tokio::test]
    async fn test_latest_cache_fallback() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        fixture.cache.write("mari", "cached mari").await.unwrap();
        fixture.source.set_unavailable(true);
        let script = fixture
            .resolver
            .resolve_latest_script("mari", None)
            .await
            .unwrap();
        assert_eq!(PreScript::new("cached mari", false, None), script);
    }

    #[tokio::test]
    async fn test_latest_cache_fallback_transformed() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        fixture
            .cache
            .write("test", test_utils::TEST_TEMPLATE)
            .await
            .unwrap();
        fixture.source.set_unavailable(true);
        let script = fixture
            .resolver
            .resolve_latest_script("test", Some(3))
            .await
            .unwrap();
        assert!(script.text.contains("for reduction 3"));
        assert!(!script.is_latest);
        // The cache keeps the template, not the personalised script.
        let (cache, _dir) = fixture.flush().await;
        assert_eq!(
            Some(test_utils::TEST_TEMPLATE.to_string()),
            cache.read("test").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_latest_unavailable_without_cache() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        fixture.source.set_unavailable(true);
        let err = fixture
            .resolver
            .resolve_latest_script("mari", None)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, ScriptError::ScriptNotFound { instrument, version: None } if instrument == "mari"),
            "{:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_latest_unknown_instrument() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let err = fixture
            .resolver
            .resolve_latest_script("loq", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::ScriptNotFound { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_latest_transformed() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let script = fixture
            .resolver
            .resolve_latest_script("osiris", Some(2))
            .await
            .unwrap();
        assert!(script.is_latest);
        assert_eq!(Some("3333".to_string()), script.version_id);
        assert!(script.text.contains("input_runs = [25581, 25582]\n"));
        assert!(script.text.contains("diffraction_reduction = True\n"));
        let template_lines: Vec<&str> = test_utils::OSIRIS_TEMPLATE.lines().collect();
        let lines: Vec<&str> = script.text.lines().collect();
        assert_eq!(template_lines.len(), lines.len());
        assert_eq!(template_lines[0], lines[0]);
        assert_eq!(template_lines[7], lines[7]);
        let (cache, _dir) = fixture.flush().await;
        assert_eq!(
            Some(test_utils::OSIRIS_TEMPLATE.to_string()),
            cache.read("osiris").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_latest_transform_idempotent() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let first = fixture
            .resolver
            .resolve_latest_script("mari", Some(1))
            .await
            .unwrap();
        let second = fixture
            .resolver
            .resolve_latest_script("mari", Some(1))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_latest_reduction_not_found() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let err = fixture
            .resolver
            .resolve_latest_script("mari", Some(99))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::ReductionNotFound { id: 99 }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_missing_transform() {
        let source = FakeScriptSource::with_templates().with_script("loq", "5555", "x = 1\n");
        let fixture = fixture(source, true);
        // The untransformed template resolves without a transform.
        let script = fixture
            .resolver
            .resolve_latest_script("loq", None)
            .await
            .unwrap();
        assert_eq!("x = 1\n", script.text);
        let err = fixture
            .resolver
            .resolve_latest_script("loq", Some(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("loq"), "{}", err);
        assert!(matches!(err, ScriptError::MissingTransform { .. }));
    }

    #[tokio::test]
    async fn test_failed_transform_still_caches_template() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let err = fixture
            .resolver
            .resolve_latest_script("mari", Some(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::MissingReductionInput { .. }), "{:?}", err);
        let (cache, _dir) = fixture.flush().await;
        assert_eq!(
            Some(test_utils::MARI_TEMPLATE.to_string()),
            cache.read("mari").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_version_latest() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let script = fixture
            .resolver
            .resolve_script_at_version("mari", "2222", None)
            .await
            .unwrap();
        assert_eq!(
            PreScript::new(test_utils::MARI_TEMPLATE, true, Some("2222".to_string())),
            script
        );
        let (cache, _dir) = fixture.flush().await;
        assert_eq!(
            Some(test_utils::MARI_TEMPLATE.to_string()),
            cache.read("mari").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_version_older() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let script = fixture
            .resolver
            .resolve_script_at_version("mari", "1111", None)
            .await
            .unwrap();
        assert_eq!(
            PreScript::new("runno = -1\n", false, Some("1111".to_string())),
            script
        );
        // Older versions never replace the cached template.
        let (cache, _dir) = fixture.flush().await;
        assert_eq!(None, cache.read("mari").await.unwrap());
    }

    #[tokio::test]
    async fn test_version_older_transformed() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let script = fixture
            .resolver
            .resolve_script_at_version("mari", "1111", Some(1))
            .await
            .unwrap();
        assert_eq!("runno = 25581\n", script.text);
    }

    #[tokio::test]
    async fn test_version_comparison_disabled() {
        let fixture = fixture(FakeScriptSource::with_templates(), false);
        let script = fixture
            .resolver
            .resolve_script_at_version("mari", "2222", None)
            .await
            .unwrap();
        assert!(!script.is_latest);
        assert_eq!(Some("2222".to_string()), script.version_id);
    }

    #[tokio::test]
    async fn test_version_comparison_unavailable() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        fixture.source.set_latest_version_unavailable(true);
        let script = fixture
            .resolver
            .resolve_script_at_version("mari", "2222", None)
            .await
            .unwrap();
        assert!(!script.is_latest);
    }

    #[tokio::test]
    async fn test_version_not_found() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let err = fixture
            .resolver
            .resolve_script_at_version("mari", "9999", None)
            .await
            .unwrap_err();
        assert_eq!(
            "no script found for instrument mari at version 9999",
            err.to_string()
        );
    }

    #[tokio::test]
    async fn test_version_unsafe() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        let err = fixture
            .resolver
            .resolve_script_at_version("mari", "../../etc", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::UnsafeIdentifier { .. }), "{:?}", err);
        assert_eq!(0, fixture.source.calls());
    }

    #[tokio::test]
    async fn test_version_unavailable() {
        let fixture = fixture(FakeScriptSource::with_templates(), true);
        fixture.cache.write("mari", "cached").await.unwrap();
        fixture.source.set_unavailable(true);
        let err = fixture
            .resolver
            .resolve_script_at_version("mari", "2222", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::RemoteUnavailable { .. }), "{:?}", err);
    }

    #[test]
    fn test_script_origin_display() {
        assert_eq!("remote", ScriptOrigin::Remote.to_string());
        assert_eq!("cache", ScriptOrigin::Cache.to_string());
        assert_eq!("version", ScriptOrigin::Version.to_string());
    }
}
