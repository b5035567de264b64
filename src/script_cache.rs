//! Local script cache.
//!
//! Holds the last template script served for each instrument so that it can be served again
//! when the remote repository is unavailable. Entries are disposable derived data: there is no
//! locking and the last writer wins.

use crate::error::ScriptError;

use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// File backed cache of one template script per instrument.
#[derive(Clone, Debug)]
pub struct LocalScriptCache {
    /// Directory containing `<instrument>.py` files
    dir: PathBuf,
}

impl LocalScriptCache {
    /// Create a cache rooted at a directory. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the cache file for an instrument.
    fn path(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{}.py", instrument.to_lowercase()))
    }

    /// Read the cached script of an instrument, if any.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Validated instrument name
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub async fn read(&self, instrument: &str) -> Result<Option<String>, ScriptError> {
        match fs::read_to_string(self.path(instrument)).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the cached script of an instrument.
    ///
    /// The text is written to a uniquely named sibling file which is then renamed over the
    /// entry, so readers see either the old or the new script in full.
    ///
    /// # Arguments
    ///
    /// * `instrument`: Validated instrument name
    /// * `text`: Template script text
    #[tracing::instrument(level = "DEBUG", skip(self, text))]
    pub async fn write(&self, instrument: &str, text: &str) -> Result<(), ScriptError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path(instrument);
        let tmp_path = self.dir.join(format!(
            ".{}.{}.tmp",
            instrument.to_lowercase(),
            Uuid::new_v4()
        ));
        fs::write(&tmp_path, text).await?;
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            // Report the rename error, not any clean up error.
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}
