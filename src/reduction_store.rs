//! Reduction repository.

use crate::error::ScriptError;
use crate::models::Reduction;

use async_trait::async_trait;
use hashbrown::HashMap;
use std::path::Path;

/// Read only access to stored reductions.
#[async_trait]
pub trait ReductionRepository: Send + Sync {
    /// Find a reduction by its id.
    ///
    /// Returns `None` if no such reduction exists.
    async fn find_reduction_by_id(&self, id: i64) -> Result<Option<Reduction>, ScriptError>;
}

/// Reductions held in memory, typically loaded once at start up.
#[derive(Debug, Default)]
pub struct InMemoryReductionRepository {
    reductions: HashMap<i64, Reduction>,
}

impl InMemoryReductionRepository {
    /// Create a repository holding `reductions`. Later entries replace earlier ones with the
    /// same id.
    pub fn new(reductions: impl IntoIterator<Item = Reduction>) -> Self {
        let mut map = HashMap::new();
        for reduction in reductions {
            if let Some(previous) = map.insert(reduction.id, reduction) {
                tracing::warn!(id = previous.id, "duplicate reduction replaced");
            }
        }
        Self { reductions: map }
    }

    /// Create a repository from a JSON array of reductions.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let reductions: Vec<Reduction> = serde_json::from_str(json)?;
        Ok(Self::new(reductions))
    }

    /// Create a repository from a file containing a JSON array of reductions.
    pub async fn from_json_file(path: &Path) -> Result<Self, ScriptError> {
        let json = tokio::fs::read_to_string(path).await?;
        let repository = Self::from_json(&json)?;
        tracing::info!(count = repository.len(), path = %path.display(), "loaded reductions");
        Ok(repository)
    }

    /// Number of reductions held.
    pub fn len(&self) -> usize {
        self.reductions.len()
    }

    /// Whether no reductions are held.
    pub fn is_empty(&self) -> bool {
        self.reductions.is_empty()
    }
}

#[async_trait]
impl ReductionRepository for InMemoryReductionRepository {
    async fn find_reduction_by_id(&self, id: i64) -> Result<Option<Reduction>, ScriptError> {
        Ok(self.reductions.get(&id).cloned())
    }
}
