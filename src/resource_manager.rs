//! Resource management

use crate::error::ScriptError;

use tokio::sync::{Semaphore, SemaphorePermit};

/// [crate::resource_manager::ResourceManager] limits the resources used by requests to the
/// remote script repository. Resource management is performed using a Tokio Semaphore for each
/// type of resource.
#[derive(Debug)]
pub struct ResourceManager {
    /// Optional semaphore for connections to the script repository.
    remote_connections: Option<Semaphore>,
}

impl ResourceManager {
    /// Returns a new ResourceManager object.
    pub fn new(remote_connection_limit: Option<usize>) -> Self {
        Self {
            remote_connections: remote_connection_limit.map(Semaphore::new),
        }
    }

    /// Acquire a remote connection resource.
    pub async fn remote_connection(&self) -> Result<Option<SemaphorePermit>, ScriptError> {
        optional_acquire(&self.remote_connections).await
    }
}

/// Acquire a permit on an optional Semaphore, if present.
async fn optional_acquire(sem: &Option<Semaphore>) -> Result<Option<SemaphorePermit>, ScriptError> {
    if let Some(sem) = sem {
        sem.acquire().await.map(Some).map_err(|err| err.into())
    } else {
        Ok(None)
    }
}
