use async_trait::async_trait;
use dbrun_pages::{GatewayError, PersistenceGateway};
use tokio::task;

use crate::app_cache::{AppCache, CacheError};

fn gateway_error(err: CacheError) -> GatewayError {
    match err {
        CacheError::Io(err) => GatewayError::Io(err),
        other => GatewayError::Backend(other.to_string()),
    }
}

fn join_error(err: task::JoinError) -> GatewayError {
    GatewayError::Backend(format!("cache task failed: {err}"))
}

/// File I/O runs on the blocking pool so the async caller is never stalled by disk.
#[async_trait]
impl PersistenceGateway for AppCache {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let cache = self.clone();
        let key = key.to_string();
        task::spawn_blocking(move || cache.get(&key))
            .await
            .map_err(join_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let cache = self.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || cache.set(&key, value))
            .await
            .map_err(join_error)?
            .map_err(gateway_error)
    }
}
