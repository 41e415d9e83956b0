use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

/// Asynchronous string-keyed store the page state is persisted through.
///
/// Both operations are best-effort from the caller's point of view: failures are
/// reported but never treated as fatal.
/// 以字串為鍵的非同步儲存介面；失敗僅回報，不視為致命錯誤。
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Returns the stored value, or `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
    #[error("persistence backend error: {0}")]
    Backend(String),
    #[error("persistence IO error: {0}")]
    Io(#[from] io::Error),
}

/// Process-local gateway backed by a hash map. Failures can be injected for tests.
/// 以雜湊表實作的記憶體儲存，可注入失敗以利測試。
#[derive(Debug, Default)]
pub struct MemoryGateway {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let gateway = Self::default();
        gateway.entries.lock().insert(key.into(), value.into());
        gateway
    }

    /// Current stored value, bypassing the async interface.
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("reads disabled".into()));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("writes disabled".into()));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
