use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dbrun_pages::write_atomic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// File name of the cache inside its directory.
pub const CACHE_FILE: &str = "app_cache.json";

/// A stored value with its write timestamp.
/// 快取項目與寫入時間。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheItem {
    pub value: Value,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, CacheItem>,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("app cache IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid app cache file {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize app cache: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Single-file key/value cache. Clones share the same underlying store.
///
/// Every write rewrites the whole file atomically, so a crash never leaves a
/// half-written cache behind.
/// 單一檔案的鍵值快取；每次寫入皆以原子方式覆寫整個檔案。
#[derive(Debug, Clone)]
pub struct AppCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, CacheItem>>,
}

impl AppCache {
    /// Opens (or creates) the cache stored in `dir`.
    /// 開啟或建立位於指定資料夾的快取。
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(CACHE_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => {
                let file: CacheFile =
                    serde_json::from_str(&contents).map_err(|source| CacheError::Invalid {
                        path: path.clone(),
                        source,
                    })?;
                file.entries
            }
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(CacheError::Io(err)),
        };
        debug!(path = %path.display(), entries = entries.len(), "app cache opened");
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                entries: Mutex::new(entries),
            }),
        })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Stores `value` under `key` and persists immediately.
    /// 寫入鍵值並立即保存。
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), CacheError> {
        let item = CacheItem {
            value: value.into(),
            created_at: current_timestamp(),
        };
        let mut entries = self.inner.entries.lock();
        let previous = entries.insert(key.to_string(), item);
        if let Err(err) = self.persist(&entries) {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    /// Returns the value under `key` when it is a string.
    /// 取得字串型別的快取值。
    pub fn get(&self, key: &str) -> Option<String> {
        match self.inner.entries.lock().get(key)?.value {
            Value::String(ref text) => Some(text.clone()),
            _ => None,
        }
    }

    /// Returns the raw stored item.
    pub fn get_item(&self, key: &str) -> Option<CacheItem> {
        self.inner.entries.lock().get(key).cloned()
    }

    /// Removes `key`. Returns whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.inner.entries.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(false);
        };
        if let Err(err) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(true)
    }

    /// Drops every entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.inner.entries.lock();
        let previous = std::mem::take(&mut *entries);
        if let Err(err) = self.persist(&entries) {
            *entries = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.lock().keys().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.inner.entries.lock().len()
    }

    fn persist(&self, entries: &BTreeMap<String, CacheItem>) -> Result<(), CacheError> {
        #[derive(Serialize)]
        struct CacheFileRef<'a> {
            entries: &'a BTreeMap<String, CacheItem>,
        }
        let payload = serde_json::to_vec_pretty(&CacheFileRef { entries })
            .map_err(CacheError::Serialize)?;
        write_atomic(&self.inner.path, &payload)?;
        Ok(())
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn set_get_and_reopen() {
        let dir = tempdir().unwrap();
        let cache = AppCache::open(dir.path()).unwrap();
        cache.set("pageStore", "{\"pages\":[]}").unwrap();
        cache.set("count", 3).unwrap();
        assert_eq!(cache.get("pageStore").as_deref(), Some("{\"pages\":[]}"));
        assert_eq!(cache.get("count"), None);
        assert_eq!(cache.get_item("count").unwrap().value, json!(3));
        assert!(cache.get_item("count").unwrap().created_at > 0);

        let reopened = AppCache::open(dir.path()).unwrap();
        assert_eq!(reopened.keys(), vec!["count".to_string(), "pageStore".to_string()]);
        assert_eq!(reopened.get("pageStore").as_deref(), Some("{\"pages\":[]}"));
    }

    #[test]
    fn delete_and_clear() {
        let dir = tempdir().unwrap();
        let cache = AppCache::open(dir.path()).unwrap();
        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();
        assert!(cache.delete("a").unwrap());
        assert!(!cache.delete("a").unwrap());
        assert!(!cache.exists("a"));
        assert_eq!(cache.size(), 1);
        cache.clear().unwrap();
        assert_eq!(cache.size(), 0);
        assert_eq!(AppCache::open(dir.path()).unwrap().size(), 0);
    }

    #[test]
    fn clones_share_state() {
        let dir = tempdir().unwrap();
        let cache = AppCache::open(dir.path()).unwrap();
        let other = cache.clone();
        other.set("shared", "yes").unwrap();
        assert!(cache.exists("shared"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CACHE_FILE), "{{{").unwrap();
        assert!(matches!(
            AppCache::open(dir.path()),
            Err(CacheError::Invalid { .. })
        ));
    }
}
