use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::write_atomic;

pub const DEFAULT_CACHE_KEY: &str = "pageStore";
pub const DEFAULT_PAGE_ICON: &str = "pi pi-file";
pub const DEFAULT_GROUP_ICON: &str = "pi pi-folder";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read page store config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse page store config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize page store config {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write page store config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings for the page store: where the payload lives and which icons new nodes get.
/// 頁面儲存設定：快取鍵與新節點的預設圖示。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStoreConfig {
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    #[serde(default = "default_page_icon")]
    pub default_page_icon: String,
    #[serde(default = "default_group_icon")]
    pub default_group_icon: String,
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}

fn default_page_icon() -> String {
    DEFAULT_PAGE_ICON.to_string()
}

fn default_group_icon() -> String {
    DEFAULT_GROUP_ICON.to_string()
}

impl Default for PageStoreConfig {
    fn default() -> Self {
        Self {
            cache_key: default_cache_key(),
            default_page_icon: default_page_icon(),
            default_group_icon: default_group_icon(),
        }
    }
}

impl PageStoreConfig {
    pub fn sanitize(&mut self) {
        if self.cache_key.trim().is_empty() {
            self.cache_key = default_cache_key();
        }
        if self.default_page_icon.trim().is_empty() {
            self.default_page_icon = default_page_icon();
        }
        if self.default_group_icon.trim().is_empty() {
            self.default_group_icon = default_group_icon();
        }
    }

    /// Loads the config, returning defaults when the file does not exist.
    /// 載入設定；檔案不存在時回傳預設值。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config: PageStoreConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.sanitize();
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let payload =
            serde_json::to_vec_pretty(self).map_err(|source| ConfigError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        write_atomic(path, &payload).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
