//! Durable string-keyed application cache backing the page store.
//! 頁面儲存所使用的應用程式快取。

mod app_cache;
mod gateway;

pub use app_cache::{AppCache, CacheError, CacheItem, CACHE_FILE};
