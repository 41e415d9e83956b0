//! Page tree, open-tab session, and their persistence for dbrun.
//! 管理 dbrun 頁面樹、已開啟分頁與其持久化的核心模組。

mod util;

pub mod config;
pub mod controller;
pub mod gateway;
pub mod save_queue;
pub mod snapshot;
pub mod tabs;
pub mod tree;

pub use config::{ConfigError, PageStoreConfig};
pub use controller::SessionController;
pub use gateway::{GatewayError, MemoryGateway, PersistenceGateway};
pub use save_queue::SaveQueue;
pub use snapshot::{PageStoreSnapshot, SnapshotError};
pub use tabs::{Tab, TabSession};
pub use tree::{
    DropPosition, Page, PageDraft, PageKey, PageKind, PageType, PageUpdate, ParentInfo, TreeError,
    TreeStore,
};
pub use util::write_atomic;
