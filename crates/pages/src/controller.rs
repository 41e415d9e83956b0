use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PageStoreConfig;
use crate::gateway::PersistenceGateway;
use crate::save_queue::SaveQueue;
use crate::snapshot::PageStoreSnapshot;
use crate::tabs::{Tab, TabSession};
use crate::tree::{DropPosition, Page, PageDraft, PageKey, PageType, PageUpdate, TreeStore};

/// Owns the page forest and the tab session for one application session and keeps
/// them durable through a [`PersistenceGateway`].
///
/// Mutations apply synchronously and return whether anything changed; rejected
/// requests are logged and leave state untouched. Every accepted mutation queues a
/// save that never blocks the caller.
/// 管理頁面樹與分頁工作階段，並透過持久化介面保存；所有變動同步套用，儲存於背景進行。
#[derive(Debug)]
pub struct SessionController {
    tree: TreeStore,
    tabs: TabSession,
    config: PageStoreConfig,
    saves: SaveQueue,
}

impl SessionController {
    /// Loads persisted state and starts the background writer. Never fails: a missing,
    /// unreadable, or malformed payload starts an empty session.
    /// 載入已儲存的狀態並啟動背景寫入；資料缺失或損毀時以空白狀態開始。
    pub async fn load(gateway: Arc<dyn PersistenceGateway>, config: PageStoreConfig) -> Self {
        let snapshot = match gateway.get(&config.cache_key).await {
            Ok(Some(payload)) => match PageStoreSnapshot::from_json(&payload) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(key = %config.cache_key, error = %err, "failed to parse saved page store, starting empty");
                    PageStoreSnapshot::default()
                }
            },
            Ok(None) => {
                warn!(key = %config.cache_key, "no saved page store, starting empty");
                PageStoreSnapshot::default()
            }
            Err(err) => {
                warn!(key = %config.cache_key, error = %err, "failed to load page store, starting empty");
                PageStoreSnapshot::default()
            }
        };

        let tree = TreeStore::from_pages(snapshot.pages);
        let open_tabs = snapshot
            .open_tabs
            .into_iter()
            .filter(|tab| match tree.find_page(tab.key.as_str()) {
                Some(page) if !page.is_group() => true,
                _ => {
                    warn!(key = %tab.key, "dropping saved tab without a matching page");
                    false
                }
            })
            .collect();
        let tabs = TabSession::restore(open_tabs, snapshot.active_tab);
        info!(pages = tree.len(), tabs = tabs.len(), "page store loaded");
        let saves = SaveQueue::spawn(gateway, config.cache_key.clone());
        Self {
            tree,
            tabs,
            config,
            saves,
        }
    }

    pub fn config(&self) -> &PageStoreConfig {
        &self.config
    }

    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    pub fn tabs(&self) -> &TabSession {
        &self.tabs
    }

    pub fn pages(&self) -> &[Page] {
        self.tree.pages()
    }

    pub fn open_tabs(&self) -> &[Tab] {
        self.tabs.tabs()
    }

    pub fn active_tab(&self) -> Option<&PageKey> {
        self.tabs.active_tab()
    }

    pub fn find_page(&self, key: &str) -> Option<&Page> {
        self.tree.find_page(key)
    }

    /// Owned copy of the state exactly as it is persisted.
    pub fn snapshot(&self) -> PageStoreSnapshot {
        PageStoreSnapshot {
            pages: self.tree.pages().to_vec(),
            open_tabs: self.tabs.tabs().to_vec(),
            active_tab: self.tabs.active_tab().cloned(),
        }
    }

    /// Creates a page or group. Missing icons get the configured default.
    /// Returns `None` when the requested parent is missing or not a group.
    /// 建立頁面或群組；未指定圖示時套用預設值。
    pub fn add_item(&mut self, mut draft: PageDraft) -> Option<Page> {
        if draft.icon.is_none() {
            let icon = match draft.page_type {
                PageType::Page => &self.config.default_page_icon,
                PageType::Group => &self.config.default_group_icon,
            };
            draft.icon = Some(icon.clone());
        }
        match self.tree.add_item(draft) {
            Ok(page) => {
                debug!(key = %page.key(), kind = %page.page_type(), "page added");
                self.save();
                Some(page)
            }
            Err(err) => {
                warn!(error = %err, "add_item rejected");
                None
            }
        }
    }

    /// Merges `update` into a node; a new label is mirrored onto its open tab.
    /// 更新節點欄位；標籤變更時同步至已開啟的分頁。
    pub fn update_page(&mut self, key: &str, update: PageUpdate) -> bool {
        let label = update.label.clone();
        if let Err(err) = self.tree.update_page(key, update) {
            warn!(error = %err, "update_page rejected");
            return false;
        }
        if let Some(label) = label {
            if self.tabs.rename(key, &label) {
                debug!(key, "tab label synced");
            }
        }
        self.save();
        true
    }

    pub fn toggle_group(&mut self, key: &str) -> bool {
        match self.tree.toggle_group(key) {
            Ok(expanded) => {
                debug!(key, expanded, "group toggled");
                self.save();
                true
            }
            Err(err) => {
                warn!(error = %err, "toggle_group rejected");
                false
            }
        }
    }

    /// Reorders or reparents `source` relative to `target`.
    /// 依拖放位置移動節點。
    pub fn move_item(&mut self, source: &str, target: &str, position: DropPosition) -> bool {
        match self.tree.move_item(source, target, position) {
            Ok(()) => {
                debug!(source, target, %position, "page moved");
                self.save();
                true
            }
            Err(err) => {
                warn!(error = %err, "move_item rejected");
                false
            }
        }
    }

    /// Deletes a node with its subtree and closes the tab of every removed page.
    /// 刪除節點與其子樹，並關閉所有被移除頁面的分頁。
    pub fn delete_page(&mut self, key: &str) -> bool {
        match self.tree.delete_page(key) {
            Ok(removed) => {
                let closed = self.tabs.close_all(removed.iter());
                debug!(key, removed = removed.len(), closed, "page deleted");
                self.save();
                true
            }
            Err(err) => {
                warn!(error = %err, "delete_page rejected");
                false
            }
        }
    }

    /// Opens or focuses the tab for a leaf page.
    /// 開啟或切換至一般頁面的分頁。
    pub fn open_tab(&mut self, key: &str) -> bool {
        let page = match self.tree.find_page(key) {
            Some(page) if !page.is_group() => page,
            _ => {
                warn!(key, "cannot open tab: no such page or not a page");
                return false;
            }
        };
        self.tabs.open(&page.key, &page.label);
        debug!(key, "tab opened");
        self.save();
        true
    }

    pub fn close_tab(&mut self, key: &str) -> bool {
        if !self.tabs.close(key) {
            debug!(key, "close_tab ignored: tab not open");
            return false;
        }
        self.save();
        true
    }

    /// Queues the current snapshot for the background writer.
    pub fn save(&mut self) {
        match self.snapshot().to_json() {
            Ok(payload) => self.saves.enqueue(payload),
            Err(err) => warn!(error = %err, "failed to serialize page store"),
        }
    }

    /// Waits until every queued save has been attempted.
    pub async fn flush(&mut self) {
        self.saves.flush().await;
    }

    /// Flushes outstanding saves and stops the background writer.
    pub async fn shutdown(self) {
        self.saves.shutdown().await;
    }
}
