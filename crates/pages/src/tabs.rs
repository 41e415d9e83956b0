use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tree::PageKey;

/// An open tab referencing a leaf page.
/// 指向一般頁面的已開啟分頁。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub key: PageKey,
    #[serde(default, deserialize_with = "crate::snapshot::null_as_empty")]
    pub label: String,
    #[serde(default)]
    pub active: bool,
}

/// Ordered open tabs plus the single active-tab pointer.
///
/// `active_tab` is `None` exactly when no tab is open; otherwise exactly one tab
/// carries `active == true` and its key equals `active_tab`.
/// 已開啟分頁的有序清單與唯一的作用中分頁指標。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSession {
    tabs: Vec<Tab>,
    active_tab: Option<PageKey>,
}

impl TabSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a session from persisted parts, repairing anything that breaks the
    /// active-tab invariant: duplicate keys are dropped, a dangling `active_tab`
    /// falls back to the first tab, and `active` flags are rewritten.
    /// 從儲存的資料重建工作階段，並修正違反作用中分頁規則的部分。
    pub fn restore(tabs: Vec<Tab>, active_tab: Option<PageKey>) -> Self {
        let mut unique: Vec<Tab> = Vec::with_capacity(tabs.len());
        for tab in tabs {
            if unique.iter().any(|existing| existing.key == tab.key) {
                warn!(key = %tab.key, "dropping duplicate persisted tab");
                continue;
            }
            unique.push(tab);
        }

        let active_tab = match active_tab {
            Some(key) if unique.iter().any(|tab| tab.key == key) => Some(key),
            Some(key) => {
                warn!(key = %key, "persisted active tab is not open, falling back to the first tab");
                unique.first().map(|tab| tab.key.clone())
            }
            None => unique.first().map(|tab| tab.key.clone()),
        };

        let mut session = Self {
            tabs: unique,
            active_tab,
        };
        session.sync_flags();
        session
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_tab(&self) -> Option<&PageKey> {
        self.active_tab.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.key.as_str() == key)
    }

    /// Opens (or re-focuses) the tab for `key`. New tabs go to the end with a label snapshot;
    /// an existing tab keeps its position.
    /// 開啟或切換至指定分頁；新分頁附加於尾端，既有分頁維持原位。
    pub fn open(&mut self, key: &PageKey, label: &str) {
        if !self.is_open(key.as_str()) {
            self.tabs.push(Tab {
                key: key.clone(),
                label: label.to_string(),
                active: false,
            });
        }
        self.active_tab = Some(key.clone());
        self.sync_flags();
    }

    /// Closes the tab for `key`. Returns `false` when no such tab was open.
    ///
    /// When the closed tab was active, focus moves to the tab now occupying the same
    /// index, else the one before it, else the first tab.
    /// 關閉分頁；若關閉的是作用中分頁，焦點移至同位置的分頁，否則前一個，否則第一個。
    pub fn close(&mut self, key: &str) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        self.tabs.remove(index);

        if self.tabs.is_empty() {
            self.active_tab = None;
            return true;
        }
        let was_active = self
            .active_tab
            .as_ref()
            .map_or(false, |active| active.as_str() == key);
        if was_active {
            let next = if index < self.tabs.len() {
                index
            } else if index > 0 {
                index - 1
            } else {
                0
            };
            self.active_tab = Some(self.tabs[next].key.clone());
            self.sync_flags();
        }
        true
    }

    /// Closes every listed tab using the [`close`](Self::close) rule. Returns how many were open.
    pub fn close_all<'a, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a PageKey>,
    {
        keys.into_iter()
            .filter(|key| self.close(key.as_str()))
            .count()
    }

    /// Overwrites the label of an open tab without touching order or focus.
    /// 更新已開啟分頁的標籤，不影響順序與焦點。
    pub fn rename(&mut self, key: &str, label: &str) -> bool {
        match self.tabs.iter_mut().find(|tab| tab.key.as_str() == key) {
            Some(tab) => {
                tab.label = label.to_string();
                true
            }
            None => false,
        }
    }

    /// Checks the active-tab invariant.
    pub fn is_consistent(&self) -> bool {
        match &self.active_tab {
            None => self.tabs.is_empty(),
            Some(active) => {
                let flagged: Vec<&Tab> = self.tabs.iter().filter(|tab| tab.active).collect();
                flagged.len() == 1 && flagged[0].key == *active
            }
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.key.as_str() == key)
    }

    fn sync_flags(&mut self) {
        let active = self.active_tab.clone();
        for tab in &mut self.tabs {
            tab.active = active.as_ref() == Some(&tab.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(session: &TabSession) -> Vec<&str> {
        session.tabs().iter().map(|tab| tab.key.as_str()).collect()
    }

    fn session_with(keys: &[&str]) -> TabSession {
        let mut session = TabSession::new();
        for key in keys {
            session.open(&PageKey::from(*key), &key.to_uppercase());
        }
        session
    }

    #[test]
    fn reopening_focuses_without_duplicating() {
        let mut session = session_with(&["p1", "p2"]);
        session.open(&PageKey::from("p1"), "ignored");
        assert_eq!(keys(&session), vec!["p1", "p2"]);
        assert_eq!(session.active_tab().map(PageKey::as_str), Some("p1"));
        assert_eq!(session.get("p1").unwrap().label, "P1");
        assert!(session.is_consistent());
    }

    #[test]
    fn closing_active_middle_tab_focuses_next() {
        let mut session = session_with(&["a", "b", "c"]);
        session.open(&PageKey::from("b"), "B");
        assert!(session.close("b"));
        assert_eq!(keys(&session), vec!["a", "c"]);
        assert_eq!(session.active_tab().map(PageKey::as_str), Some("c"));
        assert!(session.is_consistent());
    }

    #[test]
    fn closing_active_last_tab_focuses_previous() {
        let mut session = session_with(&["a", "b", "c"]);
        assert!(session.close("c"));
        assert_eq!(session.active_tab().map(PageKey::as_str), Some("b"));
        assert!(session.is_consistent());
    }

    #[test]
    fn closing_inactive_tab_keeps_focus() {
        let mut session = session_with(&["a", "b", "c"]);
        assert!(session.close("a"));
        assert_eq!(session.active_tab().map(PageKey::as_str), Some("c"));
        assert!(session.is_consistent());
    }

    #[test]
    fn closing_last_remaining_tab_clears_focus() {
        let mut session = session_with(&["a"]);
        assert!(session.close("a"));
        assert!(session.is_empty());
        assert_eq!(session.active_tab(), None);
        assert!(session.is_consistent());
        assert!(!session.close("a"));
    }

    #[test]
    fn rename_only_touches_label() {
        let mut session = session_with(&["a", "b"]);
        assert!(session.rename("a", "Alpha"));
        assert!(!session.rename("zzz", "nope"));
        assert_eq!(session.get("a").unwrap().label, "Alpha");
        assert!(!session.get("a").unwrap().active);
        assert_eq!(keys(&session), vec!["a", "b"]);
    }

    #[test]
    fn close_all_counts_open_tabs_only() {
        let mut session = session_with(&["a", "b", "c"]);
        let closing = [PageKey::from("a"), PageKey::from("x"), PageKey::from("c")];
        assert_eq!(session.close_all(closing.iter()), 2);
        assert_eq!(keys(&session), vec!["b"]);
        assert_eq!(session.active_tab().map(PageKey::as_str), Some("b"));
    }

    #[test]
    fn restore_repairs_inconsistent_payloads() {
        let tab = |key: &str, active: bool| Tab {
            key: PageKey::from(key),
            label: key.to_string(),
            active,
        };
        let session = TabSession::restore(
            vec![tab("a", true), tab("b", true), tab("a", false)],
            Some(PageKey::from("gone")),
        );
        assert_eq!(keys(&session), vec!["a", "b"]);
        assert_eq!(session.active_tab().map(PageKey::as_str), Some("a"));
        assert!(session.is_consistent());

        let empty = TabSession::restore(Vec::new(), Some(PageKey::from("gone")));
        assert_eq!(empty.active_tab(), None);
        assert!(empty.is_consistent());
    }
}
