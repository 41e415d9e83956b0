use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Globally unique identifier of a page or group.
/// 頁面或群組的全域唯一識別碼。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(String);

impl PageKey {
    /// Generates a random UUID-v4 shaped key (`xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx`).
    /// 產生 UUID v4 格式的隨機鍵值。
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PageKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PageKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Persisted `type` tag of a node.
/// 節點的類型標記。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Page,
    Group,
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageType::Page => f.write_str("page"),
            PageType::Group => f.write_str("group"),
        }
    }
}

/// Type-specific payload. Only groups own children and an expand state.
/// 依類型區分的內容；僅群組擁有子節點與展開狀態。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageKind {
    Page,
    Group {
        expanded: bool,
        children: Vec<Page>,
    },
}

/// A node in the page forest.
/// 頁面樹中的節點。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub(crate) key: PageKey,
    pub(crate) label: String,
    pub(crate) icon: Option<String>,
    pub(crate) kind: PageKind,
}

impl Page {
    /// Builds a leaf page.
    /// 建立一般頁面節點。
    pub fn page(key: impl Into<PageKey>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            icon: None,
            kind: PageKind::Page,
        }
    }

    /// Builds an expanded group holding `children`.
    /// 建立包含子節點且預設展開的群組。
    pub fn group(key: impl Into<PageKey>, label: impl Into<String>, children: Vec<Page>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            icon: None,
            kind: PageKind::Group {
                expanded: true,
                children,
            },
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the expand state; ignored for leaf pages.
    pub fn with_expanded(mut self, value: bool) -> Self {
        if let PageKind::Group { expanded, .. } = &mut self.kind {
            *expanded = value;
        }
        self
    }

    pub fn key(&self) -> &PageKey {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn kind(&self) -> &PageKind {
        &self.kind
    }

    pub fn page_type(&self) -> PageType {
        match self.kind {
            PageKind::Page => PageType::Page,
            PageKind::Group { .. } => PageType::Group,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, PageKind::Group { .. })
    }

    /// Expand state for groups, `None` for leaf pages.
    /// 群組的展開狀態；一般頁面回傳 `None`。
    pub fn expanded(&self) -> Option<bool> {
        match self.kind {
            PageKind::Group { expanded, .. } => Some(expanded),
            PageKind::Page => None,
        }
    }

    /// Ordered children; always empty for leaf pages.
    /// 依序排列的子節點；一般頁面永遠為空。
    pub fn children(&self) -> &[Page] {
        match &self.kind {
            PageKind::Group { children, .. } => children,
            PageKind::Page => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Page>> {
        match &mut self.kind {
            PageKind::Group { children, .. } => Some(children),
            PageKind::Page => None,
        }
    }
}

/// Request to create a node through [`TreeStore::add_item`].
/// 透過 [`TreeStore::add_item`] 建立節點的草稿。
#[derive(Debug, Clone)]
pub struct PageDraft {
    pub label: String,
    pub page_type: PageType,
    pub icon: Option<String>,
    pub parent: Option<PageKey>,
}

impl PageDraft {
    pub fn new(label: impl Into<String>, page_type: PageType) -> Self {
        Self {
            label: label.into(),
            page_type,
            icon: None,
            parent: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Places the new node at the end of `parent`'s children instead of the root forest.
    /// 將新節點附加至指定群組而非根層。
    pub fn under(mut self, parent: impl Into<PageKey>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    fn build(label: String, page_type: PageType, icon: Option<String>, key: PageKey) -> Page {
        let kind = match page_type {
            PageType::Page => PageKind::Page,
            PageType::Group => PageKind::Group {
                expanded: true,
                children: Vec::new(),
            },
        };
        Page {
            key,
            label,
            icon,
            kind,
        }
    }
}

/// Partial update merged into an existing node. `None` fields are left alone.
/// 套用至既有節點的部分更新；`None` 欄位保持不變。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUpdate {
    pub label: Option<String>,
    pub icon: Option<String>,
    pub expanded: Option<bool>,
}

impl PageUpdate {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn icon(icon: impl Into<String>) -> Self {
        Self {
            icon: Some(icon.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.icon.is_none() && self.expanded.is_none()
    }
}

/// Where a moved node lands relative to its target.
/// 拖放時相對於目標節點的位置。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    Before,
    After,
    Inside,
}

impl fmt::Display for DropPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropPosition::Before => f.write_str("before"),
            DropPosition::After => f.write_str("after"),
            DropPosition::Inside => f.write_str("inside"),
        }
    }
}

/// Location of a node inside its owning sibling list. `parent_key` is `None` at the root.
/// 節點於兄弟清單中的位置；根層的 `parent_key` 為 `None`。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentInfo {
    pub parent_key: Option<PageKey>,
    pub index: usize,
}

/// Reasons a structural request was rejected. The forest is unchanged whenever one is returned.
/// 結構操作遭拒的原因；回傳錯誤時樹狀結構保持不變。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("page {0} not found")]
    NotFound(PageKey),
    #[error("page {0} cannot accept children")]
    InvalidParent(PageKey),
    #[error("page {0} is not a group")]
    NotAGroup(PageKey),
    #[error("cannot move {moved} into its own descendant {target}")]
    Cycle { moved: PageKey, target: PageKey },
    #[error("cannot move page {0} relative to itself")]
    SameNode(PageKey),
}

/// Owns the page forest and a key → parent index kept in sync with every mutation.
/// 擁有頁面樹，並維護與每次變動同步的「鍵值 → 父節點」索引。
#[derive(Debug, Clone, Default)]
pub struct TreeStore {
    roots: Vec<Page>,
    parents: HashMap<PageKey, Option<PageKey>>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts an existing forest, rebuilding the parent index.
    /// Keys that repeat an earlier key are replaced with fresh ones.
    /// 採用既有的頁面樹並重建索引；重複的鍵值會換成新鍵值。
    pub fn from_pages(pages: Vec<Page>) -> Self {
        let mut store = Self::default();
        let mut roots = pages;
        for page in &mut roots {
            store.index_subtree(page, None);
        }
        store.roots = roots;
        store
    }

    /// Root-level nodes in display order.
    /// 依顯示順序排列的根層節點。
    pub fn pages(&self) -> &[Page] {
        &self.roots
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.roots
    }

    /// Number of nodes in the whole forest.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parents.contains_key(key)
    }

    /// Every key in depth-first order.
    /// 以深度優先順序列出所有鍵值。
    pub fn keys(&self) -> Vec<PageKey> {
        fn collect(pages: &[Page], out: &mut Vec<PageKey>) {
            for page in pages {
                out.push(page.key.clone());
                collect(page.children(), out);
            }
        }
        let mut out = Vec::with_capacity(self.parents.len());
        collect(&self.roots, &mut out);
        out
    }

    /// Looks up a node by key.
    /// 依鍵值尋找節點。
    pub fn find_page(&self, key: &str) -> Option<&Page> {
        let path = self.ancestry(key)?;
        let mut level: &[Page] = &self.roots;
        let mut found = None;
        for step in path {
            let node = level.iter().find(|page| page.key == *step)?;
            level = node.children();
            found = Some(node);
        }
        found
    }

    /// Locates the sibling list owning `key` and its position in it.
    /// 找出包含指定節點的兄弟清單及其索引。
    pub fn find_parent_info(&self, key: &str) -> Option<ParentInfo> {
        let parent_key = self.parents.get(key)?.clone();
        let siblings = match &parent_key {
            None => &self.roots[..],
            Some(parent) => self.find_page(parent.as_str())?.children(),
        };
        let index = siblings.iter().position(|page| page.key.as_str() == key)?;
        Some(ParentInfo { parent_key, index })
    }

    /// Returns `true` when `candidate` sits somewhere below `ancestor`. A node is never its own descendant.
    /// 若 `candidate` 位於 `ancestor` 之下則回傳 `true`；節點不是自身的後代。
    pub fn is_descendant(&self, ancestor: &str, candidate: &str) -> bool {
        if !self.parents.contains_key(ancestor) {
            return false;
        }
        let mut current = match self.parents.get(candidate) {
            Some(parent) => parent.as_ref(),
            None => return false,
        };
        let mut hops = 0;
        while let Some(key) = current {
            if key.as_str() == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.parents.len() {
                break;
            }
            current = self.parents.get(key.as_str()).and_then(Option::as_ref);
        }
        false
    }

    /// Creates a node under the draft's parent (or at the root) and returns a copy of it.
    /// 於草稿指定的父群組（或根層）建立節點並回傳其副本。
    pub fn add_item(&mut self, draft: PageDraft) -> Result<Page, TreeError> {
        let PageDraft {
            label,
            page_type,
            icon,
            parent,
        } = draft;
        if let Some(parent_key) = &parent {
            match self.find_page(parent_key.as_str()) {
                None => return Err(TreeError::NotFound(parent_key.clone())),
                Some(node) if !node.is_group() => {
                    return Err(TreeError::InvalidParent(parent_key.clone()))
                }
                Some(_) => {}
            }
        }

        let key = self.fresh_key();
        let page = PageDraft::build(label, page_type, icon, key.clone());
        let created = page.clone();
        let siblings = self
            .siblings_mut(parent.as_ref().map(PageKey::as_str))
            .ok_or_else(|| TreeError::NotFound(key.clone()))?;
        siblings.push(page);
        self.parents.insert(key, parent);
        Ok(created)
    }

    /// Merges `update` into the node at `key`. `expanded` only applies to groups.
    /// 將更新合併至指定節點；`expanded` 僅對群組生效。
    pub fn update_page(&mut self, key: &str, update: PageUpdate) -> Result<(), TreeError> {
        let page = self
            .find_page_mut(key)
            .ok_or_else(|| TreeError::NotFound(key.into()))?;
        if let Some(label) = update.label {
            page.label = label;
        }
        if let Some(icon) = update.icon {
            page.icon = Some(icon);
        }
        if let (Some(value), PageKind::Group { expanded, .. }) = (update.expanded, &mut page.kind) {
            *expanded = value;
        }
        Ok(())
    }

    /// Flips a group's expand state and returns the new value.
    /// 切換群組展開狀態並回傳新值。
    pub fn toggle_group(&mut self, key: &str) -> Result<bool, TreeError> {
        let page = self
            .find_page_mut(key)
            .ok_or_else(|| TreeError::NotFound(key.into()))?;
        match &mut page.kind {
            PageKind::Group { expanded, .. } => {
                *expanded = !*expanded;
                Ok(*expanded)
            }
            PageKind::Page => Err(TreeError::NotAGroup(key.into())),
        }
    }

    /// Moves `source` before/after `target` or appends it inside the `target` group.
    /// Works within one level and across levels. Rejected moves leave the forest untouched.
    /// 將 `source` 移到 `target` 之前、之後或放入 `target` 群組；支援同層與跨層移動，
    /// 遭拒時樹狀結構不變。
    pub fn move_item(
        &mut self,
        source: &str,
        target: &str,
        position: DropPosition,
    ) -> Result<(), TreeError> {
        if source == target {
            return Err(TreeError::SameNode(source.into()));
        }
        let source_info = self
            .find_parent_info(source)
            .ok_or_else(|| TreeError::NotFound(source.into()))?;
        let target_info = self
            .find_parent_info(target)
            .ok_or_else(|| TreeError::NotFound(target.into()))?;
        // Any landing spot under the source itself would detach the subtree into a cycle.
        if self.is_descendant(source, target) {
            return Err(TreeError::Cycle {
                moved: source.into(),
                target: target.into(),
            });
        }

        let moved = self
            .siblings_mut(source_info.parent_key.as_ref().map(PageKey::as_str))
            .ok_or_else(|| TreeError::NotFound(source.into()))?
            .remove(source_info.index);
        let moved_key = moved.key.clone();

        if position == DropPosition::Inside {
            if let Some(children) = self.find_page_mut(target).and_then(Page::children_mut) {
                children.push(moved);
                self.parents.insert(moved_key, Some(target.into()));
                return Ok(());
            }
            self.reinsert(&source_info, moved);
            return Err(TreeError::NotAGroup(target.into()));
        }

        let mut target_index = target_info.index;
        if source_info.parent_key == target_info.parent_key && source_info.index < target_index {
            target_index -= 1;
        }
        let insert_at = match position {
            DropPosition::Before => target_index,
            _ => target_index + 1,
        };

        let target_parent = target_info.parent_key.as_ref().map(PageKey::as_str);
        if let Some(siblings) = self.siblings_mut(target_parent) {
            let insert_at = insert_at.min(siblings.len());
            siblings.insert(insert_at, moved);
            self.parents.insert(moved_key, target_info.parent_key);
            return Ok(());
        }
        self.reinsert(&source_info, moved);
        Err(TreeError::NotFound(target.into()))
    }

    /// Removes the node and its whole subtree, returning the keys of removed leaf pages.
    /// 移除節點及其整個子樹，並回傳被移除的一般頁面鍵值。
    pub fn delete_page(&mut self, key: &str) -> Result<Vec<PageKey>, TreeError> {
        let info = self
            .find_parent_info(key)
            .ok_or_else(|| TreeError::NotFound(key.into()))?;
        let removed = self
            .siblings_mut(info.parent_key.as_ref().map(PageKey::as_str))
            .ok_or_else(|| TreeError::NotFound(key.into()))?
            .remove(info.index);
        let mut leaves = Vec::new();
        self.forget_subtree(&removed, &mut leaves);
        Ok(leaves)
    }

    fn fresh_key(&self) -> PageKey {
        loop {
            let key = PageKey::generate();
            if !self.parents.contains_key(key.as_str()) {
                return key;
            }
        }
    }

    /// Root-to-node key chain resolved through the parent index.
    fn ancestry(&self, key: &str) -> Option<Vec<&PageKey>> {
        let (mut current, _) = self.parents.get_key_value(key)?;
        let mut chain = vec![current];
        while let Some(parent) = self.parents.get(current.as_str())? {
            if chain.len() > self.parents.len() {
                return None;
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Some(chain)
    }

    fn find_page_mut(&mut self, key: &str) -> Option<&mut Page> {
        let path: Vec<PageKey> = self.ancestry(key)?.into_iter().cloned().collect();
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.iter_mut().find(|page| page.key == *first)?;
        for step in rest {
            node = node
                .children_mut()?
                .iter_mut()
                .find(|page| page.key == *step)?;
        }
        Some(node)
    }

    fn siblings_mut(&mut self, parent: Option<&str>) -> Option<&mut Vec<Page>> {
        match parent {
            None => Some(&mut self.roots),
            Some(key) => self.find_page_mut(key)?.children_mut(),
        }
    }

    /// Puts a removed node back where it came from.
    fn reinsert(&mut self, info: &ParentInfo, page: Page) {
        let parent = info.parent_key.as_ref().map(PageKey::as_str);
        if let Some(siblings) = self.siblings_mut(parent) {
            let index = info.index.min(siblings.len());
            siblings.insert(index, page);
            return;
        }
        warn!(key = %page.key, "previous parent vanished, restoring page at the root");
        self.parents.insert(page.key.clone(), None);
        self.roots.push(page);
    }

    fn index_subtree(&mut self, page: &mut Page, parent: Option<&PageKey>) {
        if self.parents.contains_key(page.key.as_str()) {
            let replacement = self.fresh_key();
            warn!(duplicate = %page.key, replacement = %replacement, "re-keying duplicate page");
            page.key = replacement;
        }
        self.parents.insert(page.key.clone(), parent.cloned());
        let key = page.key.clone();
        if let Some(children) = page.children_mut() {
            for child in children {
                self.index_subtree(child, Some(&key));
            }
        }
    }

    fn forget_subtree(&mut self, page: &Page, leaves: &mut Vec<PageKey>) {
        self.parents.remove(page.key.as_str());
        if !page.is_group() {
            leaves.push(page.key.clone());
        }
        for child in page.children() {
            self.forget_subtree(child, leaves);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_index_consistent(store: &TreeStore) {
        fn walk(pages: &[Page], parent: Option<&PageKey>, store: &TreeStore, seen: &mut usize) {
            for page in pages {
                *seen += 1;
                assert_eq!(
                    store.parents.get(page.key.as_str()),
                    Some(&parent.cloned()),
                    "index entry for {}",
                    page.key
                );
                walk(page.children(), Some(&page.key), store, seen);
            }
        }
        let mut seen = 0;
        walk(&store.roots, None, store, &mut seen);
        assert_eq!(seen, store.parents.len());
    }

    fn labels(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(Page::label).collect()
    }

    /// G1 [P1], P2 at the root.
    fn sample() -> (TreeStore, Page, Page, Page) {
        let mut store = TreeStore::new();
        let g1 = store
            .add_item(PageDraft::new("G1", PageType::Group))
            .unwrap();
        let p1 = store
            .add_item(PageDraft::new("P1", PageType::Page).under(g1.key().clone()))
            .unwrap();
        let p2 = store.add_item(PageDraft::new("P2", PageType::Page)).unwrap();
        (store, g1, p1, p2)
    }

    #[test]
    fn generated_keys_follow_uuid_v4_layout() {
        let key = PageKey::generate();
        let text = key.as_str();
        assert_eq!(text.len(), 36);
        let bytes = text.as_bytes();
        for dash in [8, 13, 18, 23] {
            assert_eq!(bytes[dash], b'-');
        }
        assert_eq!(bytes[14], b'4');
        assert!(matches!(bytes[19], b'8' | b'9' | b'a' | b'b'));
        assert!(text
            .chars()
            .filter(|c| *c != '-')
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn add_item_applies_type_defaults() {
        let (store, g1, p1, p2) = sample();
        assert_eq!(g1.expanded(), Some(true));
        assert!(g1.children().is_empty());
        assert_eq!(p1.expanded(), None);
        assert_eq!(labels(store.pages()), vec!["G1", "P2"]);
        assert_eq!(labels(store.find_page(g1.key().as_str()).unwrap().children()), vec!["P1"]);
        assert_eq!(store.len(), 3);
        assert!(store.contains(p2.key().as_str()));
        assert_index_consistent(&store);
    }

    #[test]
    fn add_item_rejects_missing_or_leaf_parent() {
        let (mut store, _, p1, _) = sample();
        let err = store
            .add_item(PageDraft::new("X", PageType::Page).under("nope"))
            .unwrap_err();
        assert_eq!(err, TreeError::NotFound("nope".into()));
        let err = store
            .add_item(PageDraft::new("X", PageType::Page).under(p1.key().clone()))
            .unwrap_err();
        assert_eq!(err, TreeError::InvalidParent(p1.key().clone()));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn find_parent_info_distinguishes_root_and_nested() {
        let (store, g1, p1, p2) = sample();
        assert_eq!(
            store.find_parent_info(p2.key().as_str()),
            Some(ParentInfo {
                parent_key: None,
                index: 1
            })
        );
        assert_eq!(
            store.find_parent_info(p1.key().as_str()),
            Some(ParentInfo {
                parent_key: Some(g1.key().clone()),
                index: 0
            })
        );
        assert_eq!(store.find_parent_info("missing"), None);
    }

    #[test]
    fn is_descendant_excludes_self() {
        let (store, g1, p1, p2) = sample();
        assert!(store.is_descendant(g1.key().as_str(), p1.key().as_str()));
        assert!(!store.is_descendant(p1.key().as_str(), g1.key().as_str()));
        assert!(!store.is_descendant(g1.key().as_str(), g1.key().as_str()));
        assert!(!store.is_descendant(g1.key().as_str(), p2.key().as_str()));
        assert!(!store.is_descendant("missing", p1.key().as_str()));
    }

    #[test]
    fn move_inside_then_reorder_within_group() {
        let (mut store, g1, p1, p2) = sample();
        store
            .move_item(p2.key().as_str(), g1.key().as_str(), DropPosition::Inside)
            .unwrap();
        assert_eq!(labels(store.pages()), vec!["G1"]);
        let group = store.find_page(g1.key().as_str()).unwrap();
        assert_eq!(labels(group.children()), vec!["P1", "P2"]);

        store
            .move_item(p1.key().as_str(), p2.key().as_str(), DropPosition::After)
            .unwrap();
        let group = store.find_page(g1.key().as_str()).unwrap();
        assert_eq!(labels(group.children()), vec!["P2", "P1"]);
        assert_index_consistent(&store);
    }

    #[test]
    fn move_before_adjusts_for_removal_shift() {
        let mut store = TreeStore::new();
        let keys: Vec<PageKey> = ["A", "B", "C", "D"]
            .iter()
            .map(|label| {
                store
                    .add_item(PageDraft::new(*label, PageType::Page))
                    .unwrap()
                    .key()
                    .clone()
            })
            .collect();
        store
            .move_item(keys[0].as_str(), keys[2].as_str(), DropPosition::Before)
            .unwrap();
        assert_eq!(labels(store.pages()), vec!["B", "A", "C", "D"]);
        store
            .move_item(keys[3].as_str(), keys[1].as_str(), DropPosition::Before)
            .unwrap();
        assert_eq!(labels(store.pages()), vec!["D", "B", "A", "C"]);
        store
            .move_item(keys[3].as_str(), keys[2].as_str(), DropPosition::After)
            .unwrap();
        assert_eq!(labels(store.pages()), vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn move_across_levels_updates_parent_index() {
        let (mut store, g1, p1, p2) = sample();
        store
            .move_item(p1.key().as_str(), p2.key().as_str(), DropPosition::After)
            .unwrap();
        assert_eq!(labels(store.pages()), vec!["G1", "P2", "P1"]);
        assert!(store.find_page(g1.key().as_str()).unwrap().children().is_empty());
        assert_eq!(
            store.find_parent_info(p1.key().as_str()).unwrap().parent_key,
            None
        );
        assert_index_consistent(&store);
    }

    #[test]
    fn inside_a_leaf_page_rolls_back() {
        let (mut store, _, p1, p2) = sample();
        let before = store.pages().to_vec();
        let err = store
            .move_item(p2.key().as_str(), p1.key().as_str(), DropPosition::Inside)
            .unwrap_err();
        assert_eq!(err, TreeError::NotAGroup(p1.key().clone()));
        assert_eq!(store.pages(), &before[..]);
        assert_index_consistent(&store);
    }

    #[test]
    fn moves_into_own_subtree_are_rejected() {
        let mut store = TreeStore::new();
        let outer = store
            .add_item(PageDraft::new("outer", PageType::Group))
            .unwrap();
        let inner = store
            .add_item(PageDraft::new("inner", PageType::Group).under(outer.key().clone()))
            .unwrap();
        let leaf = store
            .add_item(PageDraft::new("leaf", PageType::Page).under(inner.key().clone()))
            .unwrap();
        let before = store.pages().to_vec();

        for position in [DropPosition::Inside, DropPosition::Before, DropPosition::After] {
            let err = store
                .move_item(outer.key().as_str(), inner.key().as_str(), position)
                .unwrap_err();
            assert!(matches!(err, TreeError::Cycle { .. }));
            let err = store
                .move_item(outer.key().as_str(), leaf.key().as_str(), position)
                .unwrap_err();
            assert!(matches!(err, TreeError::Cycle { .. }));
        }
        assert_eq!(store.pages(), &before[..]);
    }

    #[test]
    fn self_move_is_rejected_without_change() {
        let (mut store, g1, _, _) = sample();
        let before = store.pages().to_vec();
        for position in [DropPosition::Inside, DropPosition::Before, DropPosition::After] {
            assert_eq!(
                store.move_item(g1.key().as_str(), g1.key().as_str(), position),
                Err(TreeError::SameNode(g1.key().clone()))
            );
        }
        assert_eq!(store.pages(), &before[..]);
    }

    #[test]
    fn update_merges_fields_and_ignores_expanded_on_pages() {
        let (mut store, g1, p1, _) = sample();
        store
            .update_page(
                p1.key().as_str(),
                PageUpdate {
                    label: Some("Renamed".into()),
                    icon: Some("pi pi-star".into()),
                    expanded: Some(false),
                },
            )
            .unwrap();
        let page = store.find_page(p1.key().as_str()).unwrap();
        assert_eq!(page.label(), "Renamed");
        assert_eq!(page.icon(), Some("pi pi-star"));
        assert_eq!(page.expanded(), None);

        store
            .update_page(
                g1.key().as_str(),
                PageUpdate {
                    expanded: Some(false),
                    ..PageUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(store.find_page(g1.key().as_str()).unwrap().expanded(), Some(false));
        assert_eq!(
            store.update_page("missing", PageUpdate::label("x")),
            Err(TreeError::NotFound("missing".into()))
        );
    }

    #[test]
    fn toggle_only_flips_groups() {
        let (mut store, g1, p1, _) = sample();
        assert_eq!(store.toggle_group(g1.key().as_str()), Ok(false));
        assert_eq!(store.toggle_group(g1.key().as_str()), Ok(true));
        assert_eq!(
            store.toggle_group(p1.key().as_str()),
            Err(TreeError::NotAGroup(p1.key().clone()))
        );
    }

    #[test]
    fn delete_group_removes_subtree_and_reports_leaves() {
        let (mut store, g1, p1, p2) = sample();
        let nested = store
            .add_item(PageDraft::new("Nested", PageType::Group).under(g1.key().clone()))
            .unwrap();
        let deep = store
            .add_item(PageDraft::new("Deep", PageType::Page).under(nested.key().clone()))
            .unwrap();

        let leaves = store.delete_page(g1.key().as_str()).unwrap();
        assert_eq!(leaves, vec![p1.key().clone(), deep.key().clone()]);
        assert_eq!(labels(store.pages()), vec!["P2"]);
        assert_eq!(store.len(), 1);
        assert!(!store.contains(nested.key().as_str()));
        assert!(store.contains(p2.key().as_str()));
        assert_index_consistent(&store);
        assert_eq!(
            store.delete_page(g1.key().as_str()),
            Err(TreeError::NotFound(g1.key().clone()))
        );
    }

    #[test]
    fn from_pages_rekeys_duplicates() {
        let store = TreeStore::from_pages(vec![
            Page::group("dup", "G", vec![Page::page("dup", "child")]),
            Page::page("other", "O"),
        ]);
        let keys = store.keys();
        assert_eq!(keys.len(), 3);
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(store.pages()[0].key().as_str(), "dup");
        assert_ne!(store.pages()[0].children()[0].key().as_str(), "dup");
        assert_index_consistent(&store);
    }
}
