//! Persisted form of the page store: `{ pages, openTabs, activeTab }` as JSON.
//! 頁面儲存的持久化格式與舊版資料遷移。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::tabs::Tab;
use crate::tree::{Page, PageKey, PageKind, PageType};

/// Complete persisted state, written under a single cache key.
/// 以單一快取鍵寫入的完整狀態快照。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStoreSnapshot {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub open_tabs: Vec<Tab>,
    #[serde(default, deserialize_with = "non_empty_key")]
    pub active_tab: Option<PageKey>,
}

impl PageStoreSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Serialize)
    }

    /// Parses a payload, migrating legacy page records that predate the `type` field.
    /// 解析儲存內容，並遷移缺少 `type` 欄位的舊版頁面紀錄。
    pub fn from_json(payload: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(payload).map_err(SnapshotError::Invalid)
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid page store payload: {0}")]
    Invalid(#[source] serde_json::Error),
    #[error("failed to serialize page store: {0}")]
    Serialize(#[source] serde_json::Error),
}

fn non_empty_key<'de, D>(deserializer: D) -> Result<Option<PageKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let key = Option::<PageKey>::deserialize(deserializer)?;
    Ok(key.filter(|key| !key.as_str().is_empty()))
}

/// Reads a missing or `null` string as empty.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts any `type` value; blank or unknown tags read as absent so the
/// children-based inference applies.
fn lenient_type<'de, D>(deserializer: D) -> Result<Option<PageType>, D::Error>
where
    D: Deserializer<'de>,
{
    let tag = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match tag.as_ref().and_then(serde_json::Value::as_str) {
        Some("page") => Some(PageType::Page),
        Some("group") => Some(PageType::Group),
        _ => None,
    })
}

/// Wire shape of a page. Every field but `key` may be missing in older payloads.
#[derive(Deserialize)]
struct PageRecord {
    key: PageKey,
    #[serde(default, deserialize_with = "null_as_empty")]
    label: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_type")]
    page_type: Option<PageType>,
    #[serde(default)]
    expanded: Option<bool>,
    #[serde(default)]
    children: Option<Vec<Page>>,
}

impl From<PageRecord> for Page {
    fn from(record: PageRecord) -> Self {
        let page_type = record.page_type.unwrap_or(if record.children.is_some() {
            PageType::Group
        } else {
            PageType::Page
        });
        let kind = match page_type {
            PageType::Page => PageKind::Page,
            PageType::Group => PageKind::Group {
                expanded: record.expanded.unwrap_or(false),
                children: record.children.unwrap_or_default(),
            },
        };
        Page {
            key: record.key,
            label: record.label,
            icon: record.icon,
            kind,
        }
    }
}

#[derive(Serialize)]
struct PageView<'a> {
    key: &'a PageKey,
    label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(rename = "type")]
    page_type: PageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    expanded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<&'a [Page]>,
}

impl Serialize for Page {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (expanded, children) = match &self.kind {
            PageKind::Page => (None, None),
            PageKind::Group { expanded, children } => (Some(*expanded), Some(children.as_slice())),
        };
        PageView {
            key: &self.key,
            label: &self.label,
            icon: self.icon.as_deref(),
            page_type: self.page_type(),
            expanded,
            children,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        PageRecord::deserialize(deserializer).map(Page::from)
    }
}
