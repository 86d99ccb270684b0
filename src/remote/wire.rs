//! Catalog response shapes and their normalization.
//!
//! The service is loosely typed: every node field is optional and the tags
//! endpoint has answered both with a bare list and with a `{ "tags": [...] }`
//! envelope. Both are modelled as explicit variants here.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::model::types::{CatalogRecord, NO_DESCRIPTION, RecordId, TagCatalog, author_from_path};

#[derive(Debug, Default, Deserialize)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub data: Option<SearchData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchData {
    /// Kept raw so one malformed node cannot sink the whole page.
    #[serde(default)]
    pub nodes: Option<Vec<Value>>,
}

/// One search hit. A field of the wrong type reads as absent so the rest of
/// the node still renders.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tagline: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub full_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_topics")]
    pub topics: Option<Vec<String>>,
    #[serde(default, rename = "avatar_url", deserialize_with = "lenient")]
    pub avatar_url: Option<String>,
    #[serde(default, rename = "max_res_url", deserialize_with = "lenient")]
    pub max_res_url: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Keeps the string topics of a list and drops anything else in it.
fn lenient_topics<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(topic) => Some(topic),
                _ => None,
            })
            .collect(),
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl WireNode {
    pub fn into_record(self) -> CatalogRecord {
        let full_path = self.full_path.unwrap_or_default();
        let description = non_empty(self.tagline)
            .or_else(|| non_empty(self.description))
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());
        CatalogRecord {
            id: self.id,
            name: self.name.unwrap_or_default(),
            description,
            author: author_from_path(&full_path),
            full_path,
            tags: self.topics.unwrap_or_default(),
            thumbnail_url: self.avatar_url.unwrap_or_default(),
            card_image_url: self.max_res_url.unwrap_or_default(),
        }
    }
}

/// Turns a search response body into records; unreadable nodes are skipped.
pub fn normalize_search(envelope: SearchEnvelope) -> Vec<CatalogRecord> {
    let nodes = envelope
        .data
        .and_then(|d| d.nodes)
        .unwrap_or_default();
    nodes
        .into_iter()
        .enumerate()
        .filter_map(|(idx, node)| match serde_json::from_value::<WireNode>(node) {
            Ok(node) => Some(node.into_record()),
            Err(e) => {
                debug!(index = idx, "skipping unreadable search node: {e}");
                None
            }
        })
        .collect()
}

/// Tags endpoint response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagsPayload {
    Wrapped { tags: Vec<TagEntry> },
    Bare(Vec<TagEntry>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagEntry {
    Name(String),
    Record { tag: Option<String> },
    Other(Value),
}

impl TagEntry {
    fn into_name(self) -> Option<String> {
        match self {
            TagEntry::Name(name) => Some(name),
            TagEntry::Record { tag } => tag,
            TagEntry::Other(_) => None,
        }
    }
}

impl TagsPayload {
    pub fn into_catalog(self) -> TagCatalog {
        let entries = match self {
            TagsPayload::Wrapped { tags } => tags,
            TagsPayload::Bare(tags) => tags,
        };
        TagCatalog::new(entries.into_iter().filter_map(TagEntry::into_name))
    }
}
