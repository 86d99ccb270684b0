//! Normalized catalog entities.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Fallback used when a node carries neither a tagline nor a description.
pub const NO_DESCRIPTION: &str = "No description";

/// Author shown when the full path has no `author/` prefix.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Opaque record identifier; the catalog hands out numbers today but older
/// nodes used strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// One character card as returned by a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogRecord {
    pub id: Option<RecordId>,
    pub name: String,
    pub description: String,
    /// `author/slug`
    pub full_path: String,
    pub tags: Vec<String>,
    pub author: String,
    pub thumbnail_url: String,
    /// Preferred download source when non-empty.
    pub card_image_url: String,
}

impl CatalogRecord {
    /// Public page for the card on the catalog site.
    pub fn page_url(&self) -> String {
        format!("https://chub.ai/characters/{}", self.full_path)
    }
}

/// Author is the segment before the first `/`; anything without one (or with
/// an empty prefix) is attributed to [`UNKNOWN_AUTHOR`].
pub fn author_from_path(full_path: &str) -> String {
    match full_path.split_once('/') {
        Some((author, _)) if !author.is_empty() => author.to_string(),
        _ => UNKNOWN_AUTHOR.to_string(),
    }
}

/// Sort orders the search endpoint understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    DownloadCount,
    Rating,
    RatingCount,
    LastActivityAt,
    CreatedAt,
    Name,
    Random,
}

impl SortKey {
    pub fn all() -> &'static [SortKey] {
        &[
            SortKey::DownloadCount,
            SortKey::Rating,
            SortKey::RatingCount,
            SortKey::LastActivityAt,
            SortKey::CreatedAt,
            SortKey::Name,
            SortKey::Random,
        ]
    }

    /// Wire value for the `sort` parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::DownloadCount => "download_count",
            SortKey::Rating => "rating",
            SortKey::RatingCount => "rating_count",
            SortKey::LastActivityAt => "last_activity_at",
            SortKey::CreatedAt => "created_at",
            SortKey::Name => "name",
            SortKey::Random => "random",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::DownloadCount => "Download Count",
            SortKey::Rating => "Rating",
            SortKey::RatingCount => "Rating Count",
            SortKey::LastActivityAt => "Last Activity",
            SortKey::CreatedAt => "Creation Date",
            SortKey::Name => "Name",
            SortKey::Random => "Random",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == value)
    }

    pub fn next(self) -> Self {
        let all = Self::all();
        let idx = all.iter().position(|k| *k == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }

    pub fn prev(self) -> Self {
        let all = Self::all();
        let idx = all.iter().position(|k| *k == self).unwrap_or(0);
        all[(idx + all.len() - 1) % all.len()]
    }
}

/// Snapshot of what the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub search_term: String,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub nsfw: bool,
    pub sort: Option<SortKey>,
    pub page: u32,
    pub results_per_page: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            nsfw: false,
            sort: Some(SortKey::default()),
            page: 1,
            results_per_page: crate::config::DEFAULT_FIND_COUNT,
        }
    }
}

/// Splits a comma separated tag field, dropping blank entries.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Known tags, kept in collation order for prefix lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCatalog {
    tags: Vec<String>,
}

impl TagCatalog {
    /// Trims, drops blanks and sorts.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort_by(|a, b| collate(a, b));
        Self { tags }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Case-insensitive prefix matches in catalog order. `prefix` is expected
    /// to be lower-cased already.
    pub fn prefix_matches(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| t.to_lowercase().starts_with(prefix))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Locale-like ordering: letters compare case-insensitively first, and on a
/// tie lowercase sorts before uppercase.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// In-memory file handed to the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub media_type: String,
}
