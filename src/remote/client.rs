//! Catalog operations: search, tag catalog, card download.
//!
//! Every public operation here fails soft. Callers get an empty result (or a
//! notification, for downloads) instead of an error, so a flaky catalog only
//! ever degrades the popup.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Endpoints;
use crate::host::{CardImporter, Notifier};
use crate::model::types::{CardFile, CatalogRecord, SearchQuery, TagCatalog};
use crate::remote::transport::{ProxyRequest, ProxyResponse, ProxyTransport, TransportError};
use crate::remote::wire::{SearchEnvelope, TagsPayload, normalize_search};

/// `limit` used when the tags endpoint has to be read with GET.
pub const TAG_FETCH_LIMIT: u32 = 5000;

pub const DOWNLOAD_FAILED: &str = "Character download failed";

static SLASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new("/+").expect("slash run regex"));

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("{target} answered HTTP {status}")]
    Status { target: String, status: u16 },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("import failed: {0}")]
    Import(String),
}

/// Search target URL for `query`. Empty term and tag lists are left out; page,
/// page size and the nsfw flag are always present.
pub fn search_url(endpoint: &str, query: &SearchQuery) -> Result<Url, RemoteError> {
    let mut url = Url::parse(endpoint).map_err(|e| RemoteError::InvalidEndpoint {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        if !query.search_term.is_empty() {
            pairs.append_pair("search", &query.search_term);
        }
        if !query.include_tags.is_empty() {
            pairs.append_pair("tags", &query.include_tags.join(","));
        }
        if !query.exclude_tags.is_empty() {
            pairs.append_pair("exclude_tags", &query.exclude_tags.join(","));
        }
        if let Some(sort) = query.sort {
            pairs.append_pair("sort", sort.as_str());
        }
        pairs.append_pair("page", &query.page.max(1).to_string());
        pairs.append_pair("first", &query.results_per_page.max(1).to_string());
        pairs.append_pair("nsfw", if query.nsfw { "true" } else { "false" });
    }
    Ok(url)
}

/// `alice/elara` + `png` → `alice_elara.png`.
pub fn card_file_name(full_path: &str, ext: &str) -> String {
    SLASH_RUN
        .replace_all(&format!("{full_path}.{ext}"), "_")
        .into_owned()
}

/// `png` when the declared media type mentions it, `webp` otherwise.
pub fn card_extension(content_type: &str) -> &'static str {
    if content_type.to_ascii_lowercase().contains("png") {
        "png"
    } else {
        "webp"
    }
}

pub struct RemoteClient<T> {
    transport: T,
    endpoints: Endpoints,
}

impl<T: ProxyTransport> RemoteClient<T> {
    pub fn new(transport: T, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// One page of results. Failures are logged and produce an empty page.
    pub async fn search(&self, query: &SearchQuery) -> Vec<CatalogRecord> {
        match self.try_search(query).await {
            Ok(records) => {
                info!(
                    records = records.len(),
                    page = query.page,
                    first = query.results_per_page,
                    "search_complete"
                );
                records
            }
            Err(e) => {
                warn!("catalog search failed: {e}");
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &SearchQuery) -> Result<Vec<CatalogRecord>, RemoteError> {
        let target = search_url(&self.endpoints.search, query)?;
        debug!(target_url = %target, "search_start");
        let response = self.get_ok(target.as_str()).await?;
        let envelope: SearchEnvelope = serde_json::from_slice(&response.body)?;
        Ok(normalize_search(envelope))
    }

    /// Known tags for autocomplete; empty when the endpoint cannot be read.
    pub async fn fetch_tag_catalog(&self) -> TagCatalog {
        match self.try_fetch_tags().await {
            Ok(catalog) => {
                info!(tags = catalog.len(), "tag catalog loaded");
                catalog
            }
            Err(e) => {
                warn!("tag catalog unavailable: {e}");
                TagCatalog::default()
            }
        }
    }

    async fn try_fetch_tags(&self) -> Result<TagCatalog, RemoteError> {
        let tags = &self.endpoints.tags;
        let mut response = self
            .transport
            .fetch(ProxyRequest::post_json(tags.as_str(), json!({})))
            .await?;
        if !response.is_success() {
            debug!(status = response.status, "tags POST rejected; retrying with GET");
            let mut target = Url::parse(tags).map_err(|e| RemoteError::InvalidEndpoint {
                url: tags.clone(),
                reason: e.to_string(),
            })?;
            target
                .query_pairs_mut()
                .append_pair("limit", &TAG_FETCH_LIMIT.to_string());
            response = self.transport.fetch(ProxyRequest::get(target.as_str())).await?;
        }
        if !response.is_success() {
            return Err(RemoteError::Status {
                target: tags.clone(),
                status: response.status,
            });
        }
        let payload: TagsPayload = serde_json::from_slice(&response.body)?;
        Ok(payload.into_catalog())
    }

    /// Fetches the card image: the explicit card URL when given, else the
    /// canonical PNG, falling back to the WEBP avatar if that fails.
    pub async fn fetch_card(
        &self,
        full_path: &str,
        card_image_url: &str,
    ) -> Result<CardFile, RemoteError> {
        let primary = if card_image_url.is_empty() {
            self.endpoints.card_png_url(full_path)
        } else {
            card_image_url.to_string()
        };
        let response = match self.get_ok(&primary).await {
            Ok(response) => response,
            Err(e) => {
                let alt = self.endpoints.card_webp_url(full_path);
                debug!(target_url = %primary, fallback = %alt, "card fetch failed: {e}");
                self.get_ok(&alt).await?
            }
        };
        let ext = card_extension(&response.content_type);
        Ok(CardFile {
            name: card_file_name(full_path, ext),
            bytes: response.body,
            media_type: response.content_type,
        })
    }

    /// Downloads a card and hands it to the importer. Never fails: problems
    /// are logged and surfaced once through `notifier`. Returns what the
    /// importer wrote.
    pub async fn download_card(
        &self,
        full_path: &str,
        card_image_url: &str,
        importer: &dyn CardImporter,
        notifier: &dyn Notifier,
    ) -> Vec<PathBuf> {
        let result = match self.fetch_card(full_path, card_image_url).await {
            Ok(file) => importer
                .import(vec![file])
                .map_err(|e| RemoteError::Import(format!("{e:#}"))),
            Err(e) => Err(e),
        };
        match result {
            Ok(paths) => paths,
            Err(e) => {
                warn!(full_path = full_path, "download error: {e}");
                notifier.error(DOWNLOAD_FAILED, &e.to_string());
                Vec::new()
            }
        }
    }

    async fn get_ok(&self, target: &str) -> Result<ProxyResponse, RemoteError> {
        let response = self.transport.fetch(ProxyRequest::get(target)).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(RemoteError::Status {
                target: target.to_string(),
                status: response.status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::SortKey;

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn search_url_joins_tags_and_omits_empty_parameters() {
        let query = SearchQuery {
            include_tags: vec!["elf".into(), "mage".into()],
            ..SearchQuery::default()
        };
        let url = search_url("https://api.chub.ai/search", &query).unwrap();
        let p = pairs(&url);
        assert!(p.contains(&("tags".into(), "elf,mage".into())));
        assert!(!p.iter().any(|(k, _)| k == "search" || k == "exclude_tags"));
        assert!(p.contains(&("nsfw".into(), "false".into())));
        assert!(p.contains(&("page".into(), "1".into())));
        assert!(p.contains(&("first".into(), "10".into())));
    }

    #[test]
    fn search_url_orders_parameters_like_the_catalog_expects() {
        let query = SearchQuery {
            search_term: "dragon".into(),
            include_tags: vec!["a".into()],
            exclude_tags: vec!["b".into(), "c".into()],
            nsfw: true,
            sort: Some(SortKey::Rating),
            page: 3,
            results_per_page: 25,
        };
        let url = search_url("https://api.chub.ai/search", &query).unwrap();
        let keys: Vec<String> = pairs(&url).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["search", "tags", "exclude_tags", "sort", "page", "first", "nsfw"]
        );
        assert!(url.as_str().ends_with("nsfw=true"));
    }

    #[test]
    fn search_url_omits_sort_when_unset() {
        let query = SearchQuery {
            sort: None,
            ..SearchQuery::default()
        };
        let url = search_url("https://api.chub.ai/search", &query).unwrap();
        assert!(!pairs(&url).iter().any(|(k, _)| k == "sort"));
    }

    #[test]
    fn file_names_collapse_slash_runs() {
        assert_eq!(card_file_name("alice/elara", "png"), "alice_elara.png");
        assert_eq!(card_file_name("alice//x/y", "webp"), "alice_x_y.webp");
    }

    #[test]
    fn extension_follows_declared_type() {
        assert_eq!(card_extension("image/PNG"), "png");
        assert_eq!(card_extension("image/webp"), "webp");
        assert_eq!(card_extension(""), "webp");
    }
}
