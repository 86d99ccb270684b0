//! Persistent extension settings and remote endpoint configuration.
//!
//! Settings live in a single JSON document shared with other extensions; this
//! crate only owns the `chub` namespace and preserves everything else on save.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Namespace key inside the shared settings document.
pub const EXTENSION_KEY: &str = "chub";

pub const DEFAULT_FIND_COUNT: u32 = 10;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.chub.ai/search";
pub const DEFAULT_TAGS_ENDPOINT: &str = "https://api.chub.ai/tags";
pub const DEFAULT_AVATAR_BASE: &str = "https://avatars.charhub.io/avatars";
pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8000/api/plugins/st-proxy-plugin/fetch";

/// Values this extension persists between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChubSettings {
    #[serde(default = "default_find_count")]
    pub find_count: u32,
    #[serde(default)]
    pub nsfw: bool,
}

fn default_find_count() -> u32 {
    DEFAULT_FIND_COUNT
}

impl Default for ChubSettings {
    fn default() -> Self {
        Self {
            find_count: DEFAULT_FIND_COUNT,
            nsfw: false,
        }
    }
}

/// Shared key-value settings document.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    root: Map<String, Value>,
}

impl SettingsStore {
    /// Reads the document, tolerating a missing or unreadable file, and fills
    /// in any default keys absent from our namespace.
    pub fn load(path: &Path) -> Self {
        let root = match std::fs::read_to_string(path) {
            Ok(body) => match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!(path = %path.display(), "settings file is not an object; starting fresh");
                    Map::new()
                }
                Err(e) => {
                    warn!(path = %path.display(), "settings file unreadable: {e}");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        let mut store = Self {
            path: path.to_path_buf(),
            root,
        };
        store.ensure_defaults();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_defaults(&mut self) {
        let defaults = ChubSettings::default();
        let entry = self
            .root
            .entry(EXTENSION_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(ns) = entry {
            ns.entry("findCount")
                .or_insert_with(|| Value::from(defaults.find_count));
            ns.entry("nsfw").or_insert_with(|| Value::from(defaults.nsfw));
        }
    }

    /// Current values of our namespace; malformed entries fall back to defaults.
    pub fn chub(&self) -> ChubSettings {
        let settings = self
            .root
            .get(EXTENSION_KEY)
            .cloned()
            .and_then(|v| serde_json::from_value::<ChubSettings>(v).ok())
            .unwrap_or_default();
        ChubSettings {
            find_count: settings.find_count.max(1),
            ..settings
        }
    }

    pub fn set_chub(&mut self, settings: ChubSettings) {
        let ns = self
            .root
            .entry(EXTENSION_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = ns {
            map.insert("findCount".into(), Value::from(settings.find_count));
            map.insert("nsfw".into(), Value::from(settings.nsfw));
        } else {
            *ns = serde_json::json!({
                "findCount": settings.find_count,
                "nsfw": settings.nsfw,
            });
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating settings directory {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&Value::Object(self.root.clone()))?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("writing {}", self.path.display()))?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// Where requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub search: String,
    pub tags: String,
    pub avatar_base: String,
    /// Proxy indirection; `None` means talk to the catalog directly.
    pub proxy: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search: DEFAULT_SEARCH_ENDPOINT.to_string(),
            tags: DEFAULT_TAGS_ENDPOINT.to_string(),
            avatar_base: DEFAULT_AVATAR_BASE.to_string(),
            proxy: Some(DEFAULT_PROXY_URL.to_string()),
            timeout: None,
        }
    }
}

impl Endpoints {
    /// Defaults overridden by `CHUB_*` environment variables (a `.env` file is
    /// honoured), then by explicit CLI flags.
    pub fn resolve(proxy_flag: Option<String>, direct_flag: bool) -> Self {
        let mut endpoints = Self::default();
        if let Ok(v) = dotenvy::var("CHUB_SEARCH_ENDPOINT") {
            endpoints.search = v;
        }
        if let Ok(v) = dotenvy::var("CHUB_TAGS_ENDPOINT") {
            endpoints.tags = v;
        }
        if let Ok(v) = dotenvy::var("CHUB_AVATAR_BASE") {
            endpoints.avatar_base = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = dotenvy::var("CHUB_PROXY_URL") {
            endpoints.proxy = Some(v);
        }
        if let Ok(v) = dotenvy::var("CHUB_HTTP_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => endpoints.timeout = Some(Duration::from_secs(secs)),
                _ => warn!("ignoring CHUB_HTTP_TIMEOUT_SECS={v:?}"),
            }
        }
        if let Some(proxy) = proxy_flag {
            endpoints.proxy = Some(proxy);
        }
        let env_direct = dotenvy::var("CHUB_DIRECT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if direct_flag || env_direct {
            endpoints.proxy = None;
        }
        endpoints
    }

    pub fn card_png_url(&self, full_path: &str) -> String {
        format!("{}/{full_path}/chara_card_v2.png", self.avatar_base)
    }

    pub fn card_webp_url(&self, full_path: &str) -> String {
        format!("{}/{full_path}/avatar.webp", self.avatar_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_populates_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::load(&dir.path().join("settings.json"));
        assert_eq!(store.chub(), ChubSettings::default());
    }

    #[test]
    fn save_preserves_foreign_namespaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"other":{"keep":true},"chub":{"findCount":25}}"#,
        )
        .unwrap();

        let mut store = SettingsStore::load(&path);
        assert_eq!(store.chub().find_count, 25);
        assert!(!store.chub().nsfw);

        store.set_chub(ChubSettings {
            find_count: 40,
            nsfw: true,
        });
        store.save().unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["other"]["keep"], Value::Bool(true));
        assert_eq!(raw["chub"]["findCount"], Value::from(40));
        assert_eq!(raw["chub"]["nsfw"], Value::Bool(true));
    }

    #[test]
    fn malformed_namespace_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"chub":"oops"}"#).unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.chub(), ChubSettings::default());
    }

    #[test]
    fn card_urls_derive_from_full_path() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.card_png_url("alice/elf"),
            "https://avatars.charhub.io/avatars/alice/elf/chara_card_v2.png"
        );
        assert_eq!(
            endpoints.card_webp_url("alice/elf"),
            "https://avatars.charhub.io/avatars/alice/elf/avatar.webp"
        );
    }
}
