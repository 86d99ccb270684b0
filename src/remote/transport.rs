//! HTTP indirection used for every catalog request.
//!
//! The catalog is never called by URL directly from the client code: requests
//! name a *target* and the transport decides how to reach it. The default
//! route is the host's same-origin proxy, which takes the fully encoded target
//! in a `url` query parameter and answers with the target's response verbatim.

use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("building http client failed: {0}")]
    Build(#[source] reqwest::Error),
    #[error("invalid proxy url {url}: {reason}")]
    InvalidProxy { url: String, reason: String },
    #[error("request to {target} failed: {source}")]
    Send {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("reading body from {target} failed: {source}")]
    Body {
        target: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMethod {
    Get,
    /// POST with a JSON body.
    Post(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: ProxyMethod,
    /// Final catalog URL, query string included.
    pub target: String,
}

impl ProxyRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: ProxyMethod::Get,
            target: target.into(),
        }
    }

    pub fn post_json(target: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: ProxyMethod::Post(body),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl ProxyResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can carry a [`ProxyRequest`] to its target.
pub trait ProxyTransport: Send + Sync {
    fn fetch(
        &self,
        request: ProxyRequest,
    ) -> impl Future<Output = Result<ProxyResponse, TransportError>> + Send;
}

/// Wraps `target` for the proxy endpoint: `<proxy>?url=<encoded target>`.
pub fn proxied_url(proxy: &str, target: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(proxy).map_err(|e| TransportError::InvalidProxy {
        url: proxy.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("url", target);
    Ok(url)
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestProxy {
    client: Client,
    proxy: Option<String>,
}

impl ReqwestProxy {
    /// `proxy = None` sends requests straight to the target.
    pub fn new(proxy: Option<String>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder =
            Client::builder().user_agent(concat!("chub-search/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::Build)?;
        if let Some(p) = &proxy {
            // Fail early on a malformed proxy rather than on the first search.
            proxied_url(p, "about:blank")?;
        }
        Ok(Self { client, proxy })
    }

    fn route(&self, target: &str) -> Result<String, TransportError> {
        match &self.proxy {
            Some(proxy) => Ok(proxied_url(proxy, target)?.to_string()),
            None => Ok(target.to_string()),
        }
    }
}

impl ProxyTransport for ReqwestProxy {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, TransportError> {
        let url = self.route(&request.target)?;
        debug!(target_url = %request.target, via = %url, "proxy fetch");
        let builder = match &request.method {
            ProxyMethod::Get => self.client.get(&url),
            ProxyMethod::Post(body) => self.client.post(&url).json(body),
        };
        let response = builder.send().await.map_err(|source| TransportError::Send {
            target: request.target.clone(),
            source,
        })?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Body {
                target: request.target.clone(),
                source,
            })?
            .to_vec();
        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }
}
