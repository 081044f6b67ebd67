//! Facilities for querying the upstream vocabulary REST API.
//!
//! [`VocabularySource`] is the seam between the catalogue and the outside world: JSON
//! listings, raw data dumps in a negotiated media type, and existence probes used to decide
//! which distributions an artefact has. [`UpstreamClient`] implements it over HTTP with an
//! explicit per-request timeout; there is no caching and no retrying.

use crate::config::Config;
use crate::errors::{CatalogueError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Options that control how the upstream API is queried.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Overall network timeout applied to individual HTTP requests.
    pub timeout: Duration,
    /// Value of the `lang` parameter sent with every request.
    pub lang: String,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            lang: "en".to_string(),
            user_agent: concat!("modcat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.timeout(),
            lang: config.lang.clone(),
            ..Default::default()
        }
    }
}

/// Raw body of an upstream data response.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: String,
    pub content_type: Option<String>,
}

/// Outcome of an existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The resource answered directly; carries the probed URL.
    Found(String),
    /// The resource lives elsewhere; carries the `Location` target.
    Redirect(String),
    NotFound,
}

impl Probe {
    /// Where the resource can be downloaded from, if it exists at all.
    pub fn location(&self) -> Option<&str> {
        match self {
            Probe::Found(url) | Probe::Redirect(url) => Some(url),
            Probe::NotFound => None,
        }
    }
}

#[async_trait]
pub trait VocabularySource: Send + Sync {
    /// GETs `path` and decodes the body as JSON.
    async fn fetch_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value>;

    /// GETs `path` asking for `accept` and returns the body untouched.
    async fn fetch_text(&self, path: &str, query: &[(&str, &str)], accept: &str)
        -> Result<Fetched>;

    /// HEADs `path` without following redirects.
    async fn probe(&self, path: &str, query: &[(&str, &str)]) -> Result<Probe>;
}

pub struct UpstreamClient {
    base: Url,
    opts: FetchOptions,
    client: Client,
    probe_client: Client,
}

impl UpstreamClient {
    pub fn new(base: Url, opts: FetchOptions) -> Result<Self> {
        let base = ensure_trailing_slash(base);
        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(opts.user_agent.as_str())
            .build()?;
        let probe_client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(opts.user_agent.as_str())
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            base,
            opts,
            client,
            probe_client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.upstream.clone(), FetchOptions::from_config(config))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves `path` against the API root and appends `query` plus the `lang` parameter.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| CatalogueError::Validation(format!("invalid upstream path {path}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("lang", &self.opts.lang);
        }
        Ok(url)
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Maps the statuses every upstream call treats alike; success passes through.
fn check_status(url: &Url, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(CatalogueError::UpstreamNotFound(url.to_string()));
    }
    if status == StatusCode::NOT_ACCEPTABLE || status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
        return Err(CatalogueError::UnsupportedFormat(format!(
            "{url} cannot be served in the requested format"
        )));
    }
    if !status.is_success() {
        return Err(CatalogueError::UpstreamUnavailable(format!(
            "{url} answered {status}"
        )));
    }
    Ok(resp)
}

#[async_trait]
impl VocabularySource for UpstreamClient {
    async fn fetch_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.endpoint(path, query)?;
        debug!("GET {url}");
        let resp = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let resp = check_status(&url, resp)?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_text(
        &self,
        path: &str,
        query: &[(&str, &str)],
        accept: &str,
    ) -> Result<Fetched> {
        let url = self.endpoint(path, query)?;
        debug!("GET {url} ({accept})");
        let resp = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await?;
        let resp = check_status(&url, resp)?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.text().await?;
        Ok(Fetched { body, content_type })
    }

    async fn probe(&self, path: &str, query: &[(&str, &str)]) -> Result<Probe> {
        let url = self.endpoint(path, query)?;
        debug!("HEAD {url}");
        let resp = self.probe_client.head(url.clone()).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Probe::NotFound);
        }
        if status.is_redirection() {
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| {
                    CatalogueError::UpstreamData(format!("{url} redirected without a Location"))
                })?;
            let target = url
                .join(location)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| location.to_string());
            return Ok(Probe::Redirect(target));
        }
        if status.is_success() {
            return Ok(Probe::Found(url.to_string()));
        }
        Err(CatalogueError::UpstreamUnavailable(format!(
            "{url} answered {status}"
        )))
    }
}
