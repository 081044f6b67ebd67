//! Defines the configuration structure for the catalogue service: where the upstream
//! vocabulary API lives, how resource IRIs are minted and how the HTTP server binds.

use anyhow::{anyhow, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

fn default_upstream() -> Url {
    Url::parse("https://api.finto.fi/rest/v1/").expect("static url")
}

fn default_landing() -> Url {
    Url::parse("https://finto.fi/").expect("static url")
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_pagesize() -> u64 {
    50
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct Config {
    /// Root of the upstream REST API, e.g. `https://api.finto.fi/rest/v1/`
    #[builder(default = "default_upstream()")]
    #[serde(default = "default_upstream")]
    pub upstream: Url,
    /// Root of the human-facing vocabulary site; landing pages are derived from it
    #[builder(default = "default_landing()")]
    #[serde(default = "default_landing")]
    pub landing: Url,
    /// Overrides the base URL otherwise derived from each request's Host header
    #[builder(default)]
    #[serde(default)]
    pub public_url: Option<Url>,
    #[builder(default = "default_bind()")]
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Language requested from the upstream and used to tag emitted literals
    #[builder(default = "default_lang()")]
    #[serde(default = "default_lang")]
    pub lang: String,
    #[builder(default = "default_pagesize()")]
    #[serde(default = "default_pagesize")]
    pub default_pagesize: u64,
    #[builder(default = "default_timeout_secs()")]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[builder(default)]
    #[serde(default)]
    pub cors: bool,
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.default_pagesize == Some(0) {
            return Err("default_pagesize must be at least 1".to_string());
        }
        if self.timeout_secs == Some(0) {
            return Err("timeout_secs must be at least 1".to_string());
        }
        for url in [&self.upstream, &self.landing].into_iter().flatten() {
            check_http_url(url)?;
        }
        Ok(())
    }
}

fn check_http_url(url: &Url) -> Result<(), String> {
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(format!("{url} is not an http(s) base URL"));
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Config {
            upstream: default_upstream(),
            landing: default_landing(),
            public_url: None,
            bind: default_bind(),
            lang: default_lang(),
            default_pagesize: default_pagesize(),
            timeout_secs: default_timeout_secs(),
            cors: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        SocketAddr::from_str(&self.bind)
            .map_err(|e| anyhow!("Invalid bind address {}: {e}", self.bind))
    }

    /// Re-checks the invariants enforced by the builder; used after deserializing.
    pub fn validate(&self) -> Result<()> {
        if self.default_pagesize == 0 {
            return Err(anyhow!("default_pagesize must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be at least 1"));
        }
        check_http_url(&self.upstream).map_err(|e| anyhow!(e))?;
        check_http_url(&self.landing).map_err(|e| anyhow!(e))?;
        self.bind_addr()?;
        Ok(())
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    pub fn from_file(file: &Path) -> Result<Self> {
        let file = std::fs::File::open(file)?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Prints out the current Config in a clear and readable way for command line output.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  Upstream: {}", self.upstream);
        println!("  Landing: {}", self.landing);
        match &self.public_url {
            Some(url) => println!("  Public URL: {url}"),
            None => println!("  Public URL: (derived from requests)"),
        }
        println!("  Bind: {}", self.bind);
        println!("  Language: {}", self.lang);
        println!("  Default Page Size: {}", self.default_pagesize);
        println!("  Timeout: {}s", self.timeout_secs);
        println!("  CORS: {}", self.cors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.lang, "en");
        assert_eq!(config.default_pagesize, 50);
        assert!(config.bind_addr().is_ok());
    }

    #[test]
    fn test_builder_rejects_zero_pagesize() {
        let result = Config::builder().default_pagesize(0u64).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_non_http_upstream() {
        let result = Config::builder()
            .upstream(Url::parse("mailto:someone@example.org").unwrap())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modcat.json");
        let config = Config::builder()
            .lang("fi")
            .cors(true)
            .public_url(Some(Url::parse("https://catalogue.example.org/").unwrap()))
            .build()
            .unwrap();
        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"lang": "sv", "timeout_secs": 5}"#).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.lang, "sv");
        assert_eq!(loaded.timeout(), Duration::from_secs(5));
        assert_eq!(loaded.upstream, default_upstream());
    }

    #[test]
    fn test_file_with_bad_bind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"bind": "not an address"}"#).unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
