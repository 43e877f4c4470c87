// src/maps_loader.rs
//
// Maps SDK bootstrap. The key is resolved at most once per loader; every
// caller after the first gets the cached bootstrap. Build one loader per
// process and hand it around (it lives in AppState).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::Config;

pub const SDK_VERSION: &str = "weekly";
pub const SDK_LIBRARIES: &[&str] = &["places", "routes", "geometry"];
pub const SDK_LANGUAGE: &str = "en";
pub const SDK_RETRIES: u32 = 3;

#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_key(&self) -> anyhow::Result<String>;
}

/// Key taken from configuration.
pub struct StaticKeySource {
    key: String,
}

impl StaticKeySource {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch_key(&self) -> anyhow::Result<String> {
        Ok(self.key.clone())
    }
}

#[derive(Debug, Deserialize)]
struct KeyResponse {
    #[serde(rename = "apiKey", default)]
    api_key: String,
}

/// Key served by an upstream `GET` returning `{ "apiKey": "..." }`.
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_key(&self) -> anyhow::Result<String> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<KeyResponse>()
            .await?;
        Ok(res.api_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapsBootstrap {
    pub api_key: String,
    pub version: &'static str,
    pub libraries: &'static [&'static str],
    pub language: &'static str,
    pub retries: u32,
}

impl MapsBootstrap {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            version: SDK_VERSION,
            libraries: SDK_LIBRARIES,
            language: SDK_LANGUAGE,
            retries: SDK_RETRIES,
        }
    }

    /// No key: the map still loads but in limited mode.
    pub fn is_limited(&self) -> bool {
        self.api_key.is_empty()
    }
}

pub struct MapsLoader {
    source: Box<dyn KeySource>,
    bootstrap: OnceCell<Arc<MapsBootstrap>>,
}

impl MapsLoader {
    pub fn new(source: impl KeySource + 'static) -> Self {
        Self {
            source: Box::new(source),
            bootstrap: OnceCell::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        match &cfg.maps_key_url {
            Some(url) => {
                tracing::info!(%url, "maps key will be fetched from upstream");
                Self::new(HttpKeySource::new(url.clone()))
            }
            None => Self::new(StaticKeySource::new(cfg.google_maps_api_key.clone())),
        }
    }

    /// Resolve the bootstrap, fetching the key on first use only.
    pub async fn load(&self) -> Arc<MapsBootstrap> {
        self.bootstrap
            .get_or_init(|| async {
                let api_key = match self.source.fetch_key().await {
                    Ok(key) => key,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to fetch maps api key");
                        String::new()
                    }
                };

                let bootstrap = MapsBootstrap::new(api_key);
                if bootstrap.is_limited() {
                    tracing::warn!("maps api key is missing, map functionality will be limited");
                } else {
                    tracing::info!(version = bootstrap.version, "maps bootstrap ready");
                }
                Arc::new(bootstrap)
            })
            .await
            .clone()
    }
}
