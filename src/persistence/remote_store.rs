//! Remote key-value document store backend
//!
//! The account document lives at `{base_url}/{key}{suffix}`:
//! - `GET` returns the document (404 or a JSON `null` body means "nothing yet")
//! - `PUT` replaces it
//!
//! A document that cannot be parsed is copied to `{key}.corrupt-<ts>{suffix}`
//! before the read fails.
//!
//! With `suffix = ".json"` this is the Firebase Realtime Database REST shape;
//! an empty suffix fits plain KV services.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{error, warn};

use super::StateStore;
use crate::config::RemoteStoreConfig;
use crate::ledger::AccountState;

#[derive(Debug, Clone)]
pub struct RemoteStateStore {
    client: reqwest::Client,
    url: String,
    /// `{base_url}/{key}` without the suffix
    stem: String,
    suffix: String,
    token: Option<String>,
}

impl RemoteStateStore {
    pub fn new(config: &RemoteStoreConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .context("persistence.remote.base_url is required for the remote backend")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let stem = format!("{}/{}", base_url.trim_end_matches('/'), config.key.trim_matches('/'));

        Ok(Self {
            client,
            url: format!("{}{}", stem, config.suffix),
            stem,
            suffix: config.suffix.clone(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn corrupt_url(&self) -> String {
        format!("{}.corrupt-{}{}", self.stem, Utc::now().format("%Y%m%d%H%M%S"), self.suffix)
    }

    /// Copy an unreadable document aside so the next write cannot destroy it
    async fn quarantine(&self, body: &str) -> Result<String> {
        let target = self.corrupt_url();
        let response = self
            .authorize(self.client.put(&target))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .context("Failed to reach remote state store")?;
        if !response.status().is_success() {
            bail!("Remote state store rejected quarantine copy: {}", response.status());
        }
        Ok(target)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    fn describe(&self) -> String {
        format!("remote:{}", self.url)
    }

    async fn read(&self) -> Result<Option<AccountState>> {
        let response = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .context("Failed to reach remote state store")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            bail!("Remote state store returned error: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("Failed to read remote state body")?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }

        match serde_json::from_str(trimmed) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                match self.quarantine(&body).await {
                    Ok(target) => warn!(url = %self.url, copy = %target, "💾 Unreadable remote state copied aside"),
                    Err(qe) => error!(
                        url = %self.url,
                        error = %format!("{qe:#}"),
                        "💾 Failed to copy unreadable remote state aside"
                    ),
                }
                Err(anyhow::Error::new(e).context("Failed to parse remote state document"))
            }
        }
    }

    async fn write(&self, state: &AccountState) -> Result<()> {
        let response = self
            .authorize(self.client.put(&self.url))
            .json(state)
            .send()
            .await
            .context("Failed to reach remote state store")?;

        if !response.status().is_success() {
            bail!("Remote state store rejected write: {}", response.status());
        }
        Ok(())
    }
}
