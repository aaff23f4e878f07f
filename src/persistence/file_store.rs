//! Local JSON file backend
//!
//! Writes go to `<file>.tmp`, are synced, then renamed over the target so an
//! interrupted save leaves the previous document intact.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::StateStore;
use crate::ledger::AccountState;

#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Move an unreadable document aside so the next save does not destroy it.
    async fn quarantine(&self) -> Option<PathBuf> {
        let target = self.sibling(&format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S")));
        match fs::rename(&self.path, &target).await {
            Ok(()) => Some(target),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to quarantine state file");
                None
            }
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn read(&self) -> Result<Option<AccountState>> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        match serde_json::from_str::<AccountState>(&json) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                let moved = self.quarantine().await;
                if let Some(ref target) = moved {
                    info!(from = %self.path.display(), to = %target.display(), "💾 Corrupt state file moved aside");
                }
                Err(anyhow!(e).context(format!("Failed to parse {}", self.path.display())))
            }
        }
    }

    async fn write(&self, state: &AccountState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.sibling(".tmp");

        let mut file = fs::File::create(&tmp)
            .await
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to replace {}", self.path.display()));
        }
        Ok(())
    }
}
