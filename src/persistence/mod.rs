//! Persistence Module
//!
//! The ledger talks to a single `StateStore` capability (`read` / `write` of
//! the account document). Backends:
//! - `FileStateStore`: local JSON file, atomic write-then-rename
//! - `RemoteStateStore`: HTTP key-value document store
//! - `MemoryStateStore`: in-process, for dry runs and tests
//!
//! `TradeJournal` is a separate, non-authoritative CSV export of closed trades.

mod file_store;
mod journal;
mod remote_store;

pub use file_store::FileStateStore;
pub use journal::{JournalRow, TradeJournal};
pub use remote_store::RemoteStateStore;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::config::{PersistenceBackend, PersistenceConfig};
use crate::ledger::AccountState;

/// Durable home of the account document
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Human-readable location for logs
    fn describe(&self) -> String;

    /// Last written document, `None` when nothing has been stored yet
    async fn read(&self) -> Result<Option<AccountState>>;

    /// Replace the stored document
    async fn write(&self, state: &AccountState) -> Result<()>;
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn read(&self) -> Result<Option<AccountState>> {
        (**self).read().await
    }

    async fn write(&self, state: &AccountState) -> Result<()> {
        (**self).write(state).await
    }
}

/// Store that keeps the document in memory only
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    document: Mutex<Option<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state`
    pub fn with_state(state: &AccountState) -> Result<Self> {
        Ok(Self {
            document: Mutex::new(Some(serde_json::to_string(state)?)),
        })
    }

    /// Raw JSON of the last write
    pub fn raw(&self) -> Option<String> {
        self.document.lock().ok().and_then(|d| d.clone())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn read(&self) -> Result<Option<AccountState>> {
        let raw = match self.document.lock() {
            Ok(doc) => doc.clone(),
            Err(_) => bail!("memory store lock poisoned"),
        };
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, state: &AccountState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        match self.document.lock() {
            Ok(mut doc) => {
                *doc = Some(json);
                Ok(())
            }
            Err(_) => bail!("memory store lock poisoned"),
        }
    }
}

/// Build the configured backend
pub fn build_store(config: &PersistenceConfig) -> Result<Box<dyn StateStore>> {
    let store: Box<dyn StateStore> = match config.backend {
        PersistenceBackend::File => Box::new(FileStateStore::new(&config.state_file)),
        PersistenceBackend::Remote => Box::new(RemoteStateStore::new(&config.remote)?),
        PersistenceBackend::Memory => Box::new(MemoryStateStore::new()),
    };
    Ok(store)
}
