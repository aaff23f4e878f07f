//! CSV trade journal
//!
//! One row per closed trade, appended. The JSON account document stays the
//! source of truth; the journal is for analysis in a spreadsheet.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRow {
    pub timestamp: i64,
    pub symbol: String,
    pub side: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub lots: f64,
    pub pnl: f64,
    pub balance_after: f64,
}

#[derive(Debug, Clone)]
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a row, writing the header only into an empty file
    pub fn append(&self, row: &JournalRow) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create journal directory")?;
        }

        let file_has_data = self.path.exists()
            && fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open journal CSV")?;

        let mut writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);
        writer
            .serialize(row)
            .context("Failed to write journal row")?;
        writer.flush().context("Failed to flush journal")?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<JournalRow>> {
        let mut reader = csv::Reader::from_path(&self.path).context("Failed to open journal CSV")?;
        reader
            .deserialize()
            .collect::<std::result::Result<Vec<JournalRow>, _>>()
            .context("Failed to parse journal CSV")
    }
}
