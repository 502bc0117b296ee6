use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_LEDGER_FILE: &str = "processed_episodes.json";

/// Record of one completed episode, written exactly once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub title: String,
    pub notion_url: String,
    pub processed_at: DateTime<Utc>,
}

/// Durable idempotency record of completed episode numbers.
///
/// The whole document is read once at startup and rewritten on every
/// mutation; fine at hundreds-to-thousands of episodes and a single writer.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<u32, LedgerEntry>,
}

impl Ledger {
    /// Load the ledger from disk; a missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Ledger> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Ledger { path, entries })
    }

    pub fn is_processed(&self, episode_number: u32) -> bool {
        self.entries.contains_key(&episode_number)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Record a completed episode and flush the file before returning, so a
    /// crash after this call cannot lose the record.
    pub fn mark_processed(
        &mut self,
        episode_number: u32,
        notion_url: &str,
        title: &str,
    ) -> Result<()> {
        self.entries.insert(
            episode_number,
            LedgerEntry {
                title: title.to_string(),
                notion_url: notion_url.to_string(),
                processed_at: Utc::now(),
            },
        );
        self.save()
    }

    fn save(&self) -> Result<()> {
        let mut file = std::fs::File::create(&self.path)?;
        file.write_all(serde_json::to_string_pretty(&self.entries)?.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
