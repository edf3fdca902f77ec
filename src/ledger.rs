//! Persisted progress ledger
//!
//! The ledger is the source of truth for idempotent resume: one record per
//! pair key, rewritten durably after every mutation. Workers never touch it
//! directly; the orchestrator applies their results under a single-writer
//! discipline, so no locking is needed here.
//!
//! The file is rewritten through a temp-and-rename so a crash mid-write
//! can never leave a half-written ledger; at worst the last in-flight batch
//! of results is lost and re-fetched on the next run.

use crate::error::{Error, Result};
use crate::types::{FetchOutcome, LedgerEntry, PairKey, PairStatus};
use crate::utils::write_atomic;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

const LEDGER_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    pairs: BTreeMap<PairKey, LedgerEntry>,
}

/// Durable per-pair progress records
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<PairKey, LedgerEntry>,
}

impl Ledger {
    /// Load the ledger from disk, starting empty when the file is absent
    ///
    /// An unparseable file is logged and treated as absent: the on-disk
    /// folder scan in the resolver reconstructs completed entries, so a
    /// lost ledger costs reconciliation time, not re-downloads.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<LedgerFile>(&text) {
                Ok(file) => file.pairs,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        debug!(path = %path.display(), entries = entries.len(), "ledger loaded");
        Self { path, entries }
    }

    /// Look up one pair's record
    pub fn get(&self, key: &PairKey) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    /// Iterate all records in key order
    pub fn entries(&self) -> impl Iterator<Item = (&PairKey, &LedgerEntry)> {
        self.entries.iter()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no records exist
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count records currently in `status`
    pub fn count(&self, status: PairStatus) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// Insert or replace a record and persist immediately
    pub fn record(&mut self, key: PairKey, entry: LedgerEntry) -> Result<()> {
        self.entries.insert(key, entry);
        self.persist()
    }

    /// Apply a fetch outcome to a pair and persist immediately
    ///
    /// This is the write-before-acknowledge point: the orchestrator only
    /// accepts the next worker result after this returns.
    pub fn record_outcome(&mut self, key: PairKey, outcome: &FetchOutcome) -> Result<()> {
        let mut entry = LedgerEntry::new(outcome.status());
        match outcome {
            FetchOutcome::Downloaded {
                folder,
                media_extension,
            } => {
                entry.folder = Some(folder.clone());
                entry.media_extension = Some(media_extension.clone());
            }
            FetchOutcome::SkippedNoMedia => {}
            FetchOutcome::Failed { reason } => {
                entry.failure_reason = Some(reason.clone());
            }
        }
        self.record(key, entry)
    }

    /// Mutate an existing record in place and persist
    ///
    /// Returns `Ok(false)` (without writing) when the key has no record.
    pub fn update<F>(&mut self, key: &PairKey, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut LedgerEntry),
    {
        match self.entries.get_mut(key) {
            Some(entry) => {
                mutate(entry);
                entry.updated_at = Utc::now();
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Advance a record to a new status and persist
    pub fn advance(&mut self, key: &PairKey, status: PairStatus) -> Result<bool> {
        self.update(key, |entry| entry.status = status)
    }

    /// Force-reset: drop records for the declared keys and persist
    ///
    /// Only declared keys are touched; records for pairs no longer in the
    /// input survive a force run.
    pub fn reset(&mut self, keys: &[PairKey]) -> Result<usize> {
        let before = self.entries.len();
        for key in keys {
            self.entries.remove(key);
        }
        let removed = before - self.entries.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        let file = LedgerFile {
            version: LEDGER_VERSION,
            pairs: self.entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &json)
            .map_err(|e| Error::Ledger(format!("could not persist {}: {e}", self.path.display())))
    }
}
