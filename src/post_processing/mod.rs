//! Post-processing pipeline
//!
//! Runs after the fetch phase drains: for every pair the ledger marks
//! `downloaded`, a summary is extracted from the primary document, the
//! folder is renamed to carry a snippet of it, and a summary artifact is
//! written alongside the files. Dehydration is a separate, explicitly
//! requested pass. Every step here is non-fatal: failures are logged and
//! the entry stays in its prior status, retryable on the next pass.

pub(crate) mod cleanup;
pub mod dehydrate;
pub mod summarize;

use crate::error::{Result, SummaryError};
use crate::ledger::Ledger;
use crate::types::{Event, PairKey, PairStatus};
use dehydrate::Dehydrator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use summarize::Summarizer;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Name of the summary artifact written inside each pair folder
const SUMMARY_ARTIFACT: &str = "summary.txt";

/// Executes the summary and dehydration stages over ledger entries
pub struct PostProcessor {
    summarizer: Arc<dyn Summarizer>,
    dehydrator: Arc<dyn Dehydrator>,
    event_tx: broadcast::Sender<Event>,
}

impl PostProcessor {
    pub(crate) fn new(
        summarizer: Arc<dyn Summarizer>,
        dehydrator: Arc<dyn Dehydrator>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            summarizer,
            dehydrator,
            event_tx,
        }
    }

    /// Summarize eligible entries, renaming folders and advancing the ledger
    ///
    /// Eligible are `downloaded` entries; with `resummarize` set, already
    /// summarized entries are re-extracted too. Returns how many entries
    /// were advanced or refreshed.
    pub async fn run(&self, ledger: &mut Ledger, resummarize: bool) -> Result<usize> {
        let eligible: Vec<(PairKey, PathBuf)> = ledger
            .entries()
            .filter(|(_, entry)| match entry.status {
                PairStatus::Downloaded => true,
                PairStatus::Summarized => resummarize,
                _ => false,
            })
            .filter_map(|(key, entry)| entry.folder.clone().map(|f| (key.clone(), f)))
            .collect();

        if eligible.is_empty() {
            debug!("no entries eligible for summarizing");
            return Ok(0);
        }
        info!(eligible = eligible.len(), resummarize, "summary phase starting");

        let mut processed = 0usize;
        for (key, folder) in eligible {
            match self.summarize_one(&key, &folder, resummarize).await {
                Ok(Some(new_folder)) => {
                    ledger.update(&key, |entry| {
                        entry.status = PairStatus::Summarized;
                        entry.folder = Some(new_folder);
                    })?;
                    self.event_tx
                        .send(Event::PairSummarized { key: key.clone() })
                        .ok();
                    processed += 1;
                    if processed % 50 == 0 {
                        info!(processed, "summaries progress");
                    }
                }
                Ok(None) => {
                    debug!(key = %key, "nothing to summarize in folder");
                }
                Err(e) => {
                    // Entry stays `downloaded`; a resummarize pass retries it
                    warn!(key = %key, error = %e, "summary extraction failed");
                }
            }
        }

        info!(processed, "summary phase complete");
        Ok(processed)
    }

    /// Mark files of downloaded/summarized entries offline-only
    ///
    /// An entry advances to `dehydrated` only when every file in its folder
    /// was marked successfully; partial failures are logged and the entry
    /// stays eligible for the next pass.
    pub async fn dehydrate(&self, ledger: &mut Ledger) -> Result<usize> {
        let eligible: Vec<(PairKey, PathBuf)> = ledger
            .entries()
            .filter(|(_, entry)| {
                matches!(
                    entry.status,
                    PairStatus::Downloaded | PairStatus::Summarized
                )
            })
            .filter_map(|(key, entry)| entry.folder.clone().map(|f| (key.clone(), f)))
            .collect();

        if eligible.is_empty() {
            debug!("no entries eligible for dehydration");
            return Ok(0);
        }
        info!(eligible = eligible.len(), "dehydration phase starting");

        let mut dehydrated = 0usize;
        for (key, folder) in eligible {
            let mut failures = 0usize;
            for file in folder_files(&folder).await {
                if let Err(e) = self.dehydrator.mark_offline_only(&file).await {
                    failures += 1;
                    warn!(key = %key, file = %file.display(), error = %e, "could not mark offline-only");
                }
            }
            if failures == 0 {
                ledger.advance(&key, PairStatus::Dehydrated)?;
                self.event_tx
                    .send(Event::PairDehydrated { key: key.clone() })
                    .ok();
                dehydrated += 1;
            }
        }

        info!(dehydrated, "dehydration phase complete");
        Ok(dehydrated)
    }

    /// Summarize one folder; returns the (possibly renamed) folder path, or
    /// `None` when the folder holds nothing summarizable
    async fn summarize_one(
        &self,
        key: &PairKey,
        folder: &Path,
        resummarize: bool,
    ) -> std::result::Result<Option<PathBuf>, SummaryError> {
        let artifact = folder.join(SUMMARY_ARTIFACT);
        if !resummarize && tokio::fs::metadata(&artifact).await.is_ok() {
            // A previous run already summarized this folder (e.g. it was
            // reclaimed by delta detection); just advance the ledger
            return Ok(Some(folder.to_path_buf()));
        }

        let Some(primary) = find_primary(folder).await else {
            return Ok(None);
        };

        let summary = self.summarizer.summarize(&primary).await?;

        let content = format!(
            "File ID: {}\nGroup: {}\n\n{}",
            key.id(),
            key.group(),
            summary.full_text
        );
        tokio::fs::write(&artifact, content).await.map_err(|e| {
            SummaryError::ExtractionFailed {
                path: artifact.clone(),
                reason: format!("could not write artifact: {e}"),
            }
        })?;

        Ok(Some(
            self.rename_with_snippet(key, folder, &summary.snippet, resummarize)
                .await,
        ))
    }

    /// Rename `<id>` to `<id> - <snippet>`; keeps the old path on any failure
    async fn rename_with_snippet(
        &self,
        key: &PairKey,
        folder: &Path,
        snippet: &str,
        resummarize: bool,
    ) -> PathBuf {
        let safe = crate::utils::sanitize_for_filename(snippet);
        if safe.is_empty() {
            return folder.to_path_buf();
        }

        let Some(name) = folder.file_name().and_then(|n| n.to_str()) else {
            return folder.to_path_buf();
        };
        let renameable = name == key.id()
            || (resummarize && name.starts_with(&format!("{} - ", key.id())));
        if !renameable {
            return folder.to_path_buf();
        }

        let Some(parent) = folder.parent() else {
            return folder.to_path_buf();
        };
        let new_path = parent.join(format!("{} - {}", key.id(), safe));
        if new_path == folder {
            return folder.to_path_buf();
        }

        match tokio::fs::rename(folder, &new_path).await {
            Ok(()) => new_path,
            Err(e) => {
                debug!(folder = %folder.display(), error = %e, "folder rename failed");
                folder.to_path_buf()
            }
        }
    }

}

/// First `.pdf` file in the folder, if any
async fn find_primary(folder: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(folder).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.to_ascii_lowercase().ends_with(".pdf") {
            return Some(entry.path());
        }
    }
    None
}

/// Flat file listing of a pair folder
async fn folder_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(folder).await else {
        return files;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.path());
        }
    }
    files.sort();
    files
}
