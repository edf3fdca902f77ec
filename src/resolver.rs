//! Work-list resolution: ledger reconciliation and on-disk delta detection
//!
//! Resolution reconciles three inputs — the declared pair list, the ledger,
//! and the existing output tree — into the actual work list for a run. The
//! filesystem scan runs once here, producing synthesized ledger entries;
//! nothing later in the run queries the disk to decide what to fetch.

use crate::error::Result;
use crate::ledger::Ledger;
use crate::types::{LedgerEntry, PairStatus, UrlPair};
use crate::utils::{find_existing_folder, primary_extension};
use std::path::Path;
use tracing::{debug, info};

/// Outcome of work-list resolution
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// Pairs to fetch this run, in declared order
    pub work: Vec<UrlPair>,
    /// Declared pairs already complete (resumed or reclaimed)
    pub already_complete: usize,
    /// Subset of `already_complete` reclaimed from the disk scan alone
    pub reclaimed: usize,
}

/// Reconcile the declared pairs against the ledger and the output tree
///
/// With `force`, ledger records for the declared keys are dropped first and
/// every declared pair is scheduled, in order. Otherwise pairs with a
/// terminal fetch status are skipped, pairs whose complete folder survives
/// on disk (but whose ledger record was lost) are reclassified as
/// `downloaded` without network access, and the remaining `pending` /
/// `failed` pairs form the work list in declared order.
///
/// Resolution is idempotent: an unchanged ledger and filesystem yield the
/// same work list, in the same order.
pub fn resolve(
    declared: &[UrlPair],
    ledger: &mut Ledger,
    output_root: &Path,
    media_extensions: &[String],
    force: bool,
) -> Result<Resolution> {
    if force {
        let keys: Vec<_> = declared.iter().map(|p| p.key.clone()).collect();
        let removed = ledger.reset(&keys)?;
        info!(removed, "force: cleared ledger records for declared pairs");
        return Ok(Resolution {
            work: declared.to_vec(),
            already_complete: 0,
            reclaimed: 0,
        });
    }

    let mut resolution = Resolution::default();

    for pair in declared {
        if let Some(entry) = ledger.get(&pair.key) {
            if !entry.status.needs_fetch() {
                resolution.already_complete += 1;
                continue;
            }
        }

        // Delta detection: a complete folder on disk means a previous run
        // (or a rebuilt machine) already fetched this pair, even if the
        // ledger record was lost.
        let group_dir = output_root.join(pair.key.group());
        if let Some(folder) = find_existing_folder(&group_dir, pair.key.id()) {
            if let Some(media_ext) =
                complete_folder_media(&folder, &primary_extension(&pair.primary_url), media_extensions)
            {
                debug!(key = %pair.key, folder = %folder.display(), "reclaimed complete folder from disk");
                let mut entry = LedgerEntry::new(PairStatus::Downloaded);
                entry.folder = Some(folder);
                entry.media_extension = Some(media_ext);
                ledger.record(pair.key.clone(), entry)?;
                resolution.already_complete += 1;
                resolution.reclaimed += 1;
                continue;
            }
        }

        resolution.work.push(pair.clone());
    }

    info!(
        declared = declared.len(),
        already_complete = resolution.already_complete,
        reclaimed = resolution.reclaimed,
        to_fetch = resolution.work.len(),
        "work list resolved"
    );
    Ok(resolution)
}

/// Check a folder for a complete pair: a primary file plus any recognized
/// media extension. Returns the media extension found.
///
/// A folder missing either file is not complete — it must never shadow a
/// re-fetch, because a half-written folder mistaken for `downloaded` would
/// corrupt resume semantics.
fn complete_folder_media(
    folder: &Path,
    primary_ext: &str,
    media_extensions: &[String],
) -> Option<String> {
    let entries = std::fs::read_dir(folder).ok()?;
    let mut has_primary = false;
    let mut media_ext: Option<String> = None;

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some((_, ext)) = name.rsplit_once('.') else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext == primary_ext {
            has_primary = true;
        } else if media_ext.is_none() && media_extensions.iter().any(|m| *m == ext) {
            media_ext = Some(ext);
        }
    }

    if has_primary { media_ext } else { None }
}
