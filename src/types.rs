//! Core types for pair-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable identity of a URL pair, derived from the primary URL
///
/// A key has two components: a `group` (the archive's dataset name, or the
/// source host when no dataset is recognizable) and an `id` (the primary
/// file's base name, assumed unique across the corpus). Keys render as
/// `group/id` and double as the on-disk layout: each pair's folder lives at
/// `<output_root>/<group>/<id>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PairKey {
    group: String,
    id: String,
}

impl PairKey {
    /// Create a key from its group and id components
    pub fn new(group: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            id: id.into(),
        }
    }

    /// The dataset / host grouping component
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The unique file id component
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.id)
    }
}

impl From<PairKey> for String {
    fn from(key: PairKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for PairKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.split_once('/') {
            Some((group, id)) if !group.is_empty() && !id.is_empty() => {
                Ok(Self::new(group, id))
            }
            _ => Err(format!("pair key {s:?} is not of the form group/id")),
        }
    }
}

impl std::str::FromStr for PairKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

/// A declared URL pair: one primary document plus one media candidate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPair {
    /// Stable key derived from the primary URL
    pub key: PairKey,
    /// URL of the primary document (typically a PDF)
    pub primary_url: String,
    /// Declared URL of the associated media file; the actual extension is
    /// resolved at fetch time by candidate probing
    pub media_url: String,
}

/// Terminal and intermediate states of a pair in the ledger
///
/// Transitions are strictly forward: `pending` is only re-entered through
/// an explicit force reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// Not yet attempted
    Pending,
    /// Primary and at least one media variant saved
    Downloaded,
    /// Primary fetched but no media candidate matched; folder removed
    SkippedNoMedia,
    /// Primary fetch itself failed after bounded retries
    Failed,
    /// Downloaded, and a summary was extracted and applied
    Summarized,
    /// Downloaded/summarized, and files were marked offline-only
    Dehydrated,
}

impl PairStatus {
    /// Whether this pair still needs a fetch attempt
    pub fn needs_fetch(&self) -> bool {
        matches!(self, PairStatus::Pending | PairStatus::Failed)
    }

    /// Whether the pair's files are complete on disk
    pub fn is_downloaded(&self) -> bool {
        matches!(
            self,
            PairStatus::Downloaded | PairStatus::Summarized | PairStatus::Dehydrated
        )
    }
}

impl std::fmt::Display for PairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PairStatus::Pending => "pending",
            PairStatus::Downloaded => "downloaded",
            PairStatus::SkippedNoMedia => "skipped_no_media",
            PairStatus::Failed => "failed",
            PairStatus::Summarized => "summarized",
            PairStatus::Dehydrated => "dehydrated",
        };
        f.write_str(s)
    }
}

/// One pair's durable record in the progress ledger
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Current status
    pub status: PairStatus,
    /// Resolved folder path, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,
    /// Media extension that matched during candidate probing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_extension: Option<String>,
    /// When this entry was last mutated
    pub updated_at: DateTime<Utc>,
    /// Failure reason, for `failed` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl LedgerEntry {
    /// Create a fresh entry in the given status, stamped now
    pub fn new(status: PairStatus) -> Self {
        Self {
            status,
            folder: None,
            media_extension: None,
            updated_at: Utc::now(),
            failure_reason: None,
        }
    }
}

/// Outcome of one fetch-worker attempt over a pair
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    /// Both files saved; records where and with which media extension
    Downloaded {
        /// The pair's folder on disk
        folder: PathBuf,
        /// The media extension that matched
        media_extension: String,
    },
    /// Primary fetched but no media candidate matched; folder was removed
    SkippedNoMedia,
    /// Primary fetch failed after bounded retries
    Failed {
        /// Why the primary fetch failed
        reason: String,
    },
}

impl FetchOutcome {
    /// The ledger status this outcome maps to
    pub fn status(&self) -> PairStatus {
        match self {
            FetchOutcome::Downloaded { .. } => PairStatus::Downloaded,
            FetchOutcome::SkippedNoMedia => PairStatus::SkippedNoMedia,
            FetchOutcome::Failed { .. } => PairStatus::Failed,
        }
    }
}

/// A completed fetch, as reported back to the ledger writer
#[derive(Clone, Debug)]
pub struct FetchResult {
    /// The pair this result belongs to
    pub key: PairKey,
    /// What happened
    pub outcome: FetchOutcome,
}

/// Per-run option flags (the command surface maps onto this)
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Reset declared pairs to `pending` and re-download everything
    pub force: bool,
    /// Resolve and report planned work without fetching
    pub dry_run: bool,
    /// Skip the summary phase after fetching
    pub skip_summaries: bool,
    /// Mark files offline-only after the run
    pub dehydrate: bool,
    /// Discard the cached pair list and re-fetch it
    pub refresh_urls: bool,
}

/// End-of-run accounting, reported to the caller and logged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Pairs declared in the input list (after limit)
    pub declared: usize,
    /// Pairs already complete before this run (resume + delta detection)
    pub already_complete: usize,
    /// Pairs fetched to `downloaded` this run
    pub downloaded: usize,
    /// Pairs ending `skipped_no_media` this run
    pub skipped_no_media: usize,
    /// Pairs ending `failed` this run
    pub failed: usize,
    /// Pairs summarized in the post-processing phase
    pub summarized: usize,
    /// Pairs dehydrated in the post-processing phase
    pub dehydrated: usize,
    /// Empty directories removed during final cleanup
    pub dirs_removed: usize,
}

impl RunSummary {
    /// True when at least one pair failed its primary fetch
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Progress events broadcast by the orchestrator
///
/// Consumers subscribe via [`crate::PairDownloader::subscribe`]; dropping
/// the receiver is always safe.
#[derive(Clone, Debug)]
pub enum Event {
    /// A fetch worker picked up a pair
    PairStarted {
        /// The pair being fetched
        key: PairKey,
    },
    /// A fetch worker finished a pair and the ledger was persisted
    PairFinished {
        /// The pair that finished
        key: PairKey,
        /// Its new status
        status: PairStatus,
    },
    /// All fetch workers drained
    FetchPhaseComplete {
        /// Pairs downloaded this run
        downloaded: usize,
        /// Pairs skipped for missing media this run
        skipped: usize,
        /// Pairs failed this run
        failed: usize,
    },
    /// A pair was summarized and its folder renamed
    PairSummarized {
        /// The summarized pair
        key: PairKey,
    },
    /// A pair's files were marked offline-only
    PairDehydrated {
        /// The dehydrated pair
        key: PairKey,
    },
    /// The run finished; final summary attached
    RunComplete {
        /// End-of-run accounting
        summary: RunSummary,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_renders_as_group_slash_id() {
        let key = PairKey::new("DataSet_9", "EFTA-00012345");
        assert_eq!(key.to_string(), "DataSet_9/EFTA-00012345");
    }

    #[test]
    fn pair_key_round_trips_through_string() {
        let key = PairKey::new("DataSet_9", "EFTA-00012345");
        let s: String = key.clone().into();
        let back = PairKey::try_from(s).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn pair_key_rejects_missing_separator() {
        assert!(PairKey::try_from("no-separator".to_string()).is_err());
        assert!(PairKey::try_from("/leading".to_string()).is_err());
        assert!(PairKey::try_from("trailing/".to_string()).is_err());
    }

    #[test]
    fn pair_key_serializes_as_json_string() {
        let key = PairKey::new("justice_gov", "doc-1");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"justice_gov/doc-1\"");
    }

    #[test]
    fn needs_fetch_only_for_pending_and_failed() {
        assert!(PairStatus::Pending.needs_fetch());
        assert!(PairStatus::Failed.needs_fetch());
        assert!(!PairStatus::Downloaded.needs_fetch());
        assert!(!PairStatus::SkippedNoMedia.needs_fetch());
        assert!(!PairStatus::Summarized.needs_fetch());
        assert!(!PairStatus::Dehydrated.needs_fetch());
    }

    #[test]
    fn downloaded_includes_later_statuses() {
        assert!(PairStatus::Downloaded.is_downloaded());
        assert!(PairStatus::Summarized.is_downloaded());
        assert!(PairStatus::Dehydrated.is_downloaded());
        assert!(!PairStatus::SkippedNoMedia.is_downloaded());
        assert!(!PairStatus::Pending.is_downloaded());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&PairStatus::SkippedNoMedia).unwrap();
        assert_eq!(json, "\"skipped_no_media\"");
    }

    #[test]
    fn fetch_outcome_maps_to_status() {
        let outcome = FetchOutcome::Downloaded {
            folder: PathBuf::from("/out/g/id"),
            media_extension: "mov".into(),
        };
        assert_eq!(outcome.status(), PairStatus::Downloaded);
        assert_eq!(
            FetchOutcome::SkippedNoMedia.status(),
            PairStatus::SkippedNoMedia
        );
        assert_eq!(
            FetchOutcome::Failed {
                reason: "x".into()
            }
            .status(),
            PairStatus::Failed
        );
    }

    #[test]
    fn run_summary_failure_flag() {
        let mut summary = RunSummary::default();
        assert!(!summary.has_failures());
        summary.failed = 1;
        assert!(summary.has_failures());
    }
}
