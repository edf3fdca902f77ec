//! Summary extraction capability
//!
//! Text extraction from the primary document is an external capability
//! behind the [`Summarizer`] trait: the default implementation shells out
//! to a `pdftotext` binary discovered on PATH, and a no-op stands in when
//! no backend is available so that entries stay retryable.

use crate::config::PostProcessConfig;
use crate::error::SummaryError;
use crate::utils::collapse_whitespace;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long a single extraction may run before being abandoned
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Extracted summary text for one primary document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    /// Short filesystem-safe candidate for the folder-name suffix
    pub snippet: String,
    /// Longer text written into the summary artifact
    pub full_text: String,
}

/// Pluggable first-pages text extraction over a document file
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Extract a summary from the primary document's first pages
    async fn summarize(&self, primary: &Path) -> Result<Summary, SummaryError>;
}

/// Summarizer backed by a `pdftotext` command-line binary
pub struct PdfTextSummarizer {
    binary: PathBuf,
    page_limit: usize,
    max_snippet_len: usize,
    max_summary_len: usize,
}

impl PdfTextSummarizer {
    /// Use an explicit binary path
    pub fn new(binary: PathBuf, config: &PostProcessConfig) -> Self {
        Self {
            binary,
            page_limit: config.summary_page_limit.max(1),
            max_snippet_len: config.max_snippet_len,
            max_summary_len: config.max_summary_len,
        }
    }

    /// Discover `pdftotext` on PATH
    pub fn discover(config: &PostProcessConfig) -> Option<Self> {
        let binary = which::which("pdftotext").ok()?;
        debug!(binary = %binary.display(), "found pdftotext");
        Some(Self::new(binary, config))
    }
}

#[async_trait]
impl Summarizer for PdfTextSummarizer {
    async fn summarize(&self, primary: &Path) -> Result<Summary, SummaryError> {
        let run = tokio::process::Command::new(&self.binary)
            .arg("-q")
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(self.page_limit.to_string())
            .arg(primary)
            .arg("-")
            .output();

        let output = tokio::time::timeout(EXTRACTION_TIMEOUT, run)
            .await
            .map_err(|_| SummaryError::ExtractionFailed {
                path: primary.to_path_buf(),
                reason: format!("timed out after {}s", EXTRACTION_TIMEOUT.as_secs()),
            })?
            .map_err(|e| SummaryError::ExtractionFailed {
                path: primary.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SummaryError::ExtractionFailed {
                path: primary.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let clean = collapse_whitespace(&text);
        if clean.is_empty() {
            return Err(SummaryError::NoText {
                path: primary.to_path_buf(),
            });
        }

        Ok(Summary {
            snippet: truncate_at_word(&clean, self.max_snippet_len),
            full_text: clean.chars().take(self.max_summary_len).collect(),
        })
    }
}

/// Summarizer that always reports itself unavailable
///
/// Entries keep their `downloaded` status and are picked up again once a
/// real backend exists (or on a resummarize pass).
pub struct NoOpSummarizer;

#[async_trait]
impl Summarizer for NoOpSummarizer {
    async fn summarize(&self, primary: &Path) -> Result<Summary, SummaryError> {
        let _ = primary;
        Err(SummaryError::Unavailable(
            "install pdftotext (poppler-utils) or attach a summarizer".to_string(),
        ))
    }
}

/// Pick the best available summarizer for this environment
pub(crate) fn discover(config: &PostProcessConfig) -> Arc<dyn Summarizer> {
    match PdfTextSummarizer::discover(config) {
        Some(summarizer) => Arc::new(summarizer),
        None => {
            warn!("pdftotext not found on PATH, summaries will be skipped");
            Arc::new(NoOpSummarizer)
        }
    }
}

/// Truncate to at most `max` characters, preferring a word boundary once
/// the cut would land mid-word (but never shortening below 20 characters)
fn truncate_at_word(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.trim().to_string();
    }
    let cut: String = text.chars().take(max).collect();
    let trimmed = cut.trim_end();
    match trimmed.rfind(' ') {
        Some(idx) if idx > 20 => trimmed[..idx].to_string(),
        _ => trimmed.to_string(),
    }
}
