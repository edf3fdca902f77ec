//! Core downloader implementation split into focused submodules.
//!
//! The [`PairDownloader`] struct and its methods are organized by domain:
//! - [`fetch`] - per-pair fetch execution (primary + media probing)
//! - [`orchestrate`] - worker pool dispatch and ledger aggregation

pub(crate) mod fetch;
mod orchestrate;

use crate::config::Config;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::post_processing::{PostProcessor, dehydrate::Dehydrator, summarize::Summarizer};
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Capacity of the progress event channel; slow subscribers lag rather
/// than block the run
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main downloader instance (cloneable - all fields are shared handles)
///
/// Drives the full pipeline: pair-list resolution, the bounded fetch pool,
/// ledger aggregation, post-processing, and final cleanup. The
/// authenticated session is passed into [`run`](PairDownloader::run) by
/// reference; post-processing-only operations need no session at all.
#[derive(Clone)]
pub struct PairDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cooperative cancellation: stops dispatch, lets in-flight pairs finish
    pub(crate) cancel: CancellationToken,
    /// Summary extraction capability (trait object for pluggable backends)
    pub(crate) summarizer: Arc<dyn Summarizer>,
    /// Offline-only marking capability (trait object for pluggable backends)
    pub(crate) dehydrator: Arc<dyn Dehydrator>,
}

impl PairDownloader {
    /// Create a downloader with default capabilities
    ///
    /// The summarizer is discovered from the environment (`pdftotext` on
    /// PATH) and falls back to a no-op that leaves entries retryable; the
    /// dehydrator shells out to the platform attribute tool.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let summarizer = crate::post_processing::summarize::discover(&config.post);
        let dehydrator: Arc<dyn Dehydrator> =
            Arc::new(crate::post_processing::dehydrate::AttribDehydrator::new());
        Ok(Self {
            config: Arc::new(config),
            event_tx: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            cancel: CancellationToken::new(),
            summarizer,
            dehydrator,
        })
    }

    /// Replace the summary extraction capability
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Replace the offline-only marking capability
    pub fn with_dehydrator(mut self, dehydrator: Arc<dyn Dehydrator>) -> Self {
        self.dehydrator = dehydrator;
        self
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token observed between pair dispatches; cancel it to wind the run
    /// down without losing in-flight results
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a graceful stop: no new pairs are dispatched, in-flight
    /// fetches finish and their results are persisted
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.cancel.cancel();
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Re-extract summaries for all downloaded pairs without any fetching
    ///
    /// Works entirely from the ledger; no session is required. Folders that
    /// already carry a summary suffix are renamed again from the fresh
    /// extraction.
    pub async fn resummarize(&self) -> Result<usize> {
        let mut ledger = Ledger::load(&self.config.download.ledger_path);
        let processor = self.post_processor();
        let summarized = processor.run(&mut ledger, true).await?;
        info!(summarized, "resummarize pass complete");
        Ok(summarized)
    }

    /// Mark all downloaded pairs' files offline-only without any fetching
    pub async fn dehydrate_only(&self) -> Result<usize> {
        let mut ledger = Ledger::load(&self.config.download.ledger_path);
        let processor = self.post_processor();
        let dehydrated = processor.dehydrate(&mut ledger).await?;
        info!(dehydrated, "dehydrate pass complete");
        Ok(dehydrated)
    }

    pub(crate) fn post_processor(&self) -> PostProcessor {
        PostProcessor::new(
            Arc::clone(&self.summarizer),
            Arc::clone(&self.dehydrator),
            self.event_tx.clone(),
        )
    }
}

impl std::fmt::Debug for PairDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairDownloader")
            .field("output_dir", &self.config.download.output_dir)
            .field("workers", &self.config.download.workers)
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
