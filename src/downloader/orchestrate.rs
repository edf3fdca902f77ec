//! Run orchestration: worker pool dispatch and ledger aggregation
//!
//! The fetch phase runs a fixed-size pool of workers over the resolved
//! work list. Workers return results over a channel to a single
//! aggregating owner, which applies each result to the ledger and persists
//! it before accepting the next — bounding crash loss to the in-flight
//! batch. Cancellation stops dispatch between pairs; in-flight fetches
//! finish naturally and their results are still persisted.

use super::PairDownloader;
use super::fetch::{self, FetchContext};
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::post_processing::cleanup;
use crate::resolver::{self, Resolution};
use crate::session::AuthContext;
use crate::source;
use crate::types::{Event, FetchOutcome, RunOptions, RunSummary, UrlPair};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{info, warn};

/// Per-run fetch-phase tallies
#[derive(Clone, Copy, Debug, Default)]
struct FetchPhaseStats {
    downloaded: usize,
    skipped_no_media: usize,
    failed: usize,
}

impl PairDownloader {
    /// Run the full pipeline: load pairs, resolve work, fetch on the pool,
    /// post-process, clean up
    ///
    /// With `options.dry_run` the pipeline stops after resolution and only
    /// reports the planned work. Per-pair failures never abort the run;
    /// they are counted in the returned [`RunSummary`].
    pub async fn run(&self, auth: &AuthContext, options: RunOptions) -> Result<RunSummary> {
        let declared = self.load_declared(options.refresh_urls).await?;
        let mut ledger = Ledger::load(&self.config.download.ledger_path);

        if options.dry_run {
            return self.dry_run(&declared, &mut ledger, options);
        }

        let resolution = resolver::resolve(
            &declared,
            &mut ledger,
            &self.config.download.output_dir,
            &self.config.download.media_extensions,
            options.force,
        )?;

        let stats = self.fetch_phase(auth, resolution.work, &mut ledger).await?;
        self.event_tx
            .send(Event::FetchPhaseComplete {
                downloaded: stats.downloaded,
                skipped: stats.skipped_no_media,
                failed: stats.failed,
            })
            .ok();

        let mut summarized = 0;
        if self.config.post.summarize && !options.skip_summaries {
            summarized = self.post_processor().run(&mut ledger, false).await?;
        }

        let mut dehydrated = 0;
        if options.dehydrate {
            info!(
                wait_secs = self.config.post.dehydrate_wait.as_secs(),
                "waiting for the sync client before dehydrating"
            );
            tokio::time::sleep(self.config.post.dehydrate_wait).await;
            dehydrated = self.post_processor().dehydrate(&mut ledger).await?;
        }

        let dirs_removed = cleanup::remove_empty_dirs(&self.config.download.output_dir).await?;

        let summary = RunSummary {
            declared: declared.len(),
            already_complete: resolution.already_complete,
            downloaded: stats.downloaded,
            skipped_no_media: stats.skipped_no_media,
            failed: stats.failed,
            summarized,
            dehydrated,
            dirs_removed,
        };
        info!(
            declared = summary.declared,
            already_complete = summary.already_complete,
            downloaded = summary.downloaded,
            skipped_no_media = summary.skipped_no_media,
            failed = summary.failed,
            summarized = summary.summarized,
            dehydrated = summary.dehydrated,
            "run complete"
        );
        self.event_tx.send(Event::RunComplete { summary }).ok();
        Ok(summary)
    }

    async fn load_declared(&self, refresh_urls: bool) -> Result<Vec<UrlPair>> {
        let mut declared = source::load_pairs(&self.config.source, refresh_urls).await?;
        let limit = self.config.download.limit;
        if limit > 0 && declared.len() > limit {
            declared.truncate(limit);
            info!(limit, "limited to the first pairs of the declared list");
        }
        Ok(declared)
    }

    /// Resolution-only pass: reconciles the ledger against disk (no
    /// network, no folder changes) and reports what a real run would fetch
    fn dry_run(
        &self,
        declared: &[UrlPair],
        ledger: &mut Ledger,
        options: RunOptions,
    ) -> Result<RunSummary> {
        let resolution = if options.force {
            // A forced dry run plans the full list but must not reset the ledger
            Resolution {
                work: declared.to_vec(),
                already_complete: 0,
                reclaimed: 0,
            }
        } else {
            resolver::resolve(
                declared,
                ledger,
                &self.config.download.output_dir,
                &self.config.download.media_extensions,
                false,
            )?
        };

        for pair in &resolution.work {
            info!(key = %pair.key, primary = %pair.primary_url, "would fetch");
        }
        info!(
            declared = declared.len(),
            already_complete = resolution.already_complete,
            planned = resolution.work.len(),
            "dry run complete, nothing fetched"
        );

        Ok(RunSummary {
            declared: declared.len(),
            already_complete: resolution.already_complete,
            ..RunSummary::default()
        })
    }

    /// Drive the worker pool over the work list, aggregating results into
    /// the ledger under a single-writer discipline
    async fn fetch_phase(
        &self,
        auth: &AuthContext,
        work: Vec<UrlPair>,
        ledger: &mut Ledger,
    ) -> Result<FetchPhaseStats> {
        let mut stats = FetchPhaseStats::default();
        if work.is_empty() {
            info!("nothing to fetch");
            return Ok(stats);
        }

        let total = work.len();
        let workers = self.config.download.workers;
        info!(total, workers, "fetch phase starting");

        let ctx = FetchContext {
            client: auth.client().clone(),
            retry: self.config.retry.clone(),
            media_extensions: self.config.download.media_extensions.clone(),
            output_root: self.config.download.output_dir.clone(),
        };

        let semaphore = Arc::new(Semaphore::new(workers));
        let (result_tx, mut result_rx) = mpsc::channel(workers.max(1));
        let cancel = self.cancel.clone();
        let event_tx = self.event_tx.clone();

        let dispatcher = tokio::spawn(async move {
            let mut dispatched = 0usize;
            for pair in work {
                if cancel.is_cancelled() {
                    info!("cancellation requested, dispatch stopped");
                    break;
                }
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let ctx = ctx.clone();
                let result_tx = result_tx.clone();
                let event_tx = event_tx.clone();
                dispatched += 1;
                tokio::spawn(async move {
                    let _permit = permit;
                    event_tx
                        .send(Event::PairStarted {
                            key: pair.key.clone(),
                        })
                        .ok();
                    let result = fetch::fetch_pair(&ctx, &pair).await;
                    // The aggregator may already be gone on hard failure
                    result_tx.send(result).await.ok();
                });
            }
            dispatched
        });

        // Single writer: each result is persisted before the next is accepted
        let mut completed = 0usize;
        while let Some(result) = result_rx.recv().await {
            completed += 1;
            match &result.outcome {
                FetchOutcome::Downloaded { .. } => stats.downloaded += 1,
                FetchOutcome::SkippedNoMedia => stats.skipped_no_media += 1,
                FetchOutcome::Failed { reason } => {
                    stats.failed += 1;
                    warn!(key = %result.key, reason, "pair failed");
                }
            }
            let status = result.outcome.status();
            ledger.record_outcome(result.key.clone(), &result.outcome)?;
            self.event_tx
                .send(Event::PairFinished {
                    key: result.key,
                    status,
                })
                .ok();

            if completed % 10 == 0 || completed == total {
                info!(
                    completed,
                    total,
                    downloaded = stats.downloaded,
                    skipped = stats.skipped_no_media,
                    failed = stats.failed,
                    "fetch progress"
                );
            }
        }

        let dispatched = dispatcher
            .await
            .map_err(|e| Error::Other(format!("dispatcher task failed: {e}")))?;
        info!(
            dispatched,
            completed,
            downloaded = stats.downloaded,
            skipped = stats.skipped_no_media,
            failed = stats.failed,
            "fetch phase drained"
        );
        Ok(stats)
    }
}
