//! # pair-dl
//!
//! Bulk download manager for paired documents (a primary file plus an
//! associated media file) from cookie-authenticated archives.
//!
//! ## Design Philosophy
//!
//! pair-dl is designed to be:
//! - **Resumable** - a persisted ledger makes re-invocation the universal
//!   recovery mechanism; interrupted runs pick up where they left off
//! - **Idempotent** - running twice with no external change performs no work
//!   the second time
//! - **Library-first** - the CLI is a thin wrapper; everything is a Rust
//!   crate for embedding
//! - **Event-driven** - consumers subscribe to progress events, no polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use pair_dl::{AcquireMode, Config, PairDownloader, RunOptions, SessionProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let provider = SessionProvider::new(
//!         config.auth.clone(),
//!         config.download.request_timeout,
//!     );
//!     let auth = provider.acquire(AcquireMode::Cached).await?;
//!
//!     let downloader = PairDownloader::new(config)?;
//!     let summary = downloader.run(&auth, RunOptions::default()).await?;
//!     println!("downloaded {} pairs", summary.downloaded);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Persisted progress ledger
pub mod ledger;
/// Post-processing pipeline (summaries, dehydration, cleanup)
pub mod post_processing;
/// Work-list resolution and delta detection
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Cookie-authenticated session acquisition
pub mod session;
/// Pair-list input (spreadsheet export / CSV)
pub mod source;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, RetryConfig};
pub use downloader::PairDownloader;
pub use error::{AuthError, Error, FetchError, Result, SourceError, SummaryError};
pub use ledger::Ledger;
pub use post_processing::dehydrate::{AttribDehydrator, Dehydrator, NoOpDehydrator};
pub use post_processing::summarize::{
    NoOpSummarizer, PdfTextSummarizer, Summarizer, Summary,
};
pub use session::{AcquireMode, AuthContext, CookieCapture, CookieSet, SessionProvider};
pub use types::{
    Event, FetchOutcome, FetchResult, LedgerEntry, PairKey, PairStatus, RunOptions, RunSummary,
    UrlPair,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Runs the full pipeline while listening for a termination signal; on
/// signal the downloader stops dispatching new pairs, lets in-flight
/// fetches finish, and persists their results before returning.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use pair_dl::{AcquireMode, Config, PairDownloader, RunOptions, SessionProvider};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let provider = SessionProvider::new(
///         config.auth.clone(),
///         config.download.request_timeout,
///     );
///     let auth = provider.acquire(AcquireMode::Cached).await?;
///     let downloader = PairDownloader::new(config)?;
///
///     // Run with automatic signal handling
///     pair_dl::run_with_shutdown(&downloader, &auth, RunOptions::default()).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    downloader: &PairDownloader,
    auth: &AuthContext,
    options: RunOptions,
) -> Result<RunSummary> {
    let cancel = downloader.cancel_token();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    });

    let summary = downloader.run(auth, options).await;
    signal_task.abort();
    summary
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
