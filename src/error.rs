//! Error types for pair-dl
//!
//! This module provides the error taxonomy for the library:
//! - Setup-level errors that abort a run before any fetch is dispatched
//!   (authentication, unreadable pair list)
//! - Per-pair fetch errors, classified transient vs. permanent for the
//!   retry policy in [`crate::retry`]
//! - Non-fatal post-processing errors (summary extraction, dehydration)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pair-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pair-dl
///
/// Setup-level variants (`Auth`, `Source`, `Config`) are fatal to a run.
/// Everything else is scoped to a single pair or a single post-processing
/// step and is recorded in the ledger rather than propagated.
#[derive(Debug, Error)]
pub enum Error {
    /// Session acquisition or validation failed
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Pair-list input could not be loaded or parsed
    #[error("pair source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Single-file fetch failed (status, empty body, network, or disk write)
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Summary extraction failed for a downloaded pair
    #[error("summary error: {0}")]
    Summary(#[from] SummaryError),

    /// Offline-only marking failed (best-effort, logged and non-fatal)
    #[error("dehydration error for {path}: {reason}")]
    Dehydration {
        /// The file that could not be marked offline-only
        path: PathBuf,
        /// The reason the marking failed
        reason: String,
    },

    /// Progress ledger could not be read or written
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Shutdown in progress - not dispatching new pairs
    #[error("shutdown in progress: not dispatching new pairs")]
    ShuttingDown,

    /// Network error outside a per-file fetch (e.g. spreadsheet export)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Session acquisition and validation errors
///
/// All variants are fatal: the orchestrator never dispatches a fetch
/// without a validated session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No cookie cache exists and the run is non-interactive
    #[error("no cached session at {path} and interactive acquisition is disabled")]
    CacheMissing {
        /// The cookie cache path that was checked
        path: PathBuf,
    },

    /// The cached or supplied session failed the validation probe
    #[error("session rejected by validation probe: {reason}")]
    Invalid {
        /// Why the probe considered the session invalid
        reason: String,
    },

    /// The interactive capture capability is not available
    #[error("assisted cookie capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Cookie cache exists but cannot be parsed
    #[error("cookie cache at {path} is unreadable: {reason}")]
    CacheUnreadable {
        /// The cookie cache path
        path: PathBuf,
        /// Parse or I/O failure detail
        reason: String,
    },
}

/// Pair-list input errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Neither a sheet id, a sheet URL, nor a local CSV was supplied
    #[error("no pair source configured: supply a sheet id, sheet URL, or CSV path")]
    NoSource,

    /// The spreadsheet export could not be fetched
    #[error("could not fetch spreadsheet export for sheet {sheet_id}: {reason}")]
    ExportFailed {
        /// The sheet id that was requested
        sheet_id: String,
        /// The underlying failure
        reason: String,
    },

    /// A sheet id could not be extracted from the supplied URL
    #[error("could not extract a sheet id from URL: {url}")]
    BadSheetUrl {
        /// The URL that did not match the expected spreadsheet form
        url: String,
    },

    /// A required column header was not found in the input
    #[error("column {column:?} not found in pair list header")]
    MissingColumn {
        /// The configured column name that was absent
        column: String,
    },

    /// The input parsed but contained no usable pairs
    #[error("pair list contains no rows with both URLs present")]
    Empty,

    /// CSV-level parse failure
    #[error("could not parse pair list: {0}")]
    Parse(#[from] csv::Error),
}

/// Single-file fetch errors, classified for the retry policy
///
/// `Status` with a 5xx/408/429 code and most `Network` failures are
/// transient; everything else is permanent for the requesting URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status {
        /// The HTTP status code received
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Server answered 2xx but the body was empty
    #[error("empty response body from {url}")]
    EmptyBody {
        /// The URL that returned an empty body
        url: String,
    },

    /// Transport-level failure (connect, timeout, interrupted body)
    #[error("network failure for {url}: {source}")]
    Network {
        /// The URL that was requested
        url: String,
        /// The underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// Could not write the response to disk
    #[error("could not write {path}: {source}")]
    Write {
        /// The destination path being written
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// HTTP status of the failure, if it was a status failure
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Summary extraction errors (non-fatal, entry stays retryable)
#[derive(Debug, Error)]
pub enum SummaryError {
    /// No text-extraction backend is available
    #[error("no summarizer available: {0}")]
    Unavailable(String),

    /// The extraction tool ran but failed
    #[error("extraction failed for {path}: {reason}")]
    ExtractionFailed {
        /// The primary file being summarized
        path: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// The primary file yielded no extractable text
    #[error("no extractable text in {path}")]
    NoText {
        /// The primary file that contained no text
        path: PathBuf,
    },
}
