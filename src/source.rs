//! Pair-list input: spreadsheet export, local CSV, and the on-disk cache
//!
//! The declared URL pairs arrive as tabular data with two named columns.
//! Load precedence is: explicit local CSV, then the cached copy of a
//! previous spreadsheet fetch, then a fresh spreadsheet export (which is
//! cached for the next run).

use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::types::{PairKey, UrlPair};
use crate::utils::derive_pair_key;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};

const SHEET_EXPORT_BASE: &str = "https://docs.google.com/spreadsheets/d";

/// Timeout for the spreadsheet export fetch; separate from per-file fetch
/// timeouts because the export is small
const EXPORT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

static SHEET_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)")
        .unwrap_or_else(|e| panic!("invalid sheet url regex: {e}"))
});

/// Extract a spreadsheet id from a full sheet URL
pub fn extract_sheet_id(url: &str) -> std::result::Result<String, SourceError> {
    SHEET_URL_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| SourceError::BadSheetUrl {
            url: url.to_string(),
        })
}

/// Load the declared pair list according to the configured precedence
///
/// With `refresh` set, a cached spreadsheet export is discarded first so
/// the list is re-fetched.
pub async fn load_pairs(config: &SourceConfig, refresh: bool) -> Result<Vec<UrlPair>> {
    if refresh && config.csv_path.is_none() && config.cache_path.exists() {
        std::fs::remove_file(&config.cache_path)?;
        info!(cache = %config.cache_path.display(), "cleared pair-list cache, will re-fetch");
    }

    // 1) Explicit local CSV
    if let Some(path) = &config.csv_path {
        info!(path = %path.display(), "reading pair list from local CSV");
        return read_pairs_file(path, config);
    }

    // 2) Cached export from a previous fetch
    if config.cache_path.exists() {
        info!(path = %config.cache_path.display(), "using cached pair list");
        return read_pairs_file(&config.cache_path, config);
    }

    // 3) Fresh spreadsheet export
    let Some(sheet_id) = &config.sheet_id else {
        return Err(SourceError::NoSource.into());
    };
    let url = format!("{SHEET_EXPORT_BASE}/{sheet_id}/export?format=csv");
    info!(sheet_id, "fetching pair list from spreadsheet export");
    let text = fetch_export(&url, sheet_id).await?;

    if let Some(parent) = config.cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&config.cache_path, &text)?;

    let pairs = parse_pairs(&text, &config.primary_column, &config.media_column)?;
    info!(
        count = pairs.len(),
        cache = %config.cache_path.display(),
        "loaded pair list from spreadsheet"
    );
    Ok(pairs)
}

/// Fetch the CSV export body for a spreadsheet
pub(crate) async fn fetch_export(
    url: &str,
    sheet_id: &str,
) -> std::result::Result<String, SourceError> {
    let client = reqwest::Client::builder()
        .timeout(EXPORT_FETCH_TIMEOUT)
        .build()
        .map_err(|e| SourceError::ExportFailed {
            sheet_id: sheet_id.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| SourceError::ExportFailed {
            sheet_id: sheet_id.to_string(),
            reason: e.to_string(),
        })?;

    response.text().await.map_err(|e| SourceError::ExportFailed {
        sheet_id: sheet_id.to_string(),
        reason: e.to_string(),
    })
}

fn read_pairs_file(path: &Path, config: &SourceConfig) -> Result<Vec<UrlPair>> {
    let text = std::fs::read_to_string(path)?;
    let pairs = parse_pairs(&text, &config.primary_column, &config.media_column)?;
    info!(count = pairs.len(), path = %path.display(), "loaded pair list");
    Ok(pairs)
}

/// Parse CSV text into the declared pair list
///
/// Rows missing either URL are skipped. Duplicate keys would collide in the
/// ledger, so only the first occurrence of a key is kept.
pub(crate) fn parse_pairs(
    text: &str,
    primary_column: &str,
    media_column: &str,
) -> std::result::Result<Vec<UrlPair>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let primary_idx = column_index(&headers, primary_column)?;
    let media_idx = column_index(&headers, media_column)?;

    let mut seen: HashSet<PairKey> = HashSet::new();
    let mut pairs = Vec::new();

    for record in reader.records() {
        let record = record?;
        let primary = record.get(primary_idx).unwrap_or("").trim();
        let media = record.get(media_idx).unwrap_or("").trim();
        if primary.is_empty() || media.is_empty() {
            continue;
        }

        let key = derive_pair_key(primary);
        if !seen.insert(key.clone()) {
            warn!(%key, "duplicate pair key in input, keeping first occurrence");
            continue;
        }

        pairs.push(UrlPair {
            key,
            primary_url: primary.to_string(),
            media_url: media.to_string(),
        });
    }

    if pairs.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(pairs)
}

fn column_index(
    headers: &csv::StringRecord,
    column: &str,
) -> std::result::Result<usize, SourceError> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| SourceError::MissingColumn {
            column: column.to_string(),
        })
}
