//! Fetch worker: drives one URL pair to a terminal state
//!
//! A worker owns its pair's folder exclusively for the duration of the
//! fetch; no two workers ever touch the same folder. The primary document
//! is fetched first (with retries for transient failures); only on primary
//! success are media candidates probed, in configured order, stopping at
//! the first hit. A pair with a primary but no media is not a valid unit
//! of the collection, so its folder is removed entirely rather than left
//! half-written where delta detection could mistake it for complete.

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::retry::fetch_with_retry;
use crate::types::{FetchOutcome, FetchResult, UrlPair};
use crate::utils::{encode_spaces, find_existing_folder, primary_extension, strip_extension};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything a fetch worker needs, shared read-only across the pool
#[derive(Clone)]
pub(crate) struct FetchContext {
    /// Authenticated HTTP client (cookies + user agent + timeout)
    pub client: reqwest::Client,
    /// Transient-failure retry policy
    pub retry: RetryConfig,
    /// Media extensions probed in order
    pub media_extensions: Vec<String>,
    /// Output root; the worker owns `<root>/<group>/<id>` only
    pub output_root: PathBuf,
}

/// Fetch one pair to completion and report the outcome
pub(crate) async fn fetch_pair(ctx: &FetchContext, pair: &UrlPair) -> FetchResult {
    let outcome = fetch_pair_inner(ctx, pair).await;
    FetchResult {
        key: pair.key.clone(),
        outcome,
    }
}

async fn fetch_pair_inner(ctx: &FetchContext, pair: &UrlPair) -> FetchOutcome {
    let group_dir = ctx.output_root.join(pair.key.group());
    // Reuse a folder renamed by an earlier summary pass, if one exists
    let folder = find_existing_folder(&group_dir, pair.key.id())
        .unwrap_or_else(|| group_dir.join(pair.key.id()));

    if let Err(e) = tokio::fs::create_dir_all(&folder).await {
        return FetchOutcome::Failed {
            reason: format!("could not create folder {}: {e}", folder.display()),
        };
    }

    // Primary document first; failure here aborts the pair with no media attempt
    let primary_ext = primary_extension(&pair.primary_url);
    let primary_path = folder.join(format!("{}.{primary_ext}", pair.key.id()));
    if let Err(e) = download_file(ctx, &pair.primary_url, &primary_path).await {
        warn!(key = %pair.key, error = %e, "primary fetch failed");
        return FetchOutcome::Failed {
            reason: e.to_string(),
        };
    }

    // Probe media candidates: the declared URL first, then sibling extensions
    match probe_media(ctx, pair, &folder).await {
        Some(media_extension) => {
            info!(key = %pair.key, media_extension, "pair downloaded");
            FetchOutcome::Downloaded {
                folder,
                media_extension,
            }
        }
        None => {
            info!(key = %pair.key, "no media candidate matched, removing folder");
            if let Err(e) = tokio::fs::remove_dir_all(&folder).await {
                warn!(folder = %folder.display(), error = %e, "could not remove folder");
            }
            FetchOutcome::SkippedNoMedia
        }
    }
}

/// Try the declared media URL, then each candidate extension against the
/// same base path, stopping at the first success. Returns the extension
/// that matched.
async fn probe_media(ctx: &FetchContext, pair: &UrlPair, folder: &Path) -> Option<String> {
    let declared_ext = media_url_extension(&pair.media_url, &ctx.media_extensions);

    let declared_path = folder.join(format!("{}.{declared_ext}", pair.key.id()));
    match download_file(ctx, &pair.media_url, &declared_path).await {
        Ok(()) => return Some(declared_ext),
        Err(e) => debug!(key = %pair.key, url = %pair.media_url, error = %e, "declared media URL missed"),
    }

    let base = strip_extension(&pair.media_url);
    for ext in &ctx.media_extensions {
        if *ext == declared_ext {
            continue;
        }
        let url = format!("{base}.{ext}");
        let path = folder.join(format!("{}.{ext}", pair.key.id()));
        match download_file(ctx, &url, &path).await {
            Ok(()) => return Some(ext.clone()),
            Err(e) => debug!(key = %pair.key, url, error = %e, "media candidate missed"),
        }
    }
    None
}

/// Extension the declared media URL will be saved under
fn media_url_extension(url: &str, candidates: &[String]) -> String {
    let ext = url
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext {
        Some(ext) if !ext.is_empty() => ext,
        _ => candidates
            .first()
            .cloned()
            .unwrap_or_else(|| "mov".to_string()),
    }
}

/// Download one file with retries, streaming through a temp sibling
///
/// An existing non-empty destination is treated as already downloaded (the
/// within-pair resume unit). Transient failures are retried under the
/// configured policy; 403/404 and empty bodies abort immediately.
async fn download_file(
    ctx: &FetchContext,
    url: &str,
    dest: &Path,
) -> Result<(), FetchError> {
    if let Ok(meta) = tokio::fs::metadata(dest).await {
        if meta.len() > 0 {
            debug!(dest = %dest.display(), "already on disk, skipping");
            return Ok(());
        }
    }

    let encoded = encode_spaces(url);
    fetch_with_retry(&ctx.retry, || attempt_download(ctx, &encoded, dest)).await
}

async fn attempt_download(
    ctx: &FetchContext,
    url: &str,
    dest: &Path,
) -> Result<(), FetchError> {
    let result = attempt_download_inner(ctx, url, dest).await;
    if result.is_err() {
        // Never leave a partial file where resume or delta detection
        // could mistake it for a completed download
        let _ = tokio::fs::remove_file(part_path(dest)).await;
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}

async fn attempt_download_inner(
    ctx: &FetchContext,
    url: &str,
    dest: &Path,
) -> Result<(), FetchError> {
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network {
            url: url.to_string(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let part = part_path(dest);
    let mut file = tokio::fs::File::create(&part)
        .await
        .map_err(|e| FetchError::Write {
            path: part.clone(),
            source: e,
        })?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Network {
            url: url.to_string(),
            source: e,
        })?;
        file.write_all(&chunk).await.map_err(|e| FetchError::Write {
            path: part.clone(),
            source: e,
        })?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| FetchError::Write {
        path: part.clone(),
        source: e,
    })?;
    drop(file);

    if written == 0 {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(FetchError::EmptyBody {
            url: url.to_string(),
        });
    }

    tokio::fs::rename(&part, dest)
        .await
        .map_err(|e| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        })
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
