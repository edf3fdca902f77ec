//! Offline-only marking capability ("dehydration")
//!
//! On a sync-mounted drive, files can be evicted locally once uploaded.
//! The OS-level mechanism is an external capability behind the
//! [`Dehydrator`] trait; the default implementation shells out to the
//! platform attribute tool and treats every failure as best-effort.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Per-file timeout for the attribute tool
const MARK_TIMEOUT: Duration = Duration::from_secs(10);

/// Pluggable "mark as online-only / evict local copy" operation
#[async_trait]
pub trait Dehydrator: Send + Sync {
    /// Mark one file offline-only; best-effort
    async fn mark_offline_only(&self, path: &Path) -> Result<()>;
}

/// Dehydrator shelling out to `attrib +U -P` (Windows sync clients)
///
/// On platforms without `attrib` the spawn fails and the error is reported
/// to the caller, which logs and moves on.
pub struct AttribDehydrator;

impl AttribDehydrator {
    /// Create the platform-attribute dehydrator
    pub fn new() -> Self {
        Self
    }
}

impl Default for AttribDehydrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dehydrator for AttribDehydrator {
    async fn mark_offline_only(&self, path: &Path) -> Result<()> {
        let run = tokio::process::Command::new("attrib")
            .arg("+U")
            .arg("-P")
            .arg(path)
            .output();

        let output = tokio::time::timeout(MARK_TIMEOUT, run)
            .await
            .map_err(|_| Error::Dehydration {
                path: path.to_path_buf(),
                reason: format!("timed out after {}s", MARK_TIMEOUT.as_secs()),
            })?
            .map_err(|e| Error::Dehydration {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Dehydration {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Dehydrator that accepts every request without touching the filesystem
pub struct NoOpDehydrator;

#[async_trait]
impl Dehydrator for NoOpDehydrator {
    async fn mark_offline_only(&self, path: &Path) -> Result<()> {
        let _ = path;
        Ok(())
    }
}
