//! Configuration types for pair-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Pair-list input configuration (spreadsheet export or local CSV)
///
/// Groups settings for where the declared URL pairs come from.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Spreadsheet id to fetch the pair list from (None when a CSV is used)
    #[serde(default)]
    pub sheet_id: Option<String>,

    /// Local CSV file with the pair list (takes precedence over the sheet)
    #[serde(default)]
    pub csv_path: Option<PathBuf>,

    /// Header name of the primary-URL column (default: "PDF URL")
    #[serde(default = "default_primary_column")]
    pub primary_column: String,

    /// Header name of the media-URL column (default: "MOV URL")
    #[serde(default = "default_media_column")]
    pub media_column: String,

    /// Where the fetched sheet export is cached between runs
    #[serde(default = "default_pairs_cache")]
    pub cache_path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            csv_path: None,
            primary_column: default_primary_column(),
            media_column: default_media_column(),
            cache_path: default_pairs_cache(),
        }
    }
}

/// Session acquisition configuration
///
/// Groups settings for the cookie-authenticated session: where cookies are
/// cached, which endpoint validates them, and which cookie names the target
/// site is expected to set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Page the interactive acquisition flow should open
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Authenticated endpoint used for the lightweight validation probe.
    /// A valid session receives a JSON body; a challenge page does not.
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    /// Cookie names the site is expected to set; missing names are logged
    /// as a warning but do not fail acquisition
    #[serde(default = "default_required_cookies")]
    pub required_cookies: Vec<String>,

    /// Where successfully acquired cookies are persisted for `cached` mode
    #[serde(default = "default_cookie_cache")]
    pub cookie_cache: PathBuf,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            probe_url: default_probe_url(),
            required_cookies: default_required_cookies(),
            cookie_cache: default_cookie_cache(),
            user_agent: default_user_agent(),
        }
    }
}

/// Download behavior configuration (output layout, concurrency, probing)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output root; one folder per pair is created under `<root>/<group>/`
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Size of the fetch worker pool (default: 5)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Process only the first N declared pairs (0 = all)
    #[serde(default)]
    pub limit: usize,

    /// Media extensions probed in order when the declared media URL misses
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Per-request timeout (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Progress ledger location
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            workers: default_workers(),
            limit: 0,
            media_extensions: default_media_extensions(),
            request_timeout: default_request_timeout(),
            ledger_path: default_ledger_path(),
        }
    }
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial try (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Post-processing configuration (summaries, dehydration)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Extract summaries after the fetch phase (default: true)
    #[serde(default = "default_true")]
    pub summarize: bool,

    /// Maximum summary length used in a folder-name suffix (default: 60)
    #[serde(default = "default_max_snippet_len")]
    pub max_snippet_len: usize,

    /// Pages of the primary document read for the summary (default: 2)
    #[serde(default = "default_summary_page_limit")]
    pub summary_page_limit: usize,

    /// Maximum characters kept in the summary artifact (default: 2000)
    #[serde(default = "default_max_summary_len")]
    pub max_summary_len: usize,

    /// Delay before dehydrating, giving the sync client time to upload
    /// (default: 30 seconds)
    #[serde(default = "default_dehydrate_wait", with = "duration_serde")]
    pub dehydrate_wait: Duration,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            summarize: true,
            max_snippet_len: default_max_snippet_len(),
            summary_page_limit: default_summary_page_limit(),
            max_summary_len: default_max_summary_len(),
            dehydrate_wait: default_dehydrate_wait(),
        }
    }
}

/// Main configuration for [`PairDownloader`](crate::PairDownloader)
///
/// Fields are organized into logical sub-configs:
/// - [`source`](SourceConfig) — where the pair list comes from
/// - [`auth`](AuthConfig) — session acquisition and validation
/// - [`download`](DownloadConfig) — output layout, concurrency, probing
/// - [`retry`](RetryConfig) — transient-failure policy
/// - [`post`](PostProcessConfig) — summaries and dehydration
///
/// All sub-config fields are flattened for serialization, so the JSON
/// format stays un-nested.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pair-list input settings
    #[serde(flatten)]
    pub source: SourceConfig,

    /// Session acquisition settings
    #[serde(flatten)]
    pub auth: AuthConfig,

    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry policy for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Post-processing settings
    #[serde(flatten)]
    pub post: PostProcessConfig,
}

impl Config {
    /// Output root directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Validate cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.download.workers == 0 {
            return Err(crate::error::Error::Config {
                message: "worker pool size must be at least 1".to_string(),
                key: Some("workers".to_string()),
            });
        }
        if self.download.media_extensions.is_empty() {
            return Err(crate::error::Error::Config {
                message: "at least one media extension candidate is required".to_string(),
                key: Some("media_extensions".to_string()),
            });
        }
        Ok(())
    }
}

fn default_primary_column() -> String {
    "PDF URL".to_string()
}

fn default_media_column() -> String {
    "MOV URL".to_string()
}

fn default_pairs_cache() -> PathBuf {
    PathBuf::from("urls_cache.csv")
}

fn default_auth_url() -> String {
    "https://www.justice.gov/epstein".to_string()
}

fn default_probe_url() -> String {
    "https://www.justice.gov/multimedia-search?keys=no+images+produced&page=1".to_string()
}

fn default_required_cookies() -> Vec<String> {
    vec![
        "QueueITAccepted-SDFrts345E-V3_usdojsearch".to_string(),
        "justiceGovAgeVerified".to_string(),
    ]
}

fn default_cookie_cache() -> PathBuf {
    PathBuf::from("session_cookies.json")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
        .to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./library")
}

fn default_workers() -> usize {
    5
}

fn default_media_extensions() -> Vec<String> {
    ["mov", "mp4", "wmv", "avi", "3gp", "3g2", "m4v", "mpg", "flv", "webm"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Image formats the archive occasionally serves instead of video; opt-in
/// via `media_extensions` when retrying skipped pairs.
pub fn extended_media_extensions() -> Vec<String> {
    let mut extensions = default_media_extensions();
    extensions.extend(
        ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic", "svg"]
            .into_iter()
            .map(str::to_string),
    );
    extensions
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("progress_ledger.json")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_snippet_len() -> usize {
    60
}

fn default_summary_page_limit() -> usize {
    2
}

fn default_max_summary_len() -> usize {
    2000
}

fn default_dehydrate_wait() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
