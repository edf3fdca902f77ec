//! Cookie-authenticated session acquisition
//!
//! The archive requires browser cookies on every request. Three acquisition
//! modes exist behind one interface:
//! - `cached` — reuse the persisted cookie set, failing when absent
//! - `manual` — parse an externally supplied `document.cookie` string
//! - `assisted` — delegate to a pluggable interactive capture capability
//!
//! Every successfully acquired set is persisted for future `cached` use and
//! validated with a lightweight probe against an authenticated endpoint:
//! the probe expects a JSON body, which a challenge page never serves.

use crate::config::AuthConfig;
use crate::error::{AuthError, Error, Result};
use crate::utils::write_atomic;
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Named cookie values, ordered for stable serialization
pub type CookieSet = BTreeMap<String, String>;

/// How to obtain the session cookies
#[derive(Clone, Debug)]
pub enum AcquireMode {
    /// Load the persisted cookie set; fail if missing or invalid
    Cached,
    /// Parse an externally supplied `document.cookie` string
    Manual {
        /// The raw cookie string pasted from browser devtools
        cookie_text: String,
    },
    /// Run the pluggable interactive capture flow
    Assisted,
}

/// Pluggable interactive cookie capture (e.g. a driven browser)
///
/// The library ships no implementation; embedders supply one via
/// [`SessionProvider::with_capture`]. Tests exercise only the cached and
/// manual modes.
#[async_trait]
pub trait CookieCapture: Send + Sync {
    /// Open an interactive flow against `auth_url`, block until the user
    /// has passed the site's challenges, and return the captured cookies
    async fn capture(&self, auth_url: &str) -> Result<CookieSet>;
}

/// An authenticated client context, shared read-only across fetch workers
#[derive(Clone)]
pub struct AuthContext {
    client: reqwest::Client,
    cookies: CookieSet,
}

impl AuthContext {
    /// The HTTP client carrying the session cookies and user agent
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Names of the cookies backing this context
    pub fn cookie_names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    /// Build a context directly from a cookie set (bypasses acquisition;
    /// used by embedders and tests that manage cookies themselves)
    pub fn from_cookies(
        cookies: CookieSet,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = build_client(&cookies, user_agent, timeout)?;
        Ok(Self { client, cookies })
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Cookie values are credentials; log names only
        f.debug_struct("AuthContext")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Acquires and validates authenticated sessions
pub struct SessionProvider {
    config: AuthConfig,
    request_timeout: Duration,
    capture: Option<Arc<dyn CookieCapture>>,
}

impl SessionProvider {
    /// Create a provider for the given auth configuration
    pub fn new(config: AuthConfig, request_timeout: Duration) -> Self {
        Self {
            config,
            request_timeout,
            capture: None,
        }
    }

    /// Attach an interactive capture capability for `assisted` mode
    pub fn with_capture(mut self, capture: Arc<dyn CookieCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Obtain a validated session in the requested mode
    ///
    /// Side effect: manual and assisted acquisitions persist the cookie set
    /// for future `cached` use.
    pub async fn acquire(&self, mode: AcquireMode) -> Result<AuthContext> {
        match mode {
            AcquireMode::Cached => {
                let cookies = self.load_cache()?;
                info!(count = cookies.len(), "loaded cookies from cache");
                let context = self.context_from(cookies)?;
                self.validate(&context).await?;
                Ok(context)
            }
            AcquireMode::Manual { cookie_text } => {
                let cookies = parse_cookie_text(&cookie_text);
                self.warn_missing_required(&cookies);
                let context = self.context_from(cookies.clone())?;
                self.validate(&context).await?;
                self.save_cache(&cookies)?;
                Ok(context)
            }
            AcquireMode::Assisted => {
                let capture = self.capture.as_ref().ok_or_else(|| {
                    AuthError::CaptureUnavailable(
                        "no capture capability attached; use manual or cached mode".to_string(),
                    )
                })?;
                let cookies = capture.capture(&self.config.auth_url).await?;
                self.warn_missing_required(&cookies);
                let context = self.context_from(cookies.clone())?;
                self.validate(&context).await?;
                self.save_cache(&cookies)?;
                Ok(context)
            }
        }
    }

    /// Probe an authenticated endpoint to confirm the session works
    ///
    /// A valid session receives JSON search results; an expired session is
    /// redirected to an HTML challenge page. Anything that is not a 2xx
    /// JSON body is therefore an [`AuthError::Invalid`].
    pub async fn validate(&self, context: &AuthContext) -> Result<()> {
        let response = context
            .client()
            .get(&self.config.probe_url)
            .send()
            .await
            .map_err(|e| AuthError::Invalid {
                reason: format!("probe request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Invalid {
                reason: format!("probe returned HTTP {}", status.as_u16()),
            }
            .into());
        }

        let body = response.text().await.map_err(|e| AuthError::Invalid {
            reason: format!("probe body unreadable: {e}"),
        })?;
        if serde_json::from_str::<serde_json::Value>(&body).is_err() {
            return Err(AuthError::Invalid {
                reason: "probe returned a non-JSON body (challenge page?)".to_string(),
            }
            .into());
        }

        info!("session validated against authenticated endpoint");
        Ok(())
    }

    fn context_from(&self, cookies: CookieSet) -> Result<AuthContext> {
        AuthContext::from_cookies(cookies, &self.config.user_agent, self.request_timeout)
    }

    fn load_cache(&self) -> Result<CookieSet> {
        let path = &self.config.cookie_cache;
        if !path.exists() {
            return Err(AuthError::CacheMissing { path: path.clone() }.into());
        }
        let text = std::fs::read_to_string(path).map_err(|e| AuthError::CacheUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let cookies =
            serde_json::from_str(&text).map_err(|e| AuthError::CacheUnreadable {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(cookies)
    }

    fn save_cache(&self, cookies: &CookieSet) -> Result<()> {
        let json = serde_json::to_vec_pretty(cookies)?;
        write_atomic(&self.config.cookie_cache, &json)?;
        info!(path = %self.config.cookie_cache.display(), "persisted session cookies");
        Ok(())
    }

    fn warn_missing_required(&self, cookies: &CookieSet) {
        let missing: Vec<&str> = self
            .config
            .required_cookies
            .iter()
            .map(String::as_str)
            .filter(|name| !cookies.contains_key(*name))
            .collect();
        if missing.is_empty() {
            info!("all required cookies present");
        } else {
            warn!(?missing, "expected cookies missing from capture");
        }
    }
}

/// Parse a browser `document.cookie` string into named values
///
/// Fragments without an `=` are ignored; values keep any embedded `=`.
pub fn parse_cookie_text(text: &str) -> CookieSet {
    let mut cookies = CookieSet::new();
    for fragment in text.split(';') {
        let fragment = fragment.trim();
        if let Some((name, value)) = fragment.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }
    cookies
}

fn build_client(
    cookies: &CookieSet,
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();

    if !cookies.is_empty() {
        let cookie_header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        let value = HeaderValue::from_str(&cookie_header).map_err(|e| {
            Error::Auth(AuthError::Invalid {
                reason: format!("cookie values not header-safe: {e}"),
            })
        })?;
        headers.insert(header::COOKIE, value);
    }

    reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(Error::Network)
}
