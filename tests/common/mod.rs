//! Shared fixtures for integration tests

use pair_dl::{AuthContext, Config, CookieSet, PairDownloader, RetryConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One temp workspace plus one mock archive server
pub struct TestHarness {
    pub tmp: tempfile::TempDir,
    pub server: MockServer,
}

#[allow(dead_code)]
impl TestHarness {
    pub async fn start() -> Self {
        Self {
            tmp: tempfile::tempdir().expect("tempdir"),
            server: MockServer::start().await,
        }
    }

    /// Write a pair-list CSV for the given ids and build a matching config
    pub fn config_for(&self, ids: &[&str]) -> Config {
        let mut csv = String::from("PDF URL,MOV URL\n");
        for id in ids {
            csv.push_str(&format!(
                "{uri}/files/DataSet%201/{id}.pdf,{uri}/files/DataSet%201/{id}.mov\n",
                uri = self.server.uri()
            ));
        }
        let csv_path = self.tmp.path().join("pairs.csv");
        std::fs::write(&csv_path, csv).expect("write csv");

        let mut config = Config::default();
        config.source.csv_path = Some(csv_path);
        config.source.cache_path = self.tmp.path().join("urls_cache.csv");
        config.download.output_dir = self.output_root();
        config.download.ledger_path = self.ledger_path();
        config.download.workers = 3;
        config.download.media_extensions = vec!["mov".to_string(), "mp4".to_string()];
        config.retry = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        config.post.summarize = false;
        config
    }

    pub fn output_root(&self) -> PathBuf {
        self.tmp.path().join("library")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.tmp.path().join("progress_ledger.json")
    }

    pub fn downloader(&self, config: Config) -> PairDownloader {
        PairDownloader::new(config)
            .expect("config valid")
            .with_summarizer(Arc::new(pair_dl::NoOpSummarizer))
            .with_dehydrator(Arc::new(pair_dl::NoOpDehydrator))
    }

    pub fn auth(&self) -> AuthContext {
        AuthContext::from_cookies(CookieSet::new(), "pair-dl-tests", Duration::from_secs(5))
            .expect("auth context")
    }

    /// Serve a file at `/files/DataSet%201/<name>` a limited or unlimited
    /// number of times
    pub async fn mount_file(&self, name: &str, body: &[u8], expect: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(format!("/files/DataSet%201/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()));
        match expect {
            Some(n) => mock.expect(n).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    /// Serve a 404 at `/files/DataSet%201/<name>`
    pub async fn mount_missing(&self, name: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/files/DataSet%201/{name}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&self.server)
            .await;
    }

    /// Serve a complete healthy pair (pdf + mov)
    pub async fn mount_pair(&self, id: &str) {
        self.mount_file(&format!("{id}.pdf"), b"%PDF-1.7 primary", None)
            .await;
        self.mount_file(&format!("{id}.mov"), b"mov payload", None)
            .await;
    }
}
