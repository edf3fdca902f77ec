//! Orchestration tests: dispatch, cancellation, limits, dry runs

use crate::config::{Config, RetryConfig};
use crate::ledger::Ledger;
use crate::post_processing::dehydrate::NoOpDehydrator;
use crate::post_processing::summarize::NoOpSummarizer;
use crate::session::{AuthContext, CookieSet};
use crate::types::{PairStatus, RunOptions};
use crate::PairDownloader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(tmp: &Path, csv_path: &Path) -> Config {
    let mut config = Config::default();
    config.source.csv_path = Some(csv_path.to_path_buf());
    config.source.cache_path = tmp.join("urls_cache.csv");
    config.download.output_dir = tmp.join("library");
    config.download.ledger_path = tmp.join("progress_ledger.json");
    config.download.workers = 3;
    config.download.media_extensions = vec!["mov".to_string(), "mp4".to_string()];
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.post.summarize = false;
    config
}

fn write_csv(tmp: &Path, server: &MockServer, ids: &[&str]) -> std::path::PathBuf {
    let mut csv = String::from("PDF URL,MOV URL\n");
    for id in ids {
        csv.push_str(&format!(
            "{uri}/files/DataSet%201/{id}.pdf,{uri}/files/DataSet%201/{id}.mov\n",
            uri = server.uri()
        ));
    }
    let path = tmp.join("pairs.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn downloader_for(config: Config) -> PairDownloader {
    PairDownloader::new(config)
        .unwrap()
        .with_summarizer(Arc::new(NoOpSummarizer))
        .with_dehydrator(Arc::new(NoOpDehydrator))
}

fn auth() -> AuthContext {
    AuthContext::from_cookies(
        CookieSet::new(),
        "pair-dl-tests",
        Duration::from_secs(5),
    )
    .unwrap()
}

async fn mount_ok(server: &MockServer, url_path: String, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

async fn mount_pair(server: &MockServer, id: &str) {
    mount_ok(server, format!("/files/DataSet%201/{id}.pdf"), b"%PDF-1.7").await;
    mount_ok(server, format!("/files/DataSet%201/{id}.mov"), b"movdata").await;
}

#[tokio::test]
async fn run_fetches_all_declared_pairs() {
    let server = MockServer::start().await;
    mount_pair(&server, "DOC-1").await;
    mount_pair(&server, "DOC-2").await;

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1", "DOC-2"]);
    let downloader = downloader_for(test_config(tmp.path(), &csv));

    let summary = downloader.run(&auth(), RunOptions::default()).await.unwrap();

    assert_eq!(summary.declared, 2);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.failed, 0);
    assert!(!summary.has_failures());

    let ledger = Ledger::load(tmp.path().join("progress_ledger.json"));
    assert_eq!(ledger.count(PairStatus::Downloaded), 2);
}

#[tokio::test]
async fn per_pair_failures_never_abort_the_run() {
    let server = MockServer::start().await;
    mount_pair(&server, "DOC-1").await;
    Mock::given(method("GET"))
        .and(path("/files/DataSet%201/DOC-2.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1", "DOC-2"]);
    let downloader = downloader_for(test_config(tmp.path(), &csv));

    let summary = downloader.run(&auth(), RunOptions::default()).await.unwrap();

    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.has_failures());

    let ledger = Ledger::load(tmp.path().join("progress_ledger.json"));
    let failed = ledger
        .entries()
        .find(|(key, _)| key.id() == "DOC-2")
        .map(|(_, entry)| entry.clone())
        .unwrap();
    assert_eq!(failed.status, PairStatus::Failed);
    assert!(failed.failure_reason.unwrap().contains("404"));
}

#[tokio::test]
async fn limit_truncates_the_declared_list() {
    let server = MockServer::start().await;
    mount_pair(&server, "DOC-1").await;
    // DOC-2 would 404; the limit must keep it from ever being requested
    Mock::given(method("GET"))
        .and(path("/files/DataSet%201/DOC-2.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1", "DOC-2"]);
    let mut config = test_config(tmp.path(), &csv);
    config.download.limit = 1;
    let downloader = downloader_for(config);

    let summary = downloader.run(&auth(), RunOptions::default()).await.unwrap();
    assert_eq!(summary.declared, 1);
    assert_eq!(summary.downloaded, 1);
}

#[tokio::test]
async fn dry_run_plans_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1", "DOC-2"]);
    let downloader = downloader_for(test_config(tmp.path(), &csv));

    let summary = downloader
        .run(
            &auth(),
            RunOptions {
                dry_run: true,
                ..RunOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.declared, 2);
    assert_eq!(summary.downloaded, 0);
    assert!(!tmp.path().join("library").exists());
}

#[tokio::test]
async fn forced_dry_run_does_not_reset_the_ledger() {
    let server = MockServer::start().await;
    mount_pair(&server, "DOC-1").await;

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1"]);
    let downloader = downloader_for(test_config(tmp.path(), &csv));

    downloader.run(&auth(), RunOptions::default()).await.unwrap();

    let summary = downloader
        .run(
            &auth(),
            RunOptions {
                dry_run: true,
                force: true,
                ..RunOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(summary.downloaded, 0);

    let ledger = Ledger::load(tmp.path().join("progress_ledger.json"));
    assert_eq!(
        ledger.count(PairStatus::Downloaded),
        1,
        "dry run must not clear completed records"
    );
}

#[tokio::test]
async fn cancellation_before_dispatch_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1"]);
    let downloader = downloader_for(test_config(tmp.path(), &csv));

    downloader.shutdown();
    let summary = downloader.run(&auth(), RunOptions::default()).await.unwrap();
    assert_eq!(summary.downloaded, 0);

    // The pair was never attempted, so the ledger holds no record for it
    let ledger = Ledger::load(tmp.path().join("progress_ledger.json"));
    assert_eq!(ledger.len(), 0);
}

#[tokio::test]
async fn events_report_pair_lifecycle() {
    let server = MockServer::start().await;
    mount_pair(&server, "DOC-1").await;

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1"]);
    let downloader = downloader_for(test_config(tmp.path(), &csv));
    let mut events = downloader.subscribe();

    downloader.run(&auth(), RunOptions::default()).await.unwrap();

    let mut saw_started = false;
    let mut saw_finished = false;
    let mut saw_complete = false;
    while let Ok(event) = events.try_recv() {
        match event {
            crate::types::Event::PairStarted { key } => {
                assert_eq!(key.id(), "DOC-1");
                saw_started = true;
            }
            crate::types::Event::PairFinished { status, .. } => {
                assert_eq!(status, PairStatus::Downloaded);
                saw_finished = true;
            }
            crate::types::Event::RunComplete { summary } => {
                assert_eq!(summary.downloaded, 1);
                saw_complete = true;
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_finished && saw_complete);
}

#[tokio::test]
async fn skipped_pairs_leave_an_empty_free_tree() {
    let server = MockServer::start().await;
    mount_ok(&server, "/files/DataSet%201/DOC-1.pdf".to_string(), b"%PDF-1.7").await;
    for ext in ["mov", "mp4"] {
        Mock::given(method("GET"))
            .and(path(format!("/files/DataSet%201/DOC-1.{ext}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let csv = write_csv(tmp.path(), &server, &["DOC-1"]);
    let downloader = downloader_for(test_config(tmp.path(), &csv));

    let summary = downloader.run(&auth(), RunOptions::default()).await.unwrap();

    assert_eq!(summary.skipped_no_media, 1);
    assert!(
        !tmp.path().join("library").join("DataSet_1").exists(),
        "group dir emptied by the skip must be cleaned up"
    );
}
