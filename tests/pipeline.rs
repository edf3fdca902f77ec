//! End-to-end pipeline tests over the public API

mod common;

use common::TestHarness;
use pair_dl::{Ledger, PairStatus, RunOptions, Summary, SummaryError, Summarizer};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn ledger_statuses(ledger_path: &Path) -> Vec<(String, PairStatus)> {
    let ledger = Ledger::load(ledger_path);
    ledger
        .entries()
        .map(|(key, entry)| (key.to_string(), entry.status))
        .collect()
}

/// Three declared pairs exercising all terminal fetch states in one run:
/// A's media 404s on every candidate, B succeeds with `.mov`, C's primary
/// answers 500 twice before succeeding.
#[tokio::test]
async fn example_scenario_covers_all_terminal_states() {
    let h = TestHarness::start().await;

    // Pair A: primary ok, every media candidate missing
    h.mount_file("DOC-A.pdf", b"%PDF-1.7 A", None).await;
    h.mount_missing("DOC-A.mov").await;
    h.mount_missing("DOC-A.mp4").await;

    // Pair B: fully healthy
    h.mount_pair("DOC-B").await;

    // Pair C: two 500s on the primary, then success
    Mock::given(method("GET"))
        .and(path("/files/DataSet%201/DOC-C.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&h.server)
        .await;
    h.mount_file("DOC-C.pdf", b"%PDF-1.7 C", None).await;
    h.mount_file("DOC-C.mov", b"mov C", None).await;

    let config = h.config_for(&["DOC-A", "DOC-B", "DOC-C"]);
    let downloader = h.downloader(config);

    let summary = downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.declared, 3);
    assert_eq!(summary.downloaded, 2, "B and C must both land");
    assert_eq!(summary.skipped_no_media, 1);
    assert_eq!(summary.failed, 0);

    // A's folder must be gone entirely; B's and C's must hold both files
    let group = h.output_root().join("DataSet_1");
    assert!(!group.join("DOC-A").exists());
    assert!(group.join("DOC-B/DOC-B.pdf").exists());
    assert!(group.join("DOC-B/DOC-B.mov").exists());
    assert!(group.join("DOC-C/DOC-C.pdf").exists());
    assert!(group.join("DOC-C/DOC-C.mov").exists());

    let statuses = ledger_statuses(&h.ledger_path());
    assert!(statuses.contains(&("DataSet_1/DOC-A".to_string(), PairStatus::SkippedNoMedia)));
    assert!(statuses.contains(&("DataSet_1/DOC-B".to_string(), PairStatus::Downloaded)));
    assert!(statuses.contains(&("DataSet_1/DOC-C".to_string(), PairStatus::Downloaded)));
}

/// Running twice with no external change performs zero additional fetches
/// and leaves ledger and tree identical.
#[tokio::test]
async fn second_run_performs_zero_work() {
    let h = TestHarness::start().await;
    // Each file may be served exactly once across both runs
    h.mount_file("DOC-1.pdf", b"%PDF-1.7", Some(1)).await;
    h.mount_file("DOC-1.mov", b"mov", Some(1)).await;
    h.mount_file("DOC-2.pdf", b"%PDF-1.7", Some(1)).await;
    h.mount_file("DOC-2.mov", b"mov", Some(1)).await;

    let config = h.config_for(&["DOC-1", "DOC-2"]);
    let downloader = h.downloader(config);

    let first = downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(first.downloaded, 2);

    let ledger_after_first = std::fs::read_to_string(h.ledger_path()).unwrap();

    let second = downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.already_complete, 2);

    let ledger_after_second = std::fs::read_to_string(h.ledger_path()).unwrap();
    assert_eq!(
        ledger_after_first, ledger_after_second,
        "an idempotent re-run must not mutate the ledger"
    );
}

/// An empty ledger plus a populated output tree: resolution reclassifies
/// the complete folder as downloaded with no network access for it.
#[tokio::test]
async fn delta_detection_survives_ledger_loss() {
    let h = TestHarness::start().await;

    // DOC-1 exists on disk from an earlier life; any request for it would
    // violate the mock expectations below
    let folder = h.output_root().join("DataSet_1/DOC-1");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("DOC-1.pdf"), b"%PDF-1.7").unwrap();
    std::fs::write(folder.join("DOC-1.mov"), b"mov").unwrap();
    h.mount_file("DOC-1.pdf", b"%PDF-1.7", Some(0)).await;
    h.mount_file("DOC-1.mov", b"mov", Some(0)).await;

    // DOC-2 still needs a real fetch
    h.mount_pair("DOC-2").await;

    let config = h.config_for(&["DOC-1", "DOC-2"]);
    let downloader = h.downloader(config);

    let summary = downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.already_complete, 1);
    assert_eq!(summary.downloaded, 1);

    let statuses = ledger_statuses(&h.ledger_path());
    assert!(statuses.contains(&("DataSet_1/DOC-1".to_string(), PairStatus::Downloaded)));
    assert!(statuses.contains(&("DataSet_1/DOC-2".to_string(), PairStatus::Downloaded)));
}

/// `--force` re-downloads the full declared list even when everything is
/// already complete.
#[tokio::test]
async fn force_redownloads_completed_pairs() {
    let h = TestHarness::start().await;
    h.mount_file("DOC-1.pdf", b"%PDF-1.7", Some(2)).await;
    h.mount_file("DOC-1.mov", b"mov", Some(2)).await;

    let config = h.config_for(&["DOC-1"]);
    let downloader = h.downloader(config);

    let first = downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(first.downloaded, 1);

    // Remove the files so the forced run really has to fetch again;
    // keeping the folder also proves force ignores delta detection
    let folder = h.output_root().join("DataSet_1/DOC-1");
    std::fs::remove_file(folder.join("DOC-1.pdf")).unwrap();
    std::fs::remove_file(folder.join("DOC-1.mov")).unwrap();

    let forced = downloader
        .run(
            &h.auth(),
            RunOptions {
                force: true,
                ..RunOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(forced.declared, 1);
    assert_eq!(forced.downloaded, 1);
    assert_eq!(forced.already_complete, 0);
}

struct CourtSummarizer;

#[async_trait::async_trait]
impl Summarizer for CourtSummarizer {
    async fn summarize(&self, _primary: &Path) -> Result<Summary, SummaryError> {
        Ok(Summary {
            snippet: "Sealed filing, Southern District".to_string(),
            full_text: "Sealed filing, Southern District of New York, 2006".to_string(),
        })
    }
}

/// Full pipeline with summaries on: folders gain a snippet suffix, the
/// artifact is written, and the ledger advances to `summarized`.
#[tokio::test]
async fn summaries_rename_folders_and_advance_ledger() {
    let h = TestHarness::start().await;
    h.mount_pair("DOC-1").await;

    let mut config = h.config_for(&["DOC-1"]);
    config.post.summarize = true;
    let downloader = h
        .downloader(config)
        .with_summarizer(Arc::new(CourtSummarizer));

    let summary = downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.summarized, 1);

    let renamed = h
        .output_root()
        .join("DataSet_1/DOC-1 - Sealed filing, Southern District");
    assert!(renamed.join("DOC-1.pdf").exists());
    assert!(renamed.join("summary.txt").exists());

    let statuses = ledger_statuses(&h.ledger_path());
    assert!(statuses.contains(&("DataSet_1/DOC-1".to_string(), PairStatus::Summarized)));

    // A follow-up run resumes cleanly off the renamed folder
    let second = downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.already_complete, 1);
}

/// Walk the final tree and confirm no partial artifacts survive a run.
#[tokio::test]
async fn tree_holds_no_partial_files() {
    let h = TestHarness::start().await;
    h.mount_pair("DOC-1").await;
    h.mount_file("DOC-2.pdf", b"%PDF-1.7", None).await;
    h.mount_missing("DOC-2.mov").await;
    h.mount_missing("DOC-2.mp4").await;

    let config = h.config_for(&["DOC-1", "DOC-2"]);
    let downloader = h.downloader(config);
    downloader
        .run(&h.auth(), RunOptions::default())
        .await
        .unwrap();

    for entry in walkdir::WalkDir::new(h.output_root()) {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy();
        assert!(
            !name.ends_with(".part") && !name.ends_with(".tmp"),
            "partial artifact left behind: {}",
            entry.path().display()
        );
    }
}
