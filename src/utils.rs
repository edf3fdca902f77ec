//! Utility functions for key derivation, URL handling, and filenames

use crate::types::PairKey;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static DATASET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DataSet\s*(\d+)").unwrap_or_else(|e| panic!("invalid dataset regex: {e}"))
});

static UNSAFE_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\\/:*?"<>|\r\n\t]"#).unwrap_or_else(|e| panic!("invalid filename regex: {e}"))
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").unwrap_or_else(|e| panic!("invalid whitespace regex: {e}"))
});

/// Derive a pair's stable key from its primary URL
///
/// Archive paths containing a `DataSet N` segment group under `DataSet_N`;
/// any other URL groups under its host with dots replaced by underscores.
/// The id is the percent-decoded final path segment without its extension.
pub fn derive_pair_key(url: &str) -> PairKey {
    let decoded = urlencoding::decode(url)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| url.to_string());

    let filename = decoded.rsplit('/').next().unwrap_or(&decoded);
    let mut id = file_stem(filename);
    if id.is_empty() {
        id = "unknown".to_string();
    }

    if let Some(caps) = DATASET_RE.captures(&decoded) {
        let group = format!("DataSet_{}", &caps[1]);
        return PairKey::new(group, id);
    }

    let group = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| {
            host.trim_start_matches("www.")
                .replace('.', "_")
        })
        .unwrap_or_else(|| "unknown".to_string());

    PairKey::new(group, id)
}

/// Extension of the primary URL's final path segment, defaulting to `pdf`
pub fn primary_extension(url: &str) -> String {
    let decoded = urlencoding::decode(url)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| url.to_string());
    let filename = decoded.rsplit('/').next().unwrap_or(&decoded);
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "pdf".to_string(),
    }
}

/// Strip the trailing extension from a media URL, keeping everything before
/// the last dot (the candidate probing base)
pub fn strip_extension(url: &str) -> &str {
    match url.rsplit_once('.') {
        Some((base, _)) => base,
        None => url,
    }
}

/// Percent-encode literal spaces, which archive export columns often carry
pub fn encode_spaces(url: &str) -> String {
    url.replace(' ', "%20")
}

/// Remove characters invalid in Windows filenames and collapse whitespace
pub fn sanitize_for_filename(text: &str) -> String {
    let cleaned = UNSAFE_FILENAME_RE.replace_all(text, "");
    let collapsed = WHITESPACE_RE.replace_all(&cleaned, " ");
    collapsed.trim().trim_end_matches(['.', ' ']).to_string()
}

/// Collapse all whitespace runs to single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Locate the folder for a pair id under its group directory
///
/// Matches the bare id as well as a summarized `<id> - <snippet>` rename.
/// Returns `None` when the group directory does not exist or holds no match.
pub fn find_existing_folder(group_dir: &Path, id: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(group_dir).ok()?;
    let suffixed = format!("{id} - ");
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == id || name.starts_with(&suffixed) {
            return Some(group_dir.join(name));
        }
    }
    None
}

/// Write a file durably: contents land in a temp sibling that is renamed
/// over the target, so readers never observe a half-written file
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

fn file_stem(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_urls_group_by_dataset_number() {
        let key = derive_pair_key(
            "https://archive.example/files/DataSet%209/EFTA-00012345.pdf",
        );
        assert_eq!(key.group(), "DataSet_9");
        assert_eq!(key.id(), "EFTA-00012345");
    }

    #[test]
    fn dataset_with_literal_space_also_matches() {
        let key = derive_pair_key("https://archive.example/files/DataSet 12/DOC-7.pdf");
        assert_eq!(key.group(), "DataSet_12");
        assert_eq!(key.id(), "DOC-7");
    }

    #[test]
    fn generic_urls_group_by_host() {
        let key = derive_pair_key("https://www.records.example.org/docs/file-22.pdf");
        assert_eq!(key.group(), "records_example_org");
        assert_eq!(key.id(), "file-22");
    }

    #[test]
    fn empty_final_segment_falls_back_to_unknown() {
        let key = derive_pair_key("https://host.example/docs/");
        assert_eq!(key.id(), "unknown");
    }

    #[test]
    fn primary_extension_from_url() {
        assert_eq!(
            primary_extension("https://a.example/DataSet%201/x.PDF"),
            "pdf"
        );
        assert_eq!(primary_extension("https://a.example/noext"), "pdf");
    }

    #[test]
    fn strip_extension_keeps_base() {
        assert_eq!(
            strip_extension("https://a.example/f/clip.mov"),
            "https://a.example/f/clip"
        );
        assert_eq!(strip_extension("no-dot"), "no-dot");
    }

    #[test]
    fn encode_spaces_only_touches_spaces() {
        assert_eq!(
            encode_spaces("https://a.example/DataSet 3/f.pdf"),
            "https://a.example/DataSet%203/f.pdf"
        );
    }

    #[test]
    fn sanitize_strips_reserved_characters() {
        assert_eq!(
            sanitize_for_filename("RE: Memo <draft?> |v2|"),
            "RE Memo draft v2"
        );
    }

    #[test]
    fn sanitize_collapses_whitespace_and_trailing_dots() {
        assert_eq!(
            sanitize_for_filename("  spaced   out\ttext. . "),
            "spaced out text"
        );
    }

    #[test]
    fn find_existing_folder_matches_bare_and_suffixed() {
        let tmp = tempfile::tempdir().unwrap();
        let group = tmp.path().join("DataSet_1");
        std::fs::create_dir_all(group.join("DOC-1")).unwrap();
        std::fs::create_dir_all(group.join("DOC-2 - some summary")).unwrap();

        assert_eq!(
            find_existing_folder(&group, "DOC-1").unwrap(),
            group.join("DOC-1")
        );
        assert_eq!(
            find_existing_folder(&group, "DOC-2").unwrap(),
            group.join("DOC-2 - some summary")
        );
        assert!(find_existing_folder(&group, "DOC-3").is_none());
        assert!(find_existing_folder(&tmp.path().join("missing"), "DOC-1").is_none());
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("state").join("ledger.json");

        write_atomic(&target, b"{\"a\":1}").unwrap();
        write_atomic(&target, b"{\"a\":2}").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{\"a\":2}");
        assert!(!target.with_extension("tmp").exists());
    }

    #[test]
    fn suffixed_match_requires_separator() {
        let tmp = tempfile::tempdir().unwrap();
        let group = tmp.path().join("DataSet_1");
        // DOC-10 must not match a lookup for DOC-1
        std::fs::create_dir_all(group.join("DOC-10")).unwrap();
        assert!(find_existing_folder(&group, "DOC-1").is_none());
    }
}
