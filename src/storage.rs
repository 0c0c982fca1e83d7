//! Draft autosave persistence.
//!
//! Drafts are single JSON files in a flat directory, named by their creation
//! timestamp so a plain string sort is also a time sort.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::model::ReportDraft;

/// Default autosave directory under the user data dir.
pub fn autosave_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("hwbug")
        .join("autosave")
}

pub fn ensure_autosave_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create autosave dir {}", dir.display()))
}

/// A draft on disk, paired with its path so it can be deleted or rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedDraft {
    pub path: PathBuf,
    pub draft: ReportDraft,
}

/// Fresh autosave path for a new editor session.
pub fn new_draft_path(dir: &Path) -> PathBuf {
    let stamp = OffsetDateTime::now_utc().unix_timestamp_nanos();
    dir.join(format!("{stamp}.json"))
}

/// Write (or rewrite) one draft, stamping its save time.
pub fn write_draft(path: &Path, draft: &ReportDraft) -> Result<()> {
    let mut draft = draft.clone();
    draft.saved_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    let json = serde_json::to_string_pretty(&draft).context("serialize draft")?;
    fs::write(path, json).with_context(|| format!("write draft {}", path.display()))
}

/// All recoverable drafts, newest first. Unparseable files are skipped; a
/// corrupt draft must not take the recovery screen down with it.
pub fn list_drafts(dir: &Path) -> Vec<SavedDraft> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    paths.reverse();

    paths
        .into_iter()
        .filter_map(|path| {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("skipping unreadable draft {}: {e}", path.display());
                    return None;
                }
            };
            match serde_json::from_str::<ReportDraft>(&raw) {
                Ok(draft) => Some(SavedDraft { path, draft }),
                Err(e) => {
                    tracing::warn!("skipping invalid draft {}: {e}", path.display());
                    None
                }
            }
        })
        .collect()
}

pub fn delete_draft(path: &Path) -> Result<()> {
    fs::remove_file(path).with_context(|| format!("delete draft {}", path.display()))
}

/// Does at least one recoverable draft exist? Drives whether back-navigation
/// from session selection re-offers the recovery screen.
pub fn has_drafts(dir: &Path) -> bool {
    !list_drafts(dir).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> ReportDraft {
        ReportDraft {
            title: title.into(),
            description: "desc".into(),
            ..Default::default()
        }
    }

    #[test]
    fn write_list_delete_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!has_drafts(tmp.path()));

        let first = tmp.path().join("100.json");
        let second = tmp.path().join("200.json");
        write_draft(&first, &draft("older")).unwrap();
        write_draft(&second, &draft("newer")).unwrap();

        let drafts = list_drafts(tmp.path());
        assert_eq!(drafts.len(), 2);
        // newest first
        assert_eq!(drafts[0].draft.title, "newer");
        assert!(drafts[0].draft.saved_at.is_some());
        assert!(has_drafts(tmp.path()));

        delete_draft(&drafts[0].path).unwrap();
        delete_draft(&drafts[1].path).unwrap();
        assert!(!has_drafts(tmp.path()));
    }

    #[test]
    fn corrupt_drafts_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("900.json"), "{not json").unwrap();
        write_draft(&tmp.path().join("100.json"), &draft("good")).unwrap();

        let drafts = list_drafts(tmp.path());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].draft.title, "good");
    }

    #[test]
    fn rewrite_overwrites_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let path = new_draft_path(tmp.path());
        write_draft(&path, &draft("v1")).unwrap();
        write_draft(&path, &draft("v2")).unwrap();

        let drafts = list_drafts(tmp.path());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].draft.title, "v2");
    }
}
