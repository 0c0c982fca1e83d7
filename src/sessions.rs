//! Test-session history provider.
//!
//! Reads finished hardware-test sessions from disk so the wizard can offer
//! session/job selection and attach job output to reports. A session is a
//! directory holding a `session.json` record plus per-job output files; a
//! submission archive is a standalone JSON summary of a past submission.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SESSION_ROOT: &str = "/var/tmp/hwtest/sessions";

/// Outcomes shown for job selection by default.
pub const DEFAULT_STATUS_FILTER: &[JobOutcome] = &[JobOutcome::Fail, JobOutcome::Crash];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Pass,
    Fail,
    Crash,
    Skip,
}

/// One run of a job. A job can be retried; the session record keeps every
/// attempt and readers pick the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub outcome: JobOutcome,
    #[serde(default)]
    pub return_code: i32,
    #[serde(default)]
    pub comments: Option<String>,
    /// Stem of the per-job output files (`<stem>.stdout` / `<stem>.stderr`)
    /// inside the session's `io-logs` directory.
    #[serde(default)]
    pub io_log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SessionRecord {
    testplan_id: String,
    #[serde(default)]
    results: BTreeMap<String, Vec<JobRecord>>,
}

/// Output of a single job, read lazily from the session directory.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub stdout: String,
    pub stderr: String,
    pub comments: String,
}

/// A loaded test session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRef {
    pub path: PathBuf,
    pub testplan_id: String,
    results: BTreeMap<String, Vec<JobRecord>>,
}

impl SessionRef {
    pub fn load(path: &Path) -> Result<Self> {
        let record_path = path.join("session.json");
        let raw = fs::read_to_string(&record_path)
            .with_context(|| format!("read session record {}", record_path.display()))?;
        let record: SessionRecord = serde_json::from_str(&raw)
            .with_context(|| format!("parse session record {}", record_path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            testplan_id: record.testplan_id,
            results: record.results,
        })
    }

    /// Short name shown in selection lists.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Jobs whose last attempt ended with one of the given outcomes.
    pub fn run_jobs(&self, status_filter: &[JobOutcome]) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(job, attempts)| {
                let last = attempts.last()?;
                status_filter.contains(&last.outcome).then(|| job.clone())
            })
            .collect()
    }

    pub fn has_failed_jobs(&self) -> bool {
        self.results
            .values()
            .any(|attempts| matches!(attempts.last(), Some(r) if r.outcome == JobOutcome::Fail))
    }

    /// Stdout/stderr/comments of a job, or `None` if the session has no such
    /// job. Missing output files degrade to empty strings rather than errors;
    /// a half-written session should not block filing a bug about it.
    pub fn job_output(&self, job_id: &str) -> Option<JobOutput> {
        let last = self.results.get(job_id)?.last()?;
        let comments = last.comments.clone().unwrap_or_default();
        let (stdout, stderr) = match &last.io_log {
            Some(stem) => {
                let logs = self.path.join("io-logs");
                let read = |suffix: &str| -> String {
                    let p = logs.join(format!("{stem}.{suffix}"));
                    match fs::read_to_string(&p) {
                        Ok(s) => s.trim().to_string(),
                        Err(e) => {
                            tracing::warn!("missing io log {}: {e}", p.display());
                            String::new()
                        }
                    }
                };
                (read("stdout"), read("stderr"))
            }
            None => {
                tracing::warn!("job `{job_id}` has no associated log records");
                (String::new(), String::new())
            }
        };
        Some(JobOutput {
            stdout,
            stderr,
            comments,
        })
    }
}

/// Sessions under `root` worth offering for selection.
///
/// Valid means the `io-logs` directory exists and is non-empty; anything else
/// was either tossed by the test runner or never got far enough to matter.
pub fn list_valid_sessions(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            fs::read_dir(p.join("io-logs"))
                .map(|mut logs| logs.next().is_some())
                .unwrap_or(false)
        })
        .collect();
    // Session directory names embed their creation timestamp; newest first.
    dirs.sort();
    dirs.reverse();
    dirs
}

/// Summary of a historical submission, used to pick jobs when no live
/// session is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionArchive {
    pub testplan_id: String,
    #[serde(default)]
    pub results: BTreeMap<String, JobOutcome>,
}

impl SubmissionArchive {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read submission archive {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse submission archive {}", path.display()))
    }

    pub fn run_jobs(&self, status_filter: &[JobOutcome]) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(job, outcome)| status_filter.contains(outcome).then(|| job.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_session(dir: &Path, record: &str, logs: &[(&str, &str, &str)]) {
        fs::create_dir_all(dir.join("io-logs")).unwrap();
        fs::write(dir.join("session.json"), record).unwrap();
        for (stem, out, err) in logs {
            fs::write(dir.join("io-logs").join(format!("{stem}.stdout")), out).unwrap();
            fs::write(dir.join("io-logs").join(format!("{stem}.stderr")), err).unwrap();
        }
    }

    const RECORD: &str = r#"{
        "testplan_id": "com.example::client-cert",
        "results": {
            "graphics/flicker": [
                {"outcome": "pass", "return_code": 0},
                {"outcome": "fail", "return_code": 1, "io_log": "flicker", "comments": "screen went black"}
            ],
            "audio/playback": [{"outcome": "pass", "return_code": 0}],
            "power/suspend": [{"outcome": "crash", "return_code": -9, "io_log": "suspend"}]
        }
    }"#;

    #[test]
    fn run_jobs_uses_last_attempt_and_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("2026-01-10T10.00.00");
        write_session(&dir, RECORD, &[("flicker", "out", "err"), ("suspend", "", "oops")]);

        let session = SessionRef::load(&dir).unwrap();
        assert_eq!(session.testplan_id, "com.example::client-cert");

        let failed = session.run_jobs(DEFAULT_STATUS_FILTER);
        assert_eq!(failed, vec!["graphics/flicker", "power/suspend"]);
        assert!(session.has_failed_jobs());

        let passed = session.run_jobs(&[JobOutcome::Pass]);
        assert_eq!(passed, vec!["audio/playback"]);
    }

    #[test]
    fn job_output_reads_io_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s1");
        write_session(&dir, RECORD, &[("flicker", "some output\n", "some error")]);

        let session = SessionRef::load(&dir).unwrap();
        let output = session.job_output("graphics/flicker").unwrap();
        assert_eq!(output.stdout, "some output");
        assert_eq!(output.stderr, "some error");
        assert_eq!(output.comments, "screen went black");

        assert!(session.job_output("no/such-job").is_none());

        // missing io-log files degrade to empty output
        let output = session.job_output("power/suspend").unwrap();
        assert_eq!(output.stdout, "");
    }

    #[test]
    fn only_sessions_with_io_logs_are_valid() {
        let tmp = tempfile::tempdir().unwrap();
        write_session(&tmp.path().join("good"), RECORD, &[("flicker", "x", "y")]);
        fs::create_dir_all(tmp.path().join("empty/io-logs")).unwrap();
        fs::create_dir_all(tmp.path().join("no-logs")).unwrap();

        let valid = list_valid_sessions(tmp.path());
        assert_eq!(valid.len(), 1);
        assert!(valid[0].ends_with("good"));

        assert!(list_valid_sessions(&tmp.path().join("missing")).is_empty());
    }

    #[test]
    fn archive_lists_matching_jobs() {
        let archive: SubmissionArchive = serde_json::from_str(
            r#"{"testplan_id": "tp", "results": {"a/b": "fail", "c/d": "pass", "e/f": "crash"}}"#,
        )
        .unwrap();
        assert_eq!(archive.run_jobs(DEFAULT_STATUS_FILTER), vec!["a/b", "e/f"]);
    }
}
