//! Diagnostic log collectors.
//!
//! Each collector is a slow external command that drops its artifacts into a
//! private scratch subdirectory. Collectors are independent of each other and
//! of the submission protocol, which is what allows the orchestrator to run
//! them all concurrently and tolerate individual failures.

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::model::{is_debug, Report};

pub type CollectFuture = BoxFuture<'static, Result<Option<String>>>;

/// Static descriptor for one collector. `run` returns an optional
/// human-readable result line; an `Err` marks the collection as failed.
pub struct LogCollector {
    pub name: &'static str,
    pub display_name: &'static str,
    pub run: fn(PathBuf, Arc<Report>) -> CollectFuture,
    /// Shown to the operator so a failed collection can be redone by hand.
    pub manual_command: Option<&'static str>,
    /// Preselected in the report editor. Off for uncommon or very slow ones.
    pub default_selected: bool,
}

/// Run a command to completion, mapping non-zero exits to failures and
/// non-empty stdout to the result line.
async fn run_command(mut cmd: Command, what: &str) -> Result<Option<String>> {
    let output = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("spawn {what}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{what} exited with {}: {}", output.status, stderr.trim());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    Ok((!stdout.is_empty()).then(|| stdout.to_string()))
}

fn sos_report(dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async move {
        let mut cmd = Command::new("sudo");
        cmd.args(["sos", "report", "--batch"])
            .arg(format!("--tmp-dir={}", dir.display()));
        run_command(cmd, "sos report").await
    }
    .boxed()
}

fn oem_getlogs(dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async move {
        let mut cmd = Command::new("sudo");
        cmd.args(["-E", "oem-getlogs"]).current_dir(&dir);
        run_command(cmd, "oem-getlogs").await
    }
    .boxed()
}

fn nvidia_bug_report(dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async move {
        let out = dir.join("nvidia-bug-report.log.gz");
        let mut cmd = Command::new("sudo");
        cmd.args(["nvidia-bug-report.sh", "--output-file"]).arg(&out);
        run_command(cmd, "nvidia-bug-report.sh").await
    }
    .boxed()
}

/// Copy the originating session's record and io-logs into the scratch dir so
/// they ride along as an attachment.
fn session_snapshot(dir: PathBuf, report: Arc<Report>) -> CollectFuture {
    async move {
        let Some(session_path) = report.session_path.clone() else {
            return Ok(Some("no session selected, nothing to snapshot".into()));
        };
        let copied = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut copied = 0usize;
            std::fs::copy(session_path.join("session.json"), dir.join("session.json"))
                .context("copy session record")?;
            copied += 1;
            let logs = session_path.join("io-logs");
            if let Ok(entries) = std::fs::read_dir(&logs) {
                let target = dir.join("io-logs");
                std::fs::create_dir_all(&target).context("create io-logs dir")?;
                for entry in entries.filter_map(|e| e.ok()) {
                    std::fs::copy(entry.path(), target.join(entry.file_name()))
                        .with_context(|| format!("copy {}", entry.path().display()))?;
                    copied += 1;
                }
            }
            Ok(copied)
        })
        .await
        .context("session snapshot task")??;
        Ok(Some(format!("copied {copied} file(s)")))
    }
    .boxed()
}

static REAL_COLLECTORS: &[LogCollector] = &[
    LogCollector {
        name: "sos-report",
        display_name: "SOS Report",
        run: sos_report,
        manual_command: Some("sudo sos report --batch"),
        default_selected: true,
    },
    LogCollector {
        name: "oem-getlogs",
        display_name: "OEM GetLogs",
        run: oem_getlogs,
        manual_command: Some("sudo -E oem-getlogs"),
        default_selected: true,
    },
    LogCollector {
        name: "session-snapshot",
        display_name: "Session Snapshot",
        run: session_snapshot,
        manual_command: None,
        default_selected: true,
    },
    LogCollector {
        name: "nvidia-bug-report",
        display_name: "Nvidia Bug Report",
        run: nvidia_bug_report,
        manual_command: Some("sudo nvidia-bug-report.sh"),
        default_selected: false,
    },
];

fn collect_immediate(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async { Ok(None) }.boxed()
}

fn collect_fast(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(None)
    }
    .boxed()
}

fn collect_slow(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }
    .boxed()
}

fn collect_slower(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async {
        tokio::time::sleep(Duration::from_secs(8)).await;
        Ok(None)
    }
    .boxed()
}

fn always_fail(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
    async { bail!("this collector always fails") }.boxed()
}

/// Timed stand-ins used in debug mode so the submission screen can be
/// exercised without root or OEM tooling on the machine.
static DEBUG_COLLECTORS: &[LogCollector] = &[
    LogCollector {
        name: "immediate",
        display_name: "Immediate return",
        run: collect_immediate,
        manual_command: None,
        default_selected: true,
    },
    LogCollector {
        name: "fast",
        display_name: "Fast collect",
        run: collect_fast,
        manual_command: None,
        default_selected: true,
    },
    LogCollector {
        name: "slow",
        display_name: "Slow collect",
        run: collect_slow,
        manual_command: None,
        default_selected: true,
    },
    LogCollector {
        name: "slower",
        display_name: "Slower collect",
        run: collect_slower,
        manual_command: None,
        default_selected: false,
    },
    LogCollector {
        name: "always-fail",
        display_name: "Always fail",
        run: always_fail,
        manual_command: Some("false"),
        default_selected: false,
    },
];

/// The collector set for this process.
pub fn registry() -> &'static [LogCollector] {
    if is_debug() {
        DEBUG_COLLECTORS
    } else {
        REAL_COLLECTORS
    }
}

pub fn find(name: &str) -> Option<&'static LogCollector> {
    registry().iter().find(|c| c.name == name)
}

/// Resolve a report's selection against the registry. Unknown names are
/// dropped with a warning; a stale draft must not block submission.
pub fn select(names: &[String]) -> Vec<&'static LogCollector> {
    names
        .iter()
        .filter_map(|name| {
            let collector = find(name);
            if collector.is_none() {
                tracing::warn!("unknown log collector `{name}` ignored");
            }
            collector
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_are_unique() {
        for set in [REAL_COLLECTORS, DEBUG_COLLECTORS] {
            let mut names: Vec<_> = set.iter().map(|c| c.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), set.len());
        }
    }

    #[test]
    fn select_drops_unknown_names() {
        let known = registry()[0].name.to_string();
        let picked = select(&[known.clone(), "no-such-collector".into()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, known);
    }
}
