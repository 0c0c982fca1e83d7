//! Remote-submission protocol seam.
//!
//! A protocol describes one bug-filing attempt as an ordered step sequence.
//! The orchestrator is the single in-flight consumer: it pulls steps one at a
//! time and stops at the first failure. Request shaping against the actual
//! tracker lives behind this boundary.

mod jira;
mod launchpad;

pub use jira::JiraProtocol;
pub use launchpad::LaunchpadProtocol;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::model::{Report, Severity};

/// One item of a protocol's ordered step sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStep {
    /// Plain progress text; does not move the progress bar.
    Message(String),
    /// A completed unit of work; advances the progress bar by one.
    Advance(String),
    /// Terminal failure. No step follows it.
    Failure(String),
}

/// Tracker credentials collected from the operator or a cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

/// Interactive credential collection. Implemented by the shell; the
/// orchestrator only knows how to suspend on it.
#[async_trait]
pub trait AuthPrompt: Send + Sync {
    /// Returns credentials plus whether they may be cached, or `None` when
    /// the operator declined.
    async fn obtain(&self) -> Option<(Credentials, bool)>;
}

/// The remote bug tracker backends this tool can file to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Launchpad,
    Jira,
}

pub fn new_protocol(kind: BackendKind) -> Box<dyn SubmissionProtocol> {
    match kind {
        BackendKind::Launchpad => Box::new(LaunchpadProtocol::new()),
        BackendKind::Jira => Box::new(JiraProtocol::new()),
    }
}

pub trait SubmissionProtocol: Send {
    /// Internal name; also keys the credential cache file.
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Number of `Advance` steps `submit` yields on the happy path.
    fn declared_steps(&self) -> u64;

    fn needs_auth(&self) -> bool {
        false
    }

    fn cached_credentials(&self) -> Option<Credentials> {
        None
    }

    fn set_credentials(&mut self, _auth: Credentials, _cache: bool) {}

    /// The ordered bug-creation sequence. Yields at most one `Failure`,
    /// always as the last item.
    fn submit(&mut self, report: &Report) -> BoxStream<'static, SubmissionStep>;

    /// URL of the created bug, once `submit` has run without a failure.
    fn bug_url(&self) -> Option<String>;

    /// This tracker's label for an internal severity.
    fn severity_label(&self, severity: Severity) -> &'static str;
}

/// Credential cache files live in the OS temp dir so they vanish on reboot.
fn credential_cache_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("hwbug-{name}-credentials.json"))
}

pub(crate) fn load_cached_credentials(name: &str) -> Option<Credentials> {
    let path = credential_cache_path(name);
    let raw = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(creds) => Some(creds),
        Err(e) => {
            tracing::warn!("ignoring invalid credential cache {}: {e}", path.display());
            None
        }
    }
}

pub(crate) fn store_cached_credentials(name: &str, creds: &Credentials) -> Result<()> {
    let path = credential_cache_path(name);
    let json = serde_json::to_string(creds).context("serialize credentials")?;
    fs::write(&path, json).with_context(|| format!("write credential cache {}", path.display()))
}
