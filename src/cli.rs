use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::is_debug;
use crate::sessions::{SubmissionArchive, DEFAULT_SESSION_ROOT};
use crate::storage;
use crate::submitter::BackendKind;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "hwbug",
    version,
    about = "File hardware-test bug reports from a terminal wizard"
)]
pub struct Cli {
    #[command(subcommand)]
    pub backend: BackendCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum BackendCommand {
    /// Submit a bug to Launchpad
    Lp(BackendArgs),
    /// Submit a bug to Jira
    Jira(BackendArgs),
}

#[derive(Debug, Args, Clone)]
pub struct BackendArgs {
    /// Canonical ID (CID) of the device under test
    #[arg(short = 'c', long, value_parser = parse_cid)]
    pub cid: Option<String>,

    /// Stock Keeping Unit (SKU) string of the device under test
    #[arg(short = 'k', long)]
    pub sku: Option<String>,

    /// Project name like STELLA, SOMERVILLE. Case sensitive.
    #[arg(short = 'p', long, value_parser = parse_project)]
    pub project: Option<String>,

    /// Assignee id: LP id without the "lp:" part, or a Jira email
    #[arg(short = 'a', long, value_parser = parse_assignee)]
    pub assignee: Option<String>,

    /// Platform tags; they appear under "Components" on Jira
    #[arg(long = "platform-tag")]
    pub platform_tags: Vec<String>,

    /// Additional tracker tags
    #[arg(short = 't', long = "tag")]
    pub tags: Vec<String>,

    /// Historical submission archive (JSON) to pick jobs from when no live
    /// session is available
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Root directory holding finished test sessions
    #[arg(long, default_value = DEFAULT_SESSION_ROOT)]
    pub session_root: PathBuf,

    /// Kill a log collector that runs longer than this
    #[arg(long, default_value = "15m")]
    pub collector_timeout: humantime::Duration,
}

fn parse_cid(value: &str) -> Result<String, String> {
    let value = value.trim();
    let (head, tail) = value.split_at(value.find('-').unwrap_or(0));
    if head.len() == 6
        && head.chars().all(|c| c.is_ascii_digit())
        && tail.len() == 6
        && tail[1..].chars().all(|c| c.is_ascii_digit())
    {
        Ok(value.to_string())
    } else {
        Err(format!(
            "Invalid CID: '{value}'. CID should look like 202408-12345 \
             (6 digits, dash, then 5 digits)"
        ))
    }
}

fn parse_project(value: &str) -> Result<String, String> {
    let value = value.trim();
    if !value.is_empty() && value.chars().all(char::is_alphanumeric) {
        Ok(value.to_string())
    } else {
        Err(format!(
            "Invalid project: '{value}'. Project name should be an alphanumeric string."
        ))
    }
}

fn parse_assignee(value: &str) -> Result<String, String> {
    // no email validation here; the tracker is the authority on what resolves
    if value.starts_with("lp:") {
        Err("Assignee should not start with \"lp:\"".to_string())
    } else {
        Ok(value.trim().to_string())
    }
}

/// Everything the shell needs for one wizard run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub prefill: BackendArgs,
    pub archive: Option<SubmissionArchive>,
    pub autosave_dir: PathBuf,
    pub collector_timeout: Duration,
    pub debug: bool,
}

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing();

    let (backend, args) = match cli.backend {
        BackendCommand::Lp(args) => (BackendKind::Launchpad, args),
        BackendCommand::Jira(args) => (BackendKind::Jira, args),
    };

    let archive = args
        .archive
        .as_deref()
        .map(SubmissionArchive::load)
        .transpose()
        .context("load submission archive")?;

    let autosave_dir = storage::autosave_dir();
    storage::ensure_autosave_dir(&autosave_dir)?;

    let cfg = AppConfig {
        backend,
        collector_timeout: args.collector_timeout.into(),
        prefill: args,
        archive,
        autosave_dir,
        debug: is_debug(),
    };

    #[cfg(feature = "tui")]
    {
        crate::tui::run(cfg).await
    }
    #[cfg(not(feature = "tui"))]
    {
        let _ = cfg;
        anyhow::bail!("this build has no TUI; rebuild with the `tui` feature")
    }
}

/// Diagnostics go to a file; stdout/stderr belong to the TUI.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let log_dir = dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("hwbug")
        .join("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("warning: cannot create log dir {}: {e}", log_dir.display());
        return;
    }
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("hwbug.log"))
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("warning: cannot open log file: {e}");
            return;
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_format_is_enforced() {
        assert!(parse_cid("202408-12345").is_ok());
        assert!(parse_cid("202408-1234").is_err());
        assert!(parse_cid("20240-12345").is_err());
        assert!(parse_cid("abcdef-12345").is_err());
        assert!(parse_cid("20240812345").is_err());
    }

    #[test]
    fn project_must_be_alphanumeric() {
        assert!(parse_project("STELLA").is_ok());
        assert!(parse_project("stella2").is_ok());
        assert!(parse_project("not a project").is_err());
        assert!(parse_project("").is_err());
    }

    #[test]
    fn assignee_rejects_lp_prefix() {
        assert!(parse_assignee("someone").is_ok());
        assert!(parse_assignee("qa@example.com").is_ok());
        assert!(parse_assignee("lp:someone").is_err());
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from([
            "hwbug",
            "jira",
            "-c",
            "202408-12345",
            "-p",
            "STELLA",
            "--tag",
            "regression",
        ])
        .unwrap();
        let BackendCommand::Jira(args) = cli.backend else {
            panic!("expected jira subcommand");
        };
        assert_eq!(args.cid.as_deref(), Some("202408-12345"));
        assert_eq!(args.project.as_deref(), Some("STELLA"));
        assert_eq!(args.tags, vec!["regression"]);
    }
}
