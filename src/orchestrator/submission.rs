//! Submission orchestration.
//!
//! Drives one bug-filing attempt: a pool of independent log-collector tasks
//! runs concurrently with the sequential submission protocol, and both funnel
//! into one ordered log stream and one shared progress counter. The protocol
//! is stateful and must never be polled from two places, so a single driver
//! loop owns it; collectors have no ordering requirements among themselves,
//! only the cancel-on-submission-failure link.

use anyhow::{anyhow, Result};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};

use crate::collectors::{self, LogCollector};
use crate::model::Report;
use crate::submitter::{AuthPrompt, SubmissionProtocol, SubmissionStep};

/// Commands the shell can send into a running attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionControl {
    Cancel,
}

/// Style tag on a log line; the UI renders lines by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Ok,
    Fail,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LogKind,
    pub text: String,
}

/// Events emitted while an attempt is running. Channel order is the log
/// order; protocol lines keep their relative order, collector lines may
/// interleave arbitrarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    Log(LogLine),
    Progress { done: u64, total: u64 },
}

/// Terminal state of one attempt. Exactly one of these is produced per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failed(String),
    Cancelled,
}

struct CollectorTask {
    display_name: &'static str,
    handle: JoinHandle<()>,
}

pub struct SubmissionOrchestrator {
    report: Arc<Report>,
    protocol: Box<dyn SubmissionProtocol>,
    collectors: Vec<&'static LogCollector>,
    /// Present until released; the TempDir removes itself if the shell never
    /// gets around to an explicit release.
    scratch: Option<TempDir>,
    collector_timeout: Option<Duration>,
}

impl SubmissionOrchestrator {
    pub fn new(report: Report, protocol: Box<dyn SubmissionProtocol>) -> Result<Self> {
        let scratch = TempDir::with_prefix("hwbug-attempt-")?;
        let collectors = collectors::select(&report.logs_to_include);
        Ok(Self {
            report: Arc::new(report),
            protocol,
            collectors,
            scratch: Some(scratch),
            collector_timeout: None,
        })
    }

    /// Kill a collector that runs longer than this.
    pub fn with_collector_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.collector_timeout = timeout;
        self
    }

    /// Where collectors drop their artifacts, while the attempt is live.
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Total progress units for this attempt.
    pub fn total_units(&self) -> u64 {
        self.protocol.declared_steps() + self.collectors.len() as u64
    }

    pub fn bug_url(&self) -> Option<String> {
        self.protocol.bug_url()
    }

    /// Remove the scratch directory and everything collected into it.
    /// Idempotent; returns whether this call did the removal.
    pub fn release_scratch(&mut self) -> bool {
        match self.scratch.take() {
            Some(dir) => {
                if let Err(e) = dir.close() {
                    tracing::warn!("failed to remove scratch dir: {e:#}");
                }
                true
            }
            None => false,
        }
    }

    /// Run the attempt to its single terminal verdict.
    ///
    /// The scratch directory survives `Success` and `Failed` returns so the
    /// shell can keep it visible until the outcome is acknowledged; it is
    /// always gone after `Cancelled` (quit must not leave litter behind).
    pub async fn run(
        &mut self,
        auth: &dyn AuthPrompt,
        event_tx: &UnboundedSender<SubmissionEvent>,
        ctrl_rx: &mut UnboundedReceiver<SubmissionControl>,
    ) -> Verdict {
        if self.protocol.needs_auth() {
            match self.protocol.cached_credentials() {
                Some(creds) => self.protocol.set_credentials(creds, true),
                None => match auth.obtain().await {
                    Some((creds, cache)) => self.protocol.set_credentials(creds, cache),
                    None => {
                        let msg = "authentication was cancelled before submission started";
                        log(event_tx, LogKind::Fail, msg.to_string());
                        return Verdict::Failed(msg.to_string());
                    }
                },
            }
        }

        let total = self.total_units();
        let done = Arc::new(AtomicU64::new(0));
        let _ = event_tx.send(SubmissionEvent::Progress { done: 0, total });

        // Scratch is only absent after release; a second run on the same
        // instance is a caller bug.
        let scratch_root = self
            .scratch
            .as_ref()
            .expect("submission attempt started without a scratch dir")
            .path()
            .to_path_buf();

        let mut pool: Vec<CollectorTask> = Vec::with_capacity(self.collectors.len());
        if !self.collectors.is_empty() {
            log(
                event_tx,
                LogKind::Info,
                format!("Collecting logs under {}", scratch_root.display()),
            );
        }
        for &collector in &self.collectors {
            pool.push(spawn_collector(
                collector,
                scratch_root.join(collector.name),
                self.report.clone(),
                done.clone(),
                total,
                event_tx.clone(),
                self.collector_timeout,
            ));
            log(
                event_tx,
                LogKind::Info,
                format!("Launched collector: {}", collector.display_name),
            );
        }

        // Drive the protocol one step at a time, in order.
        let display = self.protocol.display_name();
        let mut submission_error: Option<String> = None;
        let mut cancelled = false;
        let mut steps = self.protocol.submit(&self.report);
        loop {
            tokio::select! {
                cmd = ctrl_rx.recv() => match cmd {
                    // a dropped control channel means the shell is gone
                    Some(SubmissionControl::Cancel) | None => {
                        cancelled = true;
                        break;
                    }
                },
                step = steps.next() => match step {
                    Some(SubmissionStep::Message(text)) => {
                        log(event_tx, LogKind::Info, format!("{display}: {text}"));
                    }
                    Some(SubmissionStep::Advance(text)) => {
                        log(event_tx, LogKind::Ok, format!("{display}: {text}"));
                        let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                        let _ = event_tx.send(SubmissionEvent::Progress {
                            done: n.min(total),
                            total,
                        });
                    }
                    Some(SubmissionStep::Failure(error)) => {
                        log(event_tx, LogKind::Fail, format!("{display}: {error}"));
                        submission_error = Some(error);
                        break;
                    }
                    None => break,
                },
            }
        }
        drop(steps);

        if !cancelled && submission_error.is_none() {
            let waiting: Vec<&str> = pool
                .iter()
                .filter(|t| !t.handle.is_finished())
                .map(|t| t.display_name)
                .collect();
            if !waiting.is_empty() {
                log(
                    event_tx,
                    LogKind::Info,
                    format!(
                        "Finished bug creation. Waiting for {} log collector(s) to finish",
                        waiting.len()
                    ),
                );
                for name in waiting {
                    log(event_tx, LogKind::Info, format!("- {name}"));
                }
            }
        }

        // Collectors are pointless once the submission itself failed, and a
        // quit must not leave external processes running.
        let abort_all = cancelled || submission_error.is_some();
        let aborts: Vec<_> = pool.iter().map(|t| t.handle.abort_handle()).collect();
        if abort_all {
            for a in &aborts {
                a.abort();
            }
        }

        let mut finishing: FuturesUnordered<_> = pool
            .into_iter()
            .map(|t| async move { (t.display_name, t.handle.await) })
            .collect();
        loop {
            if cancelled || submission_error.is_some() {
                match finishing.next().await {
                    Some((name, res)) => log_join_result(event_tx, name, res),
                    None => break,
                }
            } else {
                tokio::select! {
                    finished = finishing.next() => match finished {
                        Some((name, res)) => log_join_result(event_tx, name, res),
                        None => break,
                    },
                    cmd = ctrl_rx.recv() => match cmd {
                        Some(SubmissionControl::Cancel) | None => {
                            cancelled = true;
                            for a in &aborts {
                                a.abort();
                            }
                        }
                    },
                }
            }
        }

        if cancelled {
            log(
                event_tx,
                LogKind::Info,
                "Submission cancelled, removing collected logs".to_string(),
            );
            self.release_scratch();
            return Verdict::Cancelled;
        }
        if let Some(error) = submission_error {
            return Verdict::Failed(error);
        }

        let _ = event_tx.send(SubmissionEvent::Progress {
            done: done.load(Ordering::SeqCst).min(total),
            total,
        });
        log(event_tx, LogKind::Ok, "Submission finished!".to_string());
        if let Some(url) = self.protocol.bug_url() {
            log(event_tx, LogKind::Info, format!("URL: {url}"));
        }
        Verdict::Success
    }
}

fn log(tx: &UnboundedSender<SubmissionEvent>, kind: LogKind, text: String) {
    let _ = tx.send(SubmissionEvent::Log(LogLine { kind, text }));
}

fn log_join_result(
    tx: &UnboundedSender<SubmissionEvent>,
    name: &str,
    res: Result<(), JoinError>,
) {
    match res {
        // the task logged its own OK/FAIL line before finishing
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {
            log(tx, LogKind::Cancelled, format!("{name} was cancelled"));
        }
        Err(e) => {
            log(tx, LogKind::Fail, format!("{name} panicked: {e}"));
        }
    }
}

/// One independent collector task. Each writes to its own scratch subpath;
/// the progress counter and the event channel are the only shared state.
fn spawn_collector(
    collector: &'static LogCollector,
    dir: std::path::PathBuf,
    report: Arc<Report>,
    done: Arc<AtomicU64>,
    total: u64,
    tx: UnboundedSender<SubmissionEvent>,
    timeout: Option<Duration>,
) -> CollectorTask {
    let display_name = collector.display_name;
    let handle = tokio::spawn(async move {
        let work = async {
            tokio::task::spawn_blocking({
                let dir = dir.clone();
                move || std::fs::create_dir_all(&dir)
            })
            .await
            .map_err(|e| anyhow!("scratch setup task failed: {e}"))?
            .map_err(|e| anyhow!("create scratch subdir {}: {e}", dir.display()))?;
            (collector.run)(dir, report).await
        };
        let outcome = match timeout {
            Some(t) => match tokio::time::timeout(t, work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow!("timed out after {}", humantime::format_duration(t))),
            },
            None => work.await,
        };
        match outcome {
            Ok(Some(message)) if !message.trim().is_empty() => {
                log(
                    &tx,
                    LogKind::Ok,
                    format!("{display_name}: {}", message.trim()),
                );
            }
            Ok(_) => {
                log(&tx, LogKind::Ok, format!("{display_name}: finished collection!"));
            }
            Err(e) => {
                log(&tx, LogKind::Fail, format!("{display_name} failed: {e:#}"));
                if let Some(cmd) = collector.manual_command {
                    log(
                        &tx,
                        LogKind::Info,
                        format!("You can rerun {display_name} manually with `{cmd}`"),
                    );
                }
            }
        }
        // completion advances progress whether the collection worked or not
        let n = done.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = tx.send(SubmissionEvent::Progress {
            done: n.min(total),
            total,
        });
    });
    CollectorTask {
        display_name,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::CollectFuture;
    use crate::model::{BugStatus, FilingDelay, Severity};
    use crate::submitter::Credentials;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use futures::FutureExt;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn report(logs: &[&str]) -> Report {
        Report {
            title: "t".into(),
            description: "d".into(),
            project: "STELLA".into(),
            severity: Severity::Medium,
            filing_delay: FilingDelay::Immediate,
            status: BugStatus::Confirmed,
            assignee: None,
            series: None,
            platform_tags: vec![],
            additional_tags: vec![],
            logs_to_include: logs.iter().map(|s| s.to_string()).collect(),
            impacted_features: vec![],
            impacted_vendors: vec![],
            session_path: None,
            job_id: None,
        }
    }

    struct ScriptedProtocol {
        steps: Vec<SubmissionStep>,
        declared: u64,
        step_delay: Duration,
        consumed: Arc<AtomicU64>,
        needs_auth: bool,
        cached: Option<Credentials>,
    }

    impl ScriptedProtocol {
        fn new(steps: Vec<SubmissionStep>, declared: u64) -> Self {
            Self {
                steps,
                declared,
                step_delay: Duration::from_millis(1),
                consumed: Arc::new(AtomicU64::new(0)),
                needs_auth: false,
                cached: None,
            }
        }
    }

    impl SubmissionProtocol for ScriptedProtocol {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn declared_steps(&self) -> u64 {
            self.declared
        }

        fn needs_auth(&self) -> bool {
            self.needs_auth
        }

        fn cached_credentials(&self) -> Option<Credentials> {
            self.cached.clone()
        }

        fn submit(&mut self, _report: &Report) -> BoxStream<'static, SubmissionStep> {
            let delay = self.step_delay;
            let consumed = self.consumed.clone();
            stream::iter(self.steps.clone())
                .then(move |step| {
                    let consumed = consumed.clone();
                    async move {
                        tokio::time::sleep(delay).await;
                        consumed.fetch_add(1, Ordering::SeqCst);
                        step
                    }
                })
                .boxed()
        }

        fn bug_url(&self) -> Option<String> {
            None
        }

        fn severity_label(&self, _severity: Severity) -> &'static str {
            "n/a"
        }
    }

    struct StubPrompt(Option<(Credentials, bool)>);

    #[async_trait]
    impl AuthPrompt for StubPrompt {
        async fn obtain(&self) -> Option<(Credentials, bool)> {
            self.0.clone()
        }
    }

    fn ok_with_message(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
        async { Ok(Some("collected 3 file(s)".into())) }.boxed()
    }

    fn fails_fast(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
        async { Err(anyhow!("disk full")) }.boxed()
    }

    fn never_finishes(_dir: PathBuf, _report: Arc<Report>) -> CollectFuture {
        async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
        .boxed()
    }

    static OK_COLLECTOR: LogCollector = LogCollector {
        name: "ok",
        display_name: "OK collector",
        run: ok_with_message,
        manual_command: None,
        default_selected: true,
    };

    static FAILING_COLLECTOR: LogCollector = LogCollector {
        name: "failing",
        display_name: "Failing collector",
        run: fails_fast,
        manual_command: Some("rerun --by-hand"),
        default_selected: true,
    };

    static STUCK_COLLECTOR: LogCollector = LogCollector {
        name: "stuck",
        display_name: "Stuck collector",
        run: never_finishes,
        manual_command: None,
        default_selected: true,
    };

    static STUCK_COLLECTOR_2: LogCollector = LogCollector {
        name: "stuck-2",
        display_name: "Stuck collector 2",
        run: never_finishes,
        manual_command: None,
        default_selected: true,
    };

    fn orchestrator(
        steps: Vec<SubmissionStep>,
        declared: u64,
        pool: Vec<&'static LogCollector>,
    ) -> (SubmissionOrchestrator, Arc<AtomicU64>) {
        let protocol = ScriptedProtocol::new(steps, declared);
        let consumed = protocol.consumed.clone();
        let mut orch = SubmissionOrchestrator::new(report(&[]), Box::new(protocol)).unwrap();
        orch.collectors = pool;
        (orch, consumed)
    }

    fn drain(rx: &mut UnboundedReceiver<SubmissionEvent>) -> Vec<SubmissionEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn lines_of_kind(events: &[SubmissionEvent], kind: LogKind) -> Vec<String> {
        events
            .iter()
            .filter_map(|ev| match ev {
                SubmissionEvent::Log(line) if line.kind == kind => Some(line.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn clean_protocol_with_failing_collector_still_succeeds() {
        // 2 declared steps + 1 collector = 3 progress units
        let (mut orch, _) = orchestrator(
            vec![
                SubmissionStep::Message("login ok".into()),
                SubmissionStep::Advance("project ok".into()),
                SubmissionStep::Advance("created".into()),
            ],
            2,
            vec![&FAILING_COLLECTOR],
        );
        assert_eq!(orch.total_units(), 3);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Success);

        let events = drain(&mut rx);
        let fails = lines_of_kind(&events, LogKind::Fail);
        assert_eq!(fails.len(), 1, "exactly one collector failure line: {fails:?}");
        assert!(fails[0].contains("disk full"));

        let oks = lines_of_kind(&events, LogKind::Ok);
        let protocol_oks: Vec<_> = oks.iter().filter(|l| l.starts_with("scripted:")).collect();
        assert_eq!(protocol_oks.len(), 2);

        // the failed collector's manual rerun hint is surfaced
        let infos = lines_of_kind(&events, LogKind::Info);
        assert!(infos.iter().any(|l| l.contains("rerun --by-hand")));

        // progress reaches the total and never exceeds it
        let progress: Vec<(u64, u64)> = events
            .iter()
            .filter_map(|ev| match ev {
                SubmissionEvent::Progress { done, total } => Some((*done, *total)),
                _ => None,
            })
            .collect();
        assert!(progress.iter().all(|(done, total)| done <= total));
        assert_eq!(progress.last(), Some(&(3, 3)));
    }

    #[tokio::test]
    async fn failure_stops_the_protocol_and_cancels_collectors() {
        let (mut orch, consumed) = orchestrator(
            vec![
                SubmissionStep::Message("starting".into()),
                SubmissionStep::Failure("bad project".into()),
                // contract violations past the failure must never be polled
                SubmissionStep::Advance("never reached".into()),
            ],
            3,
            vec![&STUCK_COLLECTOR, &STUCK_COLLECTOR_2],
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Failed("bad project".into()));
        assert_eq!(consumed.load(Ordering::SeqCst), 2);

        let events = drain(&mut rx);
        let cancelled = lines_of_kind(&events, LogKind::Cancelled);
        assert_eq!(cancelled.len(), 2, "both collectors end cancelled: {cancelled:?}");
        // cancelled is not failure: the only FAIL line is the protocol's own
        let fails = lines_of_kind(&events, LogKind::Fail);
        assert_eq!(fails.len(), 1);
        assert!(fails[0].contains("bad project"));

        // scratch survives until the error is acknowledged
        assert!(orch.scratch_path().is_some());
        assert!(orch.release_scratch());
    }

    #[tokio::test]
    async fn zero_collectors_clean_protocol_succeeds() {
        let (mut orch, _) = orchestrator(
            vec![SubmissionStep::Advance("done".into())],
            1,
            Vec::new(),
        );
        assert_eq!(orch.total_units(), 1);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Success);

        let events = drain(&mut rx);
        let infos = lines_of_kind(&events, LogKind::Info);
        assert!(
            !infos.iter().any(|l| l.contains("Launched collector")),
            "no concurrent task is ever started: {infos:?}"
        );
    }

    #[tokio::test]
    async fn scratch_release_is_idempotent() {
        let (mut orch, _) = orchestrator(
            vec![SubmissionStep::Advance("done".into())],
            1,
            vec![&OK_COLLECTOR],
        );
        let scratch = orch.scratch_path().unwrap().to_path_buf();
        assert!(scratch.exists());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Success);
        drain(&mut rx);

        assert!(orch.release_scratch(), "first release does the removal");
        assert!(!scratch.exists());
        assert!(!orch.release_scratch(), "second release is a no-op");
    }

    #[tokio::test]
    async fn cancel_aborts_collectors_and_discards_scratch() {
        let (mut orch, _) = orchestrator(
            vec![
                SubmissionStep::Advance("slow step".into()),
                SubmissionStep::Advance("never reached".into()),
            ],
            2,
            vec![&STUCK_COLLECTOR],
        );
        // make the protocol slow enough that the cancel always wins
        let scratch = orch.scratch_path().unwrap().to_path_buf();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        ctrl_tx.send(SubmissionControl::Cancel).unwrap();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Cancelled);

        let events = drain(&mut rx);
        let cancelled = lines_of_kind(&events, LogKind::Cancelled);
        assert_eq!(cancelled.len(), 1);

        // quit discards the scratch dir before returning
        assert!(!scratch.exists());
        assert!(orch.scratch_path().is_none());
        assert!(!orch.release_scratch());
    }

    #[tokio::test]
    async fn declined_auth_is_a_submission_failure() {
        let mut protocol = ScriptedProtocol::new(vec![], 0);
        protocol.needs_auth = true;
        let mut orch = SubmissionOrchestrator::new(report(&[]), Box::new(protocol)).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert!(matches!(&verdict, Verdict::Failed(e) if e.contains("authentication")));

        let events = drain(&mut rx);
        assert_eq!(lines_of_kind(&events, LogKind::Fail).len(), 1);
    }

    #[tokio::test]
    async fn cached_credentials_skip_the_prompt() {
        let mut protocol = ScriptedProtocol::new(
            vec![SubmissionStep::Advance("done".into())],
            1,
        );
        protocol.needs_auth = true;
        protocol.cached = Some(Credentials {
            username: "u".into(),
            secret: "s".into(),
        });
        let mut orch = SubmissionOrchestrator::new(report(&[]), Box::new(protocol)).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        // a prompt that would decline: it must never be consulted
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Success);
        drain(&mut rx);
    }

    #[tokio::test]
    async fn collector_result_message_lands_in_the_log() {
        let (mut orch, _) = orchestrator(
            vec![SubmissionStep::Advance("done".into())],
            1,
            vec![&OK_COLLECTOR],
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Success);

        let events = drain(&mut rx);
        let oks = lines_of_kind(&events, LogKind::Ok);
        assert!(oks.iter().any(|l| l.contains("collected 3 file(s)")));
    }

    #[tokio::test]
    async fn collector_timeout_is_reported_as_failure() {
        let (orch, _) = orchestrator(
            vec![SubmissionStep::Advance("done".into())],
            1,
            vec![&STUCK_COLLECTOR],
        );
        let mut orch = orch.with_collector_timeout(Some(Duration::from_millis(20)));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
        let verdict = orch.run(&StubPrompt(None), &tx, &mut ctrl_rx).await;
        assert_eq!(verdict, Verdict::Success, "a timed-out collector never blocks");

        let events = drain(&mut rx);
        let fails = lines_of_kind(&events, LogKind::Fail);
        assert_eq!(fails.len(), 1);
        assert!(fails[0].contains("timed out"));
    }
}
