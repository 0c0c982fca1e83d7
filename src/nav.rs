//! Wizard navigation.
//!
//! A small fixed state machine: each screen computes its successor from the
//! value the dismissed screen returned, and its predecessor for explicit
//! back-navigation. The shared context is replaced wholesale on every
//! transition, never mutated behind the machine's back, so each screen's
//! entry assertions can check exactly what it was handed.

use std::path::{Path, PathBuf};

use crate::model::{Report, ReportDraft, Selection};
use crate::sessions::{SessionRef, SubmissionArchive};
use crate::storage;

/// Context record threaded through the wizard.
#[derive(Debug, Clone, Default)]
pub struct NavContext {
    pub session: Selection<SessionRef>,
    pub job: Selection<String>,
    /// Draft offered to the editor as a backup; `None` means no backup.
    pub draft: Option<ReportDraft>,
    /// The finalized report; exists only in `SubmissionProgress` and later.
    pub report: Option<Report>,
    /// Externally supplied historical submission, if any.
    pub archive: Option<SubmissionArchive>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    RecoverAutosave,
    SessionSelect,
    JobSelect,
    ReportEditor,
    SubmissionProgress,
    Quit,
}

/// Menu choices offered after a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnChoice {
    Job,
    Session,
    Quit,
    ReportEditor,
}

/// Value returned by a dismissed screen.
#[derive(Debug, Clone)]
pub enum ScreenResult {
    /// Recovery screen closed, with or without a recovered draft.
    AutosaveClosed(Option<ReportDraft>),
    SessionPicked(SessionRef),
    SessionSkipped,
    JobPicked(String),
    JobSkipped,
    ReportFinalized(Report),
    /// The editor was dismissed without producing a report; stay put.
    EditorCancelled,
    SubmissionFinished(ReturnChoice),
}

impl Screen {
    /// Entry invariants. A violation is a bug in transition computation, not
    /// a user-facing condition, so it brings the process down loudly.
    pub fn assertions(self, ctx: &NavContext) {
        match self {
            Screen::RecoverAutosave | Screen::SessionSelect => {
                assert!(
                    ctx.session.is_undecided() && ctx.job.is_undecided(),
                    "{self:?} entered with selections already made"
                );
                assert!(ctx.report.is_none(), "{self:?} entered with a finalized report");
            }
            Screen::JobSelect => {
                assert!(
                    !ctx.session.is_undecided(),
                    "job selection entered before the session was decided"
                );
                assert!(ctx.job.is_undecided(), "job selection entered with a job already decided");
                assert!(ctx.report.is_none(), "job selection entered with a finalized report");
            }
            Screen::ReportEditor => {
                assert!(
                    !ctx.session.is_undecided() && !ctx.job.is_undecided(),
                    "editor entered before session/job were decided"
                );
                assert!(ctx.report.is_none(), "editor entered with a finalized report");
                Self::assert_job_source(ctx);
            }
            Screen::SubmissionProgress => {
                assert!(
                    ctx.report.is_some(),
                    "submission entered without a finalized report"
                );
                assert!(
                    !ctx.session.is_undecided() && !ctx.job.is_undecided(),
                    "submission entered before session/job were decided"
                );
                Self::assert_job_source(ctx);
            }
            Screen::Quit => {}
        }
    }

    /// A chosen job must have come from somewhere: a chosen session or an
    /// archive. An explicitly skipped job needs no source.
    fn assert_job_source(ctx: &NavContext) {
        if ctx.job.is_chosen() {
            assert!(
                ctx.session.is_chosen() || ctx.archive.is_some(),
                "a job was chosen with neither a session nor an archive to supply it"
            );
        }
    }

    /// Next screen for a screen result, or `None` to stay on this screen.
    /// A result this screen can never produce is a programming error.
    fn forward(self, result: ScreenResult, mut ctx: NavContext) -> Option<(Screen, NavContext)> {
        match (self, result) {
            (Screen::RecoverAutosave, ScreenResult::AutosaveClosed(draft)) => {
                ctx.draft = draft;
                Some((Screen::SessionSelect, ctx))
            }
            (Screen::SessionSelect, ScreenResult::SessionPicked(session)) => {
                ctx.session = Selection::Chosen(session);
                Some((Screen::JobSelect, ctx))
            }
            (Screen::SessionSelect, ScreenResult::SessionSkipped) => {
                ctx.session = Selection::Skipped;
                Some((Screen::JobSelect, ctx))
            }
            (Screen::JobSelect, ScreenResult::JobPicked(job_id)) => {
                ctx.job = Selection::Chosen(job_id);
                Some((Screen::ReportEditor, ctx))
            }
            (Screen::JobSelect, ScreenResult::JobSkipped) => {
                ctx.job = Selection::Skipped;
                Some((Screen::ReportEditor, ctx))
            }
            (Screen::ReportEditor, ScreenResult::ReportFinalized(report)) => {
                ctx.report = Some(report);
                Some((Screen::SubmissionProgress, ctx))
            }
            (Screen::ReportEditor, ScreenResult::EditorCancelled) => None,
            (Screen::SubmissionProgress, ScreenResult::SubmissionFinished(choice)) => {
                match choice {
                    ReturnChoice::Quit => Some((Screen::Quit, ctx)),
                    ReturnChoice::Job => {
                        // Only offered when a session is chosen; the menu must
                        // not present it otherwise.
                        assert!(
                            ctx.session.is_chosen(),
                            "job reselection requires a chosen session"
                        );
                        ctx.job = Selection::Undecided;
                        ctx.report = None;
                        ctx.draft = None;
                        Some((Screen::JobSelect, ctx))
                    }
                    ReturnChoice::Session => Some((
                        Screen::SessionSelect,
                        NavContext {
                            archive: ctx.archive,
                            ..NavContext::default()
                        },
                    )),
                    ReturnChoice::ReportEditor => {
                        let report = ctx
                            .report
                            .take()
                            .expect("submission screen always holds a report");
                        ctx.draft = Some(ReportDraft::from_report(&report));
                        Some((Screen::ReportEditor, ctx))
                    }
                }
            }
            (screen, result) => {
                panic!("screen {screen:?} cannot accept result {result:?}")
            }
        }
    }

    /// Prior screen, or `None` when there is nowhere to go back to and the
    /// current screen stays active.
    fn backward(self, mut ctx: NavContext, autosave_dir: &Path) -> Option<(Screen, NavContext)> {
        match self {
            Screen::RecoverAutosave => None,
            Screen::SessionSelect => {
                if storage::has_drafts(autosave_dir) {
                    Some((Screen::RecoverAutosave, ctx))
                } else {
                    None
                }
            }
            Screen::JobSelect => {
                ctx.session = Selection::Undecided;
                ctx.job = Selection::Undecided;
                Some((Screen::SessionSelect, ctx))
            }
            Screen::ReportEditor => {
                if ctx.session.is_chosen() || ctx.archive.is_some() {
                    ctx.job = Selection::Undecided;
                    Some((Screen::JobSelect, ctx))
                } else {
                    // Both selections were explicitly skipped and nothing can
                    // supply jobs; the only place left is the very beginning.
                    ctx.session = Selection::Undecided;
                    ctx.job = Selection::Undecided;
                    Some((Screen::RecoverAutosave, ctx))
                }
            }
            // A submission in flight cannot be backed out of; the terminal
            // menu is the only way off this screen.
            Screen::SubmissionProgress => None,
            Screen::Quit => None,
        }
    }
}

/// The navigation state machine driving which screen is active.
pub struct Nsm {
    screen: Screen,
    ctx: NavContext,
    autosave_dir: PathBuf,
}

impl Nsm {
    pub fn new(autosave_dir: PathBuf, archive: Option<SubmissionArchive>) -> Self {
        let nsm = Self {
            screen: Screen::RecoverAutosave,
            ctx: NavContext {
                archive,
                ..NavContext::default()
            },
            autosave_dir,
        };
        nsm.screen.assertions(&nsm.ctx);
        nsm
    }

    pub fn current(&self) -> Screen {
        self.screen
    }

    pub fn context(&self) -> &NavContext {
        &self.ctx
    }

    /// Feed the result of the just-dismissed screen. Returns whether the
    /// machine moved; `false` means the current screen stays active.
    pub fn dispatch(&mut self, result: ScreenResult) -> bool {
        match self.screen.forward(result, self.ctx.clone()) {
            Some((next, ctx)) => {
                next.assertions(&ctx);
                tracing::debug!("nav: {:?} -> {:?}", self.screen, next);
                self.screen = next;
                self.ctx = ctx;
                true
            }
            None => false,
        }
    }

    /// Explicit back-navigation. Returns whether the machine moved.
    pub fn go_back(&mut self) -> bool {
        match self.screen.backward(self.ctx.clone(), &self.autosave_dir) {
            Some((prev, ctx)) => {
                prev.assertions(&ctx);
                tracing::debug!("nav: {:?} <- {:?}", prev, self.screen);
                self.screen = prev;
                self.ctx = ctx;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BugStatus, FilingDelay, Severity};
    use std::collections::BTreeMap;

    fn report() -> Report {
        Report {
            title: "t".into(),
            description: "d".into(),
            project: "STELLA".into(),
            severity: Severity::Medium,
            filing_delay: FilingDelay::Later,
            status: BugStatus::Confirmed,
            assignee: None,
            series: None,
            platform_tags: vec![],
            additional_tags: vec![],
            logs_to_include: vec![],
            impacted_features: vec![],
            impacted_vendors: vec![],
            session_path: None,
            job_id: None,
        }
    }

    fn session_fixture(dir: &std::path::Path) -> SessionRef {
        let session_dir = dir.join("2026-02-01T09.30.00");
        std::fs::create_dir_all(session_dir.join("io-logs")).unwrap();
        std::fs::write(session_dir.join("io-logs/j.stdout"), "x").unwrap();
        std::fs::write(
            session_dir.join("session.json"),
            r#"{"testplan_id": "tp", "results": {"a/b": [{"outcome": "fail", "return_code": 1}]}}"#,
        )
        .unwrap();
        SessionRef::load(&session_dir).unwrap()
    }

    fn nsm() -> (Nsm, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        (Nsm::new(tmp.path().to_path_buf(), None), tmp)
    }

    #[test]
    fn happy_path_reaches_submission() {
        let (mut nsm, tmp) = nsm();
        let session = session_fixture(tmp.path());

        assert_eq!(nsm.current(), Screen::RecoverAutosave);
        assert!(nsm.dispatch(ScreenResult::AutosaveClosed(None)));
        assert_eq!(nsm.current(), Screen::SessionSelect);
        assert!(nsm.dispatch(ScreenResult::SessionPicked(session)));
        assert_eq!(nsm.current(), Screen::JobSelect);
        assert!(nsm.dispatch(ScreenResult::JobPicked("a/b".into())));
        assert_eq!(nsm.current(), Screen::ReportEditor);
        assert!(nsm.dispatch(ScreenResult::ReportFinalized(report())));
        assert_eq!(nsm.current(), Screen::SubmissionProgress);
        assert!(nsm.context().report.is_some());
    }

    #[test]
    fn skipping_both_selections_reaches_editor() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        assert_eq!(nsm.current(), Screen::JobSelect);
        nsm.dispatch(ScreenResult::JobSkipped);
        assert_eq!(nsm.current(), Screen::ReportEditor);
        assert_eq!(nsm.context().session, Selection::Skipped);
        assert_eq!(nsm.context().job, Selection::Skipped);
    }

    #[test]
    fn editor_cancel_stays_put() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        nsm.dispatch(ScreenResult::JobSkipped);
        assert!(!nsm.dispatch(ScreenResult::EditorCancelled));
        assert_eq!(nsm.current(), Screen::ReportEditor);
    }

    #[test]
    fn recovered_draft_is_kept_in_context() {
        let (mut nsm, _tmp) = nsm();
        let draft = ReportDraft {
            title: "recovered".into(),
            ..Default::default()
        };
        nsm.dispatch(ScreenResult::AutosaveClosed(Some(draft)));
        assert_eq!(nsm.context().draft.as_ref().unwrap().title, "recovered");
    }

    #[test]
    fn editor_back_with_everything_skipped_returns_to_recovery() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        nsm.dispatch(ScreenResult::JobSkipped);
        assert_eq!(nsm.current(), Screen::ReportEditor);

        assert!(nsm.go_back());
        assert_eq!(nsm.current(), Screen::RecoverAutosave);
        assert!(nsm.context().session.is_undecided());
        assert!(nsm.context().job.is_undecided());
    }

    #[test]
    fn editor_back_with_session_returns_to_job_select() {
        let (mut nsm, tmp) = nsm();
        let session = session_fixture(tmp.path());
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionPicked(session));
        nsm.dispatch(ScreenResult::JobPicked("a/b".into()));

        assert!(nsm.go_back());
        assert_eq!(nsm.current(), Screen::JobSelect);
        assert!(nsm.context().session.is_chosen());
        assert!(nsm.context().job.is_undecided());
    }

    #[test]
    fn session_select_back_depends_on_drafts_on_disk() {
        let (mut nsm, tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        assert_eq!(nsm.current(), Screen::SessionSelect);

        // nothing recoverable on disk: stay
        assert!(!nsm.go_back());
        assert_eq!(nsm.current(), Screen::SessionSelect);

        storage::write_draft(&tmp.path().join("1.json"), &ReportDraft::default()).unwrap();
        assert!(nsm.go_back());
        assert_eq!(nsm.current(), Screen::RecoverAutosave);
    }

    #[test]
    fn submission_cannot_be_backed_out_of() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        nsm.dispatch(ScreenResult::JobSkipped);
        nsm.dispatch(ScreenResult::ReportFinalized(report()));
        assert_eq!(nsm.current(), Screen::SubmissionProgress);

        assert!(!nsm.go_back());
        assert_eq!(nsm.current(), Screen::SubmissionProgress);
    }

    #[test]
    fn menu_quit_terminates() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        nsm.dispatch(ScreenResult::JobSkipped);
        nsm.dispatch(ScreenResult::ReportFinalized(report()));
        nsm.dispatch(ScreenResult::SubmissionFinished(ReturnChoice::Quit));
        assert_eq!(nsm.current(), Screen::Quit);
    }

    #[test]
    fn menu_session_resets_everything_but_the_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SubmissionArchive {
            testplan_id: "tp".into(),
            results: BTreeMap::new(),
        };
        let mut nsm = Nsm::new(tmp.path().to_path_buf(), Some(archive));
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        nsm.dispatch(ScreenResult::JobSkipped);
        nsm.dispatch(ScreenResult::ReportFinalized(report()));
        nsm.dispatch(ScreenResult::SubmissionFinished(ReturnChoice::Session));

        assert_eq!(nsm.current(), Screen::SessionSelect);
        assert!(nsm.context().session.is_undecided());
        assert!(nsm.context().job.is_undecided());
        assert!(nsm.context().report.is_none());
        assert!(nsm.context().draft.is_none());
        assert!(nsm.context().archive.is_some());
    }

    #[test]
    fn menu_job_keeps_session_and_clears_the_rest() {
        let (mut nsm, tmp) = nsm();
        let session = session_fixture(tmp.path());
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionPicked(session));
        nsm.dispatch(ScreenResult::JobPicked("a/b".into()));
        nsm.dispatch(ScreenResult::ReportFinalized(report()));
        nsm.dispatch(ScreenResult::SubmissionFinished(ReturnChoice::Job));

        assert_eq!(nsm.current(), Screen::JobSelect);
        assert!(nsm.context().session.is_chosen());
        assert!(nsm.context().job.is_undecided());
        assert!(nsm.context().report.is_none());
    }

    #[test]
    fn menu_editor_turns_the_report_into_a_backup_draft() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        nsm.dispatch(ScreenResult::JobSkipped);
        nsm.dispatch(ScreenResult::ReportFinalized(report()));
        nsm.dispatch(ScreenResult::SubmissionFinished(ReturnChoice::ReportEditor));

        assert_eq!(nsm.current(), Screen::ReportEditor);
        assert!(nsm.context().report.is_none(), "report field is cleared");
        let draft = nsm.context().draft.as_ref().expect("draft kept as backup");
        assert_eq!(draft.title, "t");
        assert_eq!(draft.project, "STELLA");
    }

    #[test]
    #[should_panic(expected = "cannot accept result")]
    fn impossible_result_is_fatal() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::JobPicked("a/b".into()));
    }

    #[test]
    #[should_panic(expected = "job reselection requires a chosen session")]
    fn menu_job_without_a_session_is_fatal() {
        let (mut nsm, _tmp) = nsm();
        nsm.dispatch(ScreenResult::AutosaveClosed(None));
        nsm.dispatch(ScreenResult::SessionSkipped);
        nsm.dispatch(ScreenResult::JobSkipped);
        nsm.dispatch(ScreenResult::ReportFinalized(report()));
        nsm.dispatch(ScreenResult::SubmissionFinished(ReturnChoice::Job));
    }

    #[test]
    #[should_panic(expected = "neither a session nor an archive")]
    fn chosen_job_without_a_source_is_fatal() {
        let ctx = NavContext {
            session: Selection::Skipped,
            job: Selection::Chosen("a/b".into()),
            ..NavContext::default()
        };
        Screen::ReportEditor.assertions(&ctx);
    }
}
