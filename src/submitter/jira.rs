//! Jira backend.
//!
//! Same shape as the Launchpad backend with a shorter sequence: Jira creates
//! the issue with all fields in one request, so there is no settings pass.

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
const WEB_ROOT: &str = "https://warthogs.atlassian.net/browse";

pub struct JiraProtocol {
    auth: Option<Credentials>,
    bug_url: Arc<OnceLock<String>>,
}

impl JiraProtocol {
    pub fn new() -> Self {
        Self {
            auth: None,
            bug_url: Arc::new(OnceLock::new()),
        }
    }

    fn plan(&self, report: &Report) -> Vec<SubmissionStep> {
        let mut steps = vec![SubmissionStep::Message("Connecting to Jira".to_string())];
        match &self.auth {
            None => {
                steps.push(SubmissionStep::Failure(
                    "no Jira credentials available".to_string(),
                ));
                return steps;
            }
            Some(auth) => {
                steps.push(SubmissionStep::Advance(format!(
                    "Authenticated as {}",
                    auth.username
                )));
            }
        }

        let project = report.project.trim();
        if project.is_empty() || !project.chars().all(char::is_alphanumeric) {
            steps.push(SubmissionStep::Failure(format!(
                "Project '{}' doesn't exist on this Jira instance",
                report.project
            )));
            return steps;
        }
        steps.push(SubmissionStep::Advance(format!("Project '{project}' exists")));

        // assignee/components ride along in the create request; Jira decides
        // whether they resolve
        let mut fields = vec![format!("priority={}", self.severity_label(report.severity))];
        if let Some(assignee) = &report.assignee {
            fields.push(format!("assignee={assignee}"));
        }
        if !report.platform_tags.is_empty() {
            fields.push(format!("components={}", report.platform_tags.join(",")));
        }
        steps.push(SubmissionStep::Message(format!(
            "Creating issue with {}",
            fields.join(", ")
        )));

        let key = format!("{}-{}", project.to_uppercase(), pseudo_issue_number(report));
        steps.push(SubmissionStep::Advance(format!("Created {key}")));

        let url = format!("{WEB_ROOT}/{key}");
        steps.push(SubmissionStep::Advance(format!("Issue URL is: {url}")));
        let _ = self.bug_url.set(url);
        steps
    }
}

fn pseudo_issue_number(report: &Report) -> u32 {
    let mut n = 17u32;
    for b in report.title.bytes() {
        n = n.wrapping_mul(37).wrapping_add(u32::from(b));
    }
    1000 + n % 9000
}

impl SubmissionProtocol for JiraProtocol {
    fn name(&self) -> &'static str {
        "jira"
    }

    fn display_name(&self) -> &'static str {
        "Jira"
    }

    fn declared_steps(&self) -> u64 {
        4
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
                tracing::warn!("failed to cache Jira credentials: {e:#}");
            }
        }
        self.auth = Some(auth);
    }

    fn submit(&mut self, report: &Report) -> BoxStream<'static, SubmissionStep> {
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
            Severity::Highest => "Highest",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Lowest => "Lowest",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BugStatus, FilingDelay};

    fn report() -> Report {
        Report {
            title: "no audio".into(),
            description: "dummy output only".into(),
            project: "STELLA".into(),
            severity: Severity::Medium,
            filing_delay: FilingDelay::Immediate,
            status: BugStatus::New,
            assignee: Some("qa@example.com".into()),
            series: None,
            platform_tags: vec!["stella-r5".into()],
            additional_tags: vec![],
            logs_to_include: vec![],
            impacted_features: vec![],
            impacted_vendors: vec![],
            session_path: None,
            job_id: None,
        }
    }

    #[test]
    fn happy_path_advances_match_declared_steps() {
        let mut p = JiraProtocol::new();
        p.auth = Some(Credentials {
            username: "qa@example.com".into(),
            secret: "token".into(),
        });
        let steps = p.plan(&report());
        let advances = steps
            .iter()
            .filter(|s| matches!(s, SubmissionStep::Advance(_)))
            .count();
        assert_eq!(advances as u64, p.declared_steps());
        let url = p.bug_url().unwrap();
        assert!(url.contains("STELLA-"), "unexpected url {url}");
    }

    #[test]
    fn non_alphanumeric_project_is_rejected() {
        let mut p = JiraProtocol::new();
        p.auth = Some(Credentials {
            username: "u".into(),
            secret: "s".into(),
        });
        let steps = p.plan(&Report {
            project: "not a project".into(),
            ..report()
        });
        assert!(matches!(steps.last(), Some(SubmissionStep::Failure(_))));
    }
}
