use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bug severity, ordered most to least urgent.
///
/// Stored with the internal name; each tracker maps it to its own label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Highest,
    High,
    Medium,
    Low,
    Lowest,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Highest,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Lowest,
    ];

    /// Label shown in the report editor.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Highest => "Critical (LP) / Highest (Jira)",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Lowest => "Lowest",
        }
    }
}

/// When the issue was filed relative to when it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingDelay {
    Immediate,
    AfterReboot,
    Later,
}

impl FilingDelay {
    pub const ALL: [FilingDelay; 3] = [
        FilingDelay::Immediate,
        FilingDelay::AfterReboot,
        FilingDelay::Later,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilingDelay::Immediate => "Right after it happened",
            FilingDelay::AfterReboot => "Device froze, reported after a reboot",
            FilingDelay::Later => "At a later stage",
        }
    }
}

/// Initial status of the created bug. Labels are capitalized on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BugStatus {
    New,
    Confirmed,
}

impl BugStatus {
    pub const ALL: [BugStatus; 2] = [BugStatus::New, BugStatus::Confirmed];

    pub fn label(self) -> &'static str {
        match self {
            BugStatus::New => "New",
            BugStatus::Confirmed => "Confirmed",
        }
    }
}

/// Three-valued selection: not yet decided, explicitly skipped, or chosen.
///
/// "Not yet chosen" and "chose nothing" route differently on back-navigation,
/// so a plain `Option` is not enough here.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<T> {
    Undecided,
    Skipped,
    Chosen(T),
}

// hand-written so T is not required to be Default itself
impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::Undecided
    }
}

impl<T> Selection<T> {
    pub fn is_undecided(&self) -> bool {
        matches!(self, Selection::Undecided)
    }

    pub fn is_chosen(&self) -> bool {
        matches!(self, Selection::Chosen(_))
    }

    pub fn chosen(&self) -> Option<&T> {
        match self {
            Selection::Chosen(v) => Some(v),
            _ => None,
        }
    }
}

/// A finalized bug report, ready for submission.
///
/// Created once when the editor is dismissed with valid input and never
/// mutated afterwards. Resubmission after a failure goes back through the
/// editor and produces a new `Report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub description: String,
    pub project: String,
    pub severity: Severity,
    pub filing_delay: FilingDelay,
    pub status: BugStatus,
    pub assignee: Option<String>,
    pub series: Option<String>,
    pub platform_tags: Vec<String>,
    pub additional_tags: Vec<String>,
    /// Internal names of the log collectors to run during submission.
    pub logs_to_include: Vec<String>,
    pub impacted_features: Vec<String>,
    pub impacted_vendors: Vec<String>,
    /// Session the report was filed from, if one was selected.
    pub session_path: Option<PathBuf>,
    pub job_id: Option<String>,
}

/// Autosaved editor state.
///
/// Written by the editor on meaningful edits and offered for recovery on the
/// next launch. All fields tolerate being partially filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub filing_delay: Option<FilingDelay>,
    #[serde(default)]
    pub status: Option<BugStatus>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub platform_tags: Vec<String>,
    #[serde(default)]
    pub additional_tags: Vec<String>,
    #[serde(default)]
    pub logs_to_include: Vec<String>,
    #[serde(default)]
    pub impacted_features: Vec<String>,
    #[serde(default)]
    pub impacted_vendors: Vec<String>,
    #[serde(default)]
    pub session_path: Option<PathBuf>,
    #[serde(default)]
    pub job_id: Option<String>,
    /// RFC 3339 timestamp of the last save.
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl ReportDraft {
    /// Turn a finalized report back into an editable draft, used when the
    /// operator returns to the editor after a submission attempt.
    pub fn from_report(report: &Report) -> Self {
        Self {
            title: report.title.clone(),
            description: report.description.clone(),
            project: report.project.clone(),
            severity: Some(report.severity),
            filing_delay: Some(report.filing_delay),
            status: Some(report.status),
            assignee: report.assignee.clone(),
            series: report.series.clone(),
            platform_tags: report.platform_tags.clone(),
            additional_tags: report.additional_tags.clone(),
            logs_to_include: report.logs_to_include.clone(),
            impacted_features: report.impacted_features.clone(),
            impacted_vendors: report.impacted_vendors.clone(),
            session_path: report.session_path.clone(),
            job_id: report.job_id.clone(),
            saved_at: None,
        }
    }
}

/// Impacted-feature classification: display name to tracker tags.
pub const FEATURE_TAGS: &[(&str, &[&str])] = &[
    ("Audio", &["hwe-audio"]),
    ("Bluetooth", &["hwe-bluetooth"]),
    ("Camera", &["oem-camera"]),
    ("External Storage", &["oem-storage"]),
    ("Fingerprint Reader", &["hwe-fingerprint"]),
    ("Firmware", &["hwe-firmware"]),
    ("Hotkeys", &["hwe-hotkeys"]),
    ("Install", &["hwe-installer"]),
    ("Media Card", &["hwe-media"]),
    ("Missing driver", &["hwe-needs-driver"]),
    ("Networking (ethernet)", &["hwe-networking-ethernet", "oem-networking"]),
    ("Networking (modem)", &["hwe-networking-modem", "oem-networking"]),
    ("Networking (wifi)", &["hwe-networking-wifi", "oem-networking"]),
    ("Other Problem", &["oem-other"]),
    ("Performance", &["oem-performance"]),
    ("Power Management", &["hwe-suspend-resume"]),
    ("Power On/Off", &["hwe-powercycle"]),
    ("Secure Boot", &["oem-secureboot"]),
    ("Sensor", &["hwe-sensor"]),
    ("TPM", &["hwe-tpm"]),
    ("Touchpad", &["hwe-touchpad"]),
    ("Touchscreen", &["oem-touchscreen"]),
    ("USB", &["hwe-usb"]),
    ("Video", &["hwe-graphics"]),
    ("Watchdog", &["hwe-watchdog"]),
];

/// Impacted-vendor classification: display name to tracker tags.
pub const VENDOR_TAGS: &[(&str, &[&str])] = &[
    ("AMD", &["ihv-amd"]),
    ("Atheros/Qualcomm", &["ihv-qualcomm-atheros"]),
    ("Intel", &["ihv-intel"]),
    ("MTK", &["ihv-mtk"]),
    ("Marvell", &["ihv-marvell"]),
    ("Nvidia", &["ihv-nvidia"]),
    ("Quectel", &["ihv-quectel"]),
    ("Realtek", &["ihv-realtek"]),
    ("Sierra", &["ihv-sierra"]),
    ("Telit", &["ihv-telit"]),
];

/// Is the app running with relaxed checks and mock collectors?
pub fn is_debug() -> bool {
    std::env::var("HWBUG_DEBUG").map(|v| v == "1").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_default_is_undecided() {
        let s: Selection<String> = Selection::default();
        assert!(s.is_undecided());
        assert!(!s.is_chosen());
        assert_eq!(s.chosen(), None);
    }

    #[test]
    fn draft_round_trips_a_report() {
        let report = Report {
            title: "panel flickers".into(),
            description: "flickers on resume".into(),
            project: "STELLA".into(),
            severity: Severity::High,
            filing_delay: FilingDelay::Immediate,
            status: BugStatus::Confirmed,
            assignee: Some("someone".into()),
            series: None,
            platform_tags: vec!["stella-r5".into()],
            additional_tags: vec![],
            logs_to_include: vec!["sos-report".into()],
            impacted_features: vec!["Video".into()],
            impacted_vendors: vec!["Intel".into()],
            session_path: None,
            job_id: Some("graphics/flicker".into()),
        };
        let draft = ReportDraft::from_report(&report);
        assert_eq!(draft.title, report.title);
        assert_eq!(draft.severity, Some(report.severity));
        assert_eq!(draft.job_id, report.job_id);

        let json = serde_json::to_string(&draft).unwrap();
        let back: ReportDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(back, draft);
    }
}
