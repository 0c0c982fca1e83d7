//! Report editor.
//!
//! A single scrolling form. Every meaningful edit is autosaved so a crash or
//! power cut never loses operator input.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use std::path::PathBuf;

use crate::cli::AppConfig;
use crate::collectors::{self, LogCollector};
use crate::model::{
    BugStatus, FilingDelay, Report, ReportDraft, Severity, FEATURE_TAGS, VENDOR_TAGS,
};
use crate::nav::{NavContext, ScreenResult};
use crate::storage;
use crate::tui::screens::{is_back, is_quit, ScreenOutcome, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Title,
    Description,
    Project,
    Assignee,
    Series,
    PlatformTags,
    AdditionalTags,
    Severity,
    Delay,
    Status,
    Log(usize),
    Feature(usize),
    Vendor(usize),
}

struct EditorState {
    title: String,
    description: String,
    project: String,
    assignee: String,
    series: String,
    platform_tags: String,
    additional_tags: String,
    severity_idx: usize,
    delay_idx: usize,
    status_idx: usize,
    logs: Vec<(&'static LogCollector, bool)>,
    features: Vec<(&'static str, bool)>,
    vendors: Vec<(&'static str, bool)>,
    focus: usize,
    error: String,
    draft_path: PathBuf,
    debug: bool,
}

fn index_of<T: PartialEq>(all: &[T], wanted: Option<T>, default: usize) -> usize {
    wanted
        .and_then(|v| all.iter().position(|x| *x == v))
        .unwrap_or(default)
}

impl EditorState {
    fn new(cfg: &AppConfig, ctx: &NavContext) -> Self {
        let draft = ctx.draft.clone().unwrap_or_default();
        let prefill = &cfg.prefill;

        let mut description = draft.description.clone();
        if description.is_empty() {
            // seed the device identity block the team expects in every report
            let mut lines = Vec::new();
            if let Some(cid) = &prefill.cid {
                lines.push(format!("CID: {cid}"));
            }
            if let Some(sku) = &prefill.sku {
                lines.push(format!("SKU: {sku}"));
            }
            description = lines.join("\n");
        }

        let had_draft = ctx.draft.is_some();
        let logs = collectors::registry()
            .iter()
            .map(|c| {
                let on = if had_draft {
                    draft.logs_to_include.iter().any(|n| n == c.name)
                } else {
                    c.default_selected
                };
                (c, on)
            })
            .collect();

        Self {
            title: draft.title,
            description,
            project: if draft.project.is_empty() {
                prefill.project.clone().unwrap_or_default()
            } else {
                draft.project
            },
            assignee: draft
                .assignee
                .or_else(|| prefill.assignee.clone())
                .unwrap_or_default(),
            series: draft.series.unwrap_or_default(),
            platform_tags: if draft.platform_tags.is_empty() {
                prefill.platform_tags.join(", ")
            } else {
                draft.platform_tags.join(", ")
            },
            additional_tags: if draft.additional_tags.is_empty() {
                prefill.tags.join(", ")
            } else {
                draft.additional_tags.join(", ")
            },
            severity_idx: index_of(&Severity::ALL, draft.severity, 2),
            delay_idx: index_of(&FilingDelay::ALL, draft.filing_delay, 0),
            status_idx: index_of(&BugStatus::ALL, draft.status, 1),
            logs,
            features: FEATURE_TAGS
                .iter()
                .map(|(name, _)| (*name, draft.impacted_features.iter().any(|f| f == name)))
                .collect(),
            vendors: VENDOR_TAGS
                .iter()
                .map(|(name, _)| (*name, draft.impacted_vendors.iter().any(|v| v == name)))
                .collect(),
            focus: 0,
            error: String::new(),
            draft_path: storage::new_draft_path(&cfg.autosave_dir),
            debug: cfg.debug,
        }
    }

    fn focus_order(&self) -> Vec<Focus> {
        let mut order = vec![
            Focus::Title,
            Focus::Description,
            Focus::Project,
            Focus::Assignee,
            Focus::Series,
            Focus::PlatformTags,
            Focus::AdditionalTags,
            Focus::Severity,
            Focus::Delay,
            Focus::Status,
        ];
        order.extend((0..self.logs.len()).map(Focus::Log));
        order.extend((0..self.features.len()).map(Focus::Feature));
        order.extend((0..self.vendors.len()).map(Focus::Vendor));
        order
    }

    fn focused(&self) -> Focus {
        self.focus_order()[self.focus]
    }

    fn text_of(&mut self, focus: Focus) -> Option<&mut String> {
        match focus {
            Focus::Title => Some(&mut self.title),
            Focus::Description => Some(&mut self.description),
            Focus::Project => Some(&mut self.project),
            Focus::Assignee => Some(&mut self.assignee),
            Focus::Series => Some(&mut self.series),
            Focus::PlatformTags => Some(&mut self.platform_tags),
            Focus::AdditionalTags => Some(&mut self.additional_tags),
            _ => None,
        }
    }

    fn to_draft(&self, ctx: &NavContext) -> ReportDraft {
        ReportDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            project: self.project.clone(),
            severity: Some(Severity::ALL[self.severity_idx]),
            filing_delay: Some(FilingDelay::ALL[self.delay_idx]),
            status: Some(BugStatus::ALL[self.status_idx]),
            assignee: opt(&self.assignee),
            series: opt(&self.series),
            platform_tags: split_tags(&self.platform_tags),
            additional_tags: split_tags(&self.additional_tags),
            logs_to_include: self
                .logs
                .iter()
                .filter(|(_, on)| *on)
                .map(|(c, _)| c.name.to_string())
                .collect(),
            impacted_features: selected(&self.features),
            impacted_vendors: selected(&self.vendors),
            session_path: ctx.session.chosen().map(|s| s.path.clone()),
            job_id: ctx.job.chosen().cloned(),
            saved_at: None,
        }
    }

    fn finalize(&self, ctx: &NavContext) -> Result<Report, String> {
        if self.title.trim().is_empty() {
            return Err("Title must not be empty".into());
        }
        if self.description.trim().is_empty() {
            return Err("Description must not be empty".into());
        }
        let project = self.project.trim();
        if project.is_empty() || !project.chars().all(char::is_alphanumeric) {
            return Err("Project must be a non-empty alphanumeric string".into());
        }
        let draft = self.to_draft(ctx);
        Ok(Report {
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            project: project.to_string(),
            severity: Severity::ALL[self.severity_idx],
            filing_delay: FilingDelay::ALL[self.delay_idx],
            status: BugStatus::ALL[self.status_idx],
            assignee: draft.assignee,
            series: draft.series,
            platform_tags: draft.platform_tags,
            additional_tags: draft.additional_tags,
            logs_to_include: draft.logs_to_include,
            impacted_features: draft.impacted_features,
            impacted_vendors: draft.impacted_vendors,
            session_path: draft.session_path,
            job_id: draft.job_id,
        })
    }

    fn autosave(&self, ctx: &NavContext) {
        if let Err(e) = storage::write_draft(&self.draft_path, &self.to_draft(ctx)) {
            tracing::warn!("autosave failed: {e:#}");
        }
    }
}

fn opt(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn split_tags(s: &str) -> Vec<String> {
    s.split([',', ' '])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn selected(items: &[(&'static str, bool)]) -> Vec<String> {
    items
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| name.to_string())
        .collect()
}

pub async fn run(
    terminal: &mut Term,
    keys: &mut crossterm::event::EventStream,
    cfg: &AppConfig,
    ctx: &NavContext,
) -> Result<ScreenOutcome> {
    let mut state = EditorState::new(cfg, ctx);

    loop {
        terminal.draw(|f| draw(f, &state))?;

        let Some(Ok(event)) = keys.next().await else {
            return Ok(ScreenOutcome::QuitApp);
        };
        let Event::Key(key) = event else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if is_quit(&key) {
            return Ok(ScreenOutcome::QuitApp);
        }
        if is_back(&key) {
            return Ok(ScreenOutcome::Back);
        }

        let order_len = state.focus_order().len();
        let mut edited = false;
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('s')) => match state.finalize(ctx) {
                Ok(report) => {
                    state.autosave(ctx);
                    return Ok(ScreenOutcome::Forward(ScreenResult::ReportFinalized(report)));
                }
                Err(msg) => state.error = msg,
            },
            (_, KeyCode::Down) | (_, KeyCode::Tab) => {
                state.focus = (state.focus + 1) % order_len;
            }
            (_, KeyCode::Up) | (_, KeyCode::BackTab) => {
                state.focus = state.focus.checked_sub(1).unwrap_or(order_len - 1);
            }
            (_, KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')) => {
                let step: i64 = if key.code == KeyCode::Left { -1 } else { 1 };
                match state.focused() {
                    Focus::Severity => {
                        state.severity_idx = cycle(state.severity_idx, Severity::ALL.len(), step);
                        edited = true;
                    }
                    Focus::Delay => {
                        state.delay_idx = cycle(state.delay_idx, FilingDelay::ALL.len(), step);
                        edited = true;
                    }
                    Focus::Status => {
                        state.status_idx = cycle(state.status_idx, BugStatus::ALL.len(), step);
                        edited = true;
                    }
                    Focus::Log(i) => {
                        state.logs[i].1 = !state.logs[i].1;
                        edited = true;
                    }
                    Focus::Feature(i) => {
                        state.features[i].1 = !state.features[i].1;
                        edited = true;
                    }
                    Focus::Vendor(i) => {
                        state.vendors[i].1 = !state.vendors[i].1;
                        edited = true;
                    }
                    focus => {
                        if key.code == KeyCode::Char(' ') {
                            if let Some(text) = state.text_of(focus) {
                                text.push(' ');
                                edited = true;
                            }
                        }
                    }
                }
            }
            (_, KeyCode::Enter) => {
                let focus = state.focused();
                if let Some(text) = state.text_of(focus) {
                    if focus == Focus::Description {
                        text.push('\n');
                        edited = true;
                    }
                }
            }
            (_, KeyCode::Backspace) => {
                let focus = state.focused();
                if let Some(text) = state.text_of(focus) {
                    text.pop();
                    edited = true;
                }
            }
            (mods, KeyCode::Char(c)) if !mods.contains(KeyModifiers::CONTROL) => {
                let focus = state.focused();
                if let Some(text) = state.text_of(focus) {
                    text.push(c);
                    edited = true;
                }
            }
            _ => {}
        }
        if edited {
            state.error.clear();
            state.autosave(ctx);
        }
    }
}

fn cycle(idx: usize, len: usize, step: i64) -> usize {
    (idx as i64 + step).rem_euclid(len as i64) as usize
}

fn draw(f: &mut Frame, state: &EditorState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(f.area());

    let header = if state.debug {
        "Bug Report Editor (DEBUG MODE)"
    } else {
        "Bug Report Editor"
    };
    f.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::BOTTOM)),
        chunks[0],
    );

    let order = state.focus_order();
    let mut rows: Vec<Line> = Vec::new();
    let mut focus_row = 0usize;
    let mut push = |rows: &mut Vec<Line<'static>>, focus: Option<Focus>, text: String| {
        let is_focused = focus.is_some_and(|fo| fo == order[state.focus]);
        if is_focused {
            focus_row = rows.len();
        }
        rows.push(render_row(text, is_focused));
    };

    push(&mut rows, Some(Focus::Title), format!("Title: {}", state.title));
    push(
        &mut rows,
        Some(Focus::Description),
        format!("Description: {}", state.description.replace('\n', " | ")),
    );
    push(&mut rows, Some(Focus::Project), format!("Project: {}", state.project));
    push(&mut rows, Some(Focus::Assignee), format!("Assignee: {}", state.assignee));
    push(&mut rows, Some(Focus::Series), format!("Series: {}", state.series));
    push(
        &mut rows,
        Some(Focus::PlatformTags),
        format!("Platform tags: {}", state.platform_tags),
    );
    push(
        &mut rows,
        Some(Focus::AdditionalTags),
        format!("Additional tags: {}", state.additional_tags),
    );
    push(
        &mut rows,
        Some(Focus::Severity),
        format!("Severity: {}", Severity::ALL[state.severity_idx].label()),
    );
    push(
        &mut rows,
        Some(Focus::Delay),
        format!("Filed: {}", FilingDelay::ALL[state.delay_idx].label()),
    );
    push(
        &mut rows,
        Some(Focus::Status),
        format!("Status: {}", BugStatus::ALL[state.status_idx].label()),
    );

    rows.push(section("Logs to include"));
    for (i, (collector, on)) in state.logs.iter().enumerate() {
        push(
            &mut rows,
            Some(Focus::Log(i)),
            format!("[{}] {}", mark(*on), collector.display_name),
        );
    }
    rows.push(section("Impacted features"));
    for (i, (name, on)) in state.features.iter().enumerate() {
        push(&mut rows, Some(Focus::Feature(i)), format!("[{}] {name}", mark(*on)));
    }
    rows.push(section("Impacted vendors"));
    for (i, (name, on)) in state.vendors.iter().enumerate() {
        push(&mut rows, Some(Focus::Vendor(i)), format!("[{}] {name}", mark(*on)));
    }

    let height = chunks[1].height.saturating_sub(2) as usize;
    let scroll = focus_row.saturating_sub(height / 2) as u16;
    f.render_widget(
        Paragraph::new(rows)
            .scroll((scroll, 0))
            .block(Block::default().borders(Borders::ALL).title("Report")),
        chunks[1],
    );

    let footer = Paragraph::new(vec![
        Line::from("type to edit | tab/↓ next field | space toggle/cycle | ctrl+s submit | esc back"),
        Line::from(state.error.clone()).style(Style::default().fg(Color::Red)),
    ]);
    f.render_widget(footer, chunks[2]);
}

fn mark(on: bool) -> char {
    if on {
        'x'
    } else {
        ' '
    }
}

fn section(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("== {title} =="),
        Style::default().add_modifier(Modifier::DIM),
    ))
}

fn render_row(text: String, focused: bool) -> Line<'static> {
    if focused {
        Line::from(Span::styled(
            format!("> {text}"),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(Span::raw(format!("  {text}")))
    }
}
