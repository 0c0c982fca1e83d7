//! Submission progress screen.
//!
//! Spawns the orchestrator and renders its event stream: a progress bar over
//! protocol steps + collectors, and the ordered log beneath it. Terminal
//! verdicts turn into the post-success menu or the failure acknowledgement.

use anyhow::{Context, Result};
use async_trait::async_trait;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use futures::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Frame;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

use crate::cli::AppConfig;
use crate::model::Selection;
use crate::nav::{NavContext, ReturnChoice, ScreenResult};
use crate::orchestrator::{
    LogKind, LogLine, SubmissionControl, SubmissionEvent, SubmissionOrchestrator, Verdict,
};
use crate::submitter::{self, AuthPrompt, Credentials};
use crate::tui::screens::{is_back, is_quit, ScreenOutcome, Term};

/// One credential request from the orchestrator to the UI loop.
struct AuthRequest {
    reply: oneshot::Sender<Option<(Credentials, bool)>>,
}

/// Bridges the orchestrator's auth suspension point to the modal below
/// without handing it a terminal.
struct ChannelAuthPrompt {
    tx: mpsc::UnboundedSender<AuthRequest>,
}

#[async_trait]
impl AuthPrompt for ChannelAuthPrompt {
    async fn obtain(&self) -> Option<(Credentials, bool)> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(AuthRequest { reply: reply_tx }).ok()?;
        reply_rx.await.unwrap_or(None)
    }
}

struct ProgressView {
    done: u64,
    total: u64,
    lines: Vec<(f64, LogLine)>,
    info: String,
}

impl ProgressView {
    fn apply(&mut self, ev: SubmissionEvent, started: Instant) {
        match ev {
            SubmissionEvent::Progress { done, total } => {
                self.done = done;
                self.total = total;
            }
            SubmissionEvent::Log(line) => {
                self.lines.push((started.elapsed().as_secs_f64(), line));
            }
        }
    }
}

pub async fn run(
    terminal: &mut Term,
    keys: &mut EventStream,
    cfg: &AppConfig,
    ctx: &NavContext,
) -> Result<ScreenOutcome> {
    let report = ctx
        .report
        .clone()
        .context("submission screen requires a finalized report")?;
    let protocol = submitter::new_protocol(cfg.backend);
    let orch = SubmissionOrchestrator::new(report, protocol)?
        .with_collector_timeout(Some(cfg.collector_timeout));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel();
    let (auth_tx, mut auth_rx) = mpsc::unbounded_channel::<AuthRequest>();

    let mut handle = tokio::spawn(async move {
        let prompt = ChannelAuthPrompt { tx: auth_tx };
        let mut orch = orch;
        let verdict = orch.run(&prompt, &event_tx, &mut ctrl_rx).await;
        (orch, verdict)
    });

    let started = Instant::now();
    let mut view = ProgressView {
        done: 0,
        total: 0,
        lines: Vec::new(),
        info: String::new(),
    };

    loop {
        terminal.draw(|f| draw_progress(f, &view))?;
        tokio::select! {
            joined = &mut handle => {
                let (mut orch, verdict) = joined.context("submission task failed")?;
                while let Ok(ev) = event_rx.try_recv() {
                    view.apply(ev, started);
                }
                return finish(terminal, keys, &mut view, &mut orch, verdict, ctx).await;
            }
            maybe_ev = event_rx.recv() => {
                if let Some(ev) = maybe_ev {
                    view.apply(ev, started);
                }
            }
            maybe_req = auth_rx.recv() => {
                if let Some(req) = maybe_req {
                    let reply = auth_modal(terminal, keys, cfg).await?;
                    let _ = req.reply.send(reply);
                }
            }
            maybe_key = keys.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_key {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if is_quit(&key) || key.code == KeyCode::Char('q') {
                        view.info = "Cancelling…".into();
                        let _ = ctrl_tx.send(SubmissionControl::Cancel);
                    } else if is_back(&key) {
                        view.info =
                            "Cannot go back while a submission is happening (ctrl+q quits)".into();
                    }
                }
            }
        }
    }
}

async fn finish(
    terminal: &mut Term,
    keys: &mut EventStream,
    view: &mut ProgressView,
    orch: &mut SubmissionOrchestrator,
    verdict: Verdict,
    ctx: &NavContext,
) -> Result<ScreenOutcome> {
    match verdict {
        // scratch is already gone; quit was requested
        Verdict::Cancelled => Ok(ScreenOutcome::QuitApp),
        Verdict::Failed(error) => {
            loop {
                terminal.draw(|f| draw_failure(f, view, &error))?;
                let Some(key) = next_key(keys).await else {
                    break;
                };
                if key.code == KeyCode::Enter || is_quit(&key) || is_back(&key) {
                    break;
                }
            }
            orch.release_scratch();
            // the editor reopens with the draft preserved as a backup
            Ok(ScreenOutcome::Forward(ScreenResult::SubmissionFinished(
                ReturnChoice::ReportEditor,
            )))
        }
        Verdict::Success => {
            let url = orch.bug_url();
            let mut choices: Vec<(ReturnChoice, &str)> = Vec::new();
            if matches!(ctx.session, Selection::Chosen(_)) {
                choices.push((ReturnChoice::Job, "Select another job"));
            }
            choices.push((ReturnChoice::Session, "Select another session"));
            choices.push((ReturnChoice::ReportEditor, "Back to the report editor"));
            choices.push((ReturnChoice::Quit, "Quit"));

            let mut selected = 0usize;
            loop {
                terminal.draw(|f| draw_success(f, view, url.as_deref(), &choices, selected))?;
                let Some(key) = next_key(keys).await else {
                    orch.release_scratch();
                    return Ok(ScreenOutcome::QuitApp);
                };
                match key.code {
                    KeyCode::Up | KeyCode::Char('k') => {
                        selected = selected.saturating_sub(1);
                    }
                    KeyCode::Down | KeyCode::Char('j') => {
                        selected = (selected + 1).min(choices.len() - 1);
                    }
                    KeyCode::Char('y') => {
                        view.info = match &url {
                            Some(url) => match copy_to_clipboard(url) {
                                Ok(()) => "Copied bug URL to clipboard".into(),
                                Err(e) => format!("Clipboard copy failed: {e:#}"),
                            },
                            None => "No bug URL to copy".into(),
                        };
                    }
                    KeyCode::Enter => {
                        orch.release_scratch();
                        return Ok(ScreenOutcome::Forward(ScreenResult::SubmissionFinished(
                            choices[selected].0,
                        )));
                    }
                    _ if is_quit(&key) => {
                        orch.release_scratch();
                        return Ok(ScreenOutcome::QuitApp);
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn next_key(keys: &mut EventStream) -> Option<KeyEvent> {
    loop {
        match keys.next().await {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => return Some(key),
            Some(_) => continue,
            None => return None,
        }
    }
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("open clipboard")?;
    clipboard.set_text(text.to_string()).context("set clipboard text")?;
    Ok(())
}

/// Interactive credential collection, shown when the tracker has no cached
/// credentials. Returning `None` declines authentication.
async fn auth_modal(
    terminal: &mut Term,
    keys: &mut EventStream,
    cfg: &AppConfig,
) -> Result<Option<(Credentials, bool)>> {
    let mut username = String::new();
    let mut secret = String::new();
    let mut cache = true;
    let mut focus = 0usize;

    loop {
        terminal.draw(|f| draw_auth(f, cfg, &username, &secret, cache, focus))?;
        let Some(key) = next_key(keys).await else {
            return Ok(None);
        };
        if is_quit(&key) || is_back(&key) {
            return Ok(None);
        }
        match key.code {
            KeyCode::Tab | KeyCode::Down => focus = (focus + 1) % 3,
            KeyCode::BackTab | KeyCode::Up => focus = focus.checked_sub(1).unwrap_or(2),
            KeyCode::Enter => {
                if !username.trim().is_empty() && !secret.trim().is_empty() {
                    return Ok(Some((
                        Credentials {
                            username: username.trim().to_string(),
                            secret: secret.trim().to_string(),
                        },
                        cache,
                    )));
                }
            }
            KeyCode::Char(' ') if focus == 2 => cache = !cache,
            KeyCode::Backspace => {
                match focus {
                    0 => {
                        username.pop();
                    }
                    1 => {
                        secret.pop();
                    }
                    _ => {}
                };
            }
            KeyCode::Char(c) => match focus {
                0 => username.push(c),
                1 => secret.push(c),
                _ => {}
            },
            _ => {}
        }
    }
}

fn layout(f: &Frame) -> std::rc::Rc<[ratatui::layout::Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(f.area())
}

fn draw_progress(f: &mut Frame, view: &ProgressView) {
    let chunks = layout(f);
    draw_gauge(f, chunks[0], view);
    draw_log(f, chunks[1], view);
    f.render_widget(
        Paragraph::new(vec![
            Line::from("ctrl+q cancel and quit"),
            Line::from(view.info.clone()).style(Style::default().fg(Color::Yellow)),
        ]),
        chunks[2],
    );
}

fn draw_failure(f: &mut Frame, view: &ProgressView, error: &str) {
    let chunks = layout(f);
    draw_gauge(f, chunks[0], view);
    draw_log(f, chunks[1], view);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("Got the following error during submission: {error}"),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from("press enter to return to the report editor"),
        ])
        .wrap(Wrap { trim: false }),
        chunks[2],
    );
}

fn draw_success(
    f: &mut Frame,
    view: &ProgressView,
    url: Option<&str>,
    choices: &[(ReturnChoice, &str)],
    selected: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(choices.len() as u16 + 3),
        ])
        .split(f.area());
    draw_gauge(f, chunks[0], view);
    draw_log(f, chunks[1], view);

    let mut lines = vec![Line::from(Span::styled(
        "Submission finished!",
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    ))];
    if let Some(url) = url {
        lines.push(Line::from(format!("URL: {url} (press 'y' to copy)")));
    }
    if !view.info.is_empty() {
        lines.push(Line::from(view.info.clone()));
    }
    for (i, (_, label)) in choices.iter().enumerate() {
        let style = if i == selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!("{} {label}", if i == selected { ">" } else { " " }),
            style,
        )));
    }
    f.render_widget(Paragraph::new(lines), chunks[2]);
}

fn draw_gauge(f: &mut Frame, area: ratatui::layout::Rect, view: &ProgressView) {
    let ratio = if view.total == 0 {
        0.0
    } else {
        (view.done as f64 / view.total as f64).clamp(0.0, 1.0)
    };
    let label = format!("{}/{}", view.done, view.total);
    f.render_widget(
        Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Submission Progress"),
            )
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(ratio)
            .label(label),
        area,
    );
}

fn draw_log(f: &mut Frame, area: ratatui::layout::Rect, view: &ProgressView) {
    let height = area.height.saturating_sub(2) as usize;
    let skip = view.lines.len().saturating_sub(height);
    let lines: Vec<Line> = view.lines[skip..]
        .iter()
        .map(|(elapsed, line)| {
            let (tag, style) = match line.kind {
                LogKind::Info => ("", Style::default()),
                LogKind::Ok => ("OK ", Style::default().fg(Color::Green)),
                LogKind::Fail => ("FAIL ", Style::default().fg(Color::Red)),
                LogKind::Cancelled => ("CANCELLED ", Style::default().fg(Color::Yellow)),
            };
            Line::from(vec![
                Span::styled(
                    format!("[{elapsed:>6.1}] "),
                    Style::default().add_modifier(Modifier::DIM),
                ),
                Span::styled(tag, style.add_modifier(Modifier::BOLD)),
                Span::raw(line.text.clone()),
            ])
        })
        .collect();
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Log")),
        area,
    );
}

fn draw_auth(
    f: &mut Frame,
    cfg: &AppConfig,
    username: &str,
    secret: &str,
    cache: bool,
    focus: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(7),
            Constraint::Min(0),
        ])
        .split(f.area());

    let title = match cfg.backend {
        crate::submitter::BackendKind::Launchpad => "Launchpad Authentication",
        crate::submitter::BackendKind::Jira => "Jira Authentication",
    };
    f.render_widget(
        Paragraph::new(title).block(Block::default().borders(Borders::BOTTOM)),
        chunks[0],
    );

    let row = |label: &str, value: String, focused: bool| {
        let style = if focused {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(Span::styled(
            format!("{} {label}: {value}", if focused { ">" } else { " " }),
            style,
        ))
    };
    let masked = "*".repeat(secret.len());
    let lines = vec![
        row("Account", username.to_string(), focus == 0),
        row("Token", masked, focus == 1),
        row(
            "Cache valid credentials until next boot",
            format!("[{}]", if cache { "x" } else { " " }),
            focus == 2,
        ),
        Line::from(""),
        Line::from("enter continue | esc cancel | tab next field"),
    ];
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
}
