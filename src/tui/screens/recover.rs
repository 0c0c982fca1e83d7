//! Recovery screen: offer autosaved drafts from previous runs.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEventKind};
use futures::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::cli::AppConfig;
use crate::nav::ScreenResult;
use crate::storage::{self, SavedDraft};
use crate::tui::screens::{is_back, is_quit, list_row, move_selection, ScreenOutcome, Term};

struct RecoverState {
    drafts: Vec<SavedDraft>,
    selected: usize,
    lock_delete: bool,
    info: String,
}

pub async fn run(
    terminal: &mut Term,
    keys: &mut crossterm::event::EventStream,
    cfg: &AppConfig,
) -> Result<ScreenOutcome> {
    let mut state = RecoverState {
        drafts: storage::list_drafts(&cfg.autosave_dir),
        selected: 0,
        lock_delete: true,
        info: String::new(),
    };

    // nothing to recover: skip straight past this screen
    if state.drafts.is_empty() {
        return Ok(ScreenOutcome::Forward(ScreenResult::AutosaveClosed(None)));
    }

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
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                move_selection(&mut state.selected, state.drafts.len(), -1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                move_selection(&mut state.selected, state.drafts.len(), 1);
            }
            KeyCode::Enter => {
                let draft = state.drafts[state.selected].draft.clone();
                return Ok(ScreenOutcome::Forward(ScreenResult::AutosaveClosed(Some(
                    draft,
                ))));
            }
            KeyCode::Char('n') => {
                // start fresh; existing recovery files stay on disk
                return Ok(ScreenOutcome::Forward(ScreenResult::AutosaveClosed(None)));
            }
            KeyCode::Char('d') => {
                state.lock_delete = !state.lock_delete;
            }
            KeyCode::Char('x') if !state.lock_delete => {
                let removed = state.drafts.remove(state.selected);
                if let Err(e) = storage::delete_draft(&removed.path) {
                    state.info = format!("Delete failed: {e:#}");
                    state.drafts.insert(state.selected, removed);
                } else if state.drafts.is_empty() {
                    return Ok(ScreenOutcome::Forward(ScreenResult::AutosaveClosed(None)));
                } else {
                    move_selection(&mut state.selected, state.drafts.len(), 0);
                }
            }
            _ => {}
        }
    }
}

fn draw(f: &mut Frame, state: &RecoverState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(f.area());

    let header = Paragraph::new(vec![
        Line::from("Resume from a Recovery File"),
        Line::from("These were automatically saved by the bug report editor"),
    ])
    .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);

    let rows: Vec<Line> = state
        .drafts
        .iter()
        .enumerate()
        .map(|(i, saved)| {
            let when = saved.draft.saved_at.as_deref().unwrap_or("unknown time");
            let session = saved
                .draft
                .session_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "no session selected".into());
            let job = saved.draft.job_id.as_deref().unwrap_or("no job selected");
            let title = if saved.draft.title.is_empty() {
                "(untitled)"
            } else {
                saved.draft.title.as_str()
            };
            list_row(
                format!("{title}  |  saved {when}  |  {session} / {job}"),
                i == state.selected,
            )
        })
        .collect();
    f.render_widget(
        Paragraph::new(rows).block(Block::default().borders(Borders::ALL).title("Drafts")),
        chunks[1],
    );

    let lock = if state.lock_delete { "locked" } else { "UNLOCKED" };
    let footer = Paragraph::new(vec![
        Line::from(format!(
            "enter recover | n start fresh | d delete lock ({lock}) | x delete | esc back | ctrl+q quit"
        )),
        Line::from(state.info.clone()).style(Style::default().fg(Color::Red)),
    ]);
    f.render_widget(footer, chunks[2]);
}
