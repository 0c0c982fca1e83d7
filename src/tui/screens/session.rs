//! Session selection.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEventKind};
use futures::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use std::path::PathBuf;

use crate::cli::AppConfig;
use crate::nav::ScreenResult;
use crate::sessions::{self, SessionRef};
use crate::tui::screens::{is_back, is_quit, list_row, move_selection, ScreenOutcome, Term};

struct SessionState {
    root: PathBuf,
    sessions: Vec<PathBuf>,
    /// 0 is the "no session" entry; sessions follow.
    selected: usize,
    info: String,
}

impl SessionState {
    fn entry_count(&self) -> usize {
        self.sessions.len() + 1
    }
}

pub async fn run(
    terminal: &mut Term,
    keys: &mut crossterm::event::EventStream,
    cfg: &AppConfig,
) -> Result<ScreenOutcome> {
    let root = cfg.prefill.session_root.clone();
    let mut state = SessionState {
        sessions: sessions::list_valid_sessions(&root),
        selected: 0,
        info: if root.exists() {
            String::new()
        } else {
            format!("{} doesn't exist!", root.display())
        },
        root,
    };

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
                let count = state.entry_count();
                move_selection(&mut state.selected, count, -1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let count = state.entry_count();
                move_selection(&mut state.selected, count, 1);
            }
            KeyCode::Char('r') => {
                state.sessions = sessions::list_valid_sessions(&state.root);
                let count = state.entry_count();
                move_selection(&mut state.selected, count, 0);
                state.info = format!("Finished reading {}", state.root.display());
            }
            KeyCode::Enter => {
                if state.selected == 0 {
                    return Ok(ScreenOutcome::Forward(ScreenResult::SessionSkipped));
                }
                let path = &state.sessions[state.selected - 1];
                match SessionRef::load(path) {
                    Ok(session) => {
                        return Ok(ScreenOutcome::Forward(ScreenResult::SessionPicked(session)));
                    }
                    Err(e) => {
                        // the directory can vanish between listing and loading
                        state.info = format!("Cannot open {}: {e:#}", path.display());
                    }
                }
            }
            _ => {}
        }
    }
}

fn draw(f: &mut Frame, state: &SessionState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new("Select a Session").block(Block::default().borders(Borders::BOTTOM)),
        chunks[0],
    );

    let mut rows = vec![list_row(
        "No Session (Skip to Editor)".to_string(),
        state.selected == 0,
    )];
    rows.extend(state.sessions.iter().enumerate().map(|(i, path)| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        list_row(name, state.selected == i + 1)
    }));
    f.render_widget(
        Paragraph::new(rows).block(Block::default().borders(Borders::ALL).title("Sessions")),
        chunks[1],
    );

    let footer = Paragraph::new(vec![
        Line::from("enter select | r refresh | esc back | ctrl+q quit"),
        Line::from(state.info.clone()).style(Style::default().fg(Color::Yellow)),
    ]);
    f.render_widget(footer, chunks[2]);
}
