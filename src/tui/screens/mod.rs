//! Wizard screens.
//!
//! Each screen is an async function that owns the terminal until it resolves
//! to a `ScreenOutcome`. Shared key conventions: Ctrl+Q quits the app from
//! anywhere, Esc or Alt+Left asks for back-navigation.

pub mod editor;
pub mod job;
pub mod recover;
pub mod session;
pub mod submission;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::Terminal;

use crate::nav::ScreenResult;

pub type Term = Terminal<CrosstermBackend<std::io::Stdout>>;

pub enum ScreenOutcome {
    Forward(ScreenResult),
    Back,
    QuitApp,
}

pub(crate) fn is_quit(key: &KeyEvent) -> bool {
    matches!(
        (key.modifiers, key.code),
        (KeyModifiers::CONTROL, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c'))
    )
}

pub(crate) fn is_back(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.modifiers == KeyModifiers::ALT && key.code == KeyCode::Left)
}

/// Standard highlighted/plain list row.
pub(crate) fn list_row(text: String, selected: bool) -> Line<'static> {
    if selected {
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

/// Clamp-free selection movement shared by the list screens.
pub(crate) fn move_selection(selected: &mut usize, len: usize, delta: i64) {
    if len == 0 {
        *selected = 0;
        return;
    }
    let max = len - 1;
    let next = (*selected as i64 + delta).clamp(0, max as i64);
    *selected = next as usize;
}
