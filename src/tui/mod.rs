//! Terminal shell.
//!
//! Owns the terminal lifecycle and the wizard loop: ask the navigation state
//! machine which screen is active, run that screen until it produces a
//! result, feed the result back in. Screens never touch the state machine
//! directly.

mod screens;

use anyhow::{Context, Result};
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

use crate::cli::AppConfig;
use crate::nav::{Nsm, Screen};
use screens::{ScreenOutcome, Term};

pub async fn run(cfg: AppConfig) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let res = drive(&mut terminal, cfg).await;

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

async fn drive(terminal: &mut Term, cfg: AppConfig) -> Result<()> {
    let mut keys = EventStream::new();
    let mut nsm = Nsm::new(cfg.autosave_dir.clone(), cfg.archive.clone());

    loop {
        let outcome = match nsm.current() {
            Screen::RecoverAutosave => {
                screens::recover::run(terminal, &mut keys, &cfg).await?
            }
            Screen::SessionSelect => {
                screens::session::run(terminal, &mut keys, &cfg).await?
            }
            Screen::JobSelect => {
                screens::job::run(terminal, &mut keys, nsm.context()).await?
            }
            Screen::ReportEditor => {
                screens::editor::run(terminal, &mut keys, &cfg, nsm.context()).await?
            }
            Screen::SubmissionProgress => {
                screens::submission::run(terminal, &mut keys, &cfg, nsm.context()).await?
            }
            Screen::Quit => return Ok(()),
        };
        match outcome {
            ScreenOutcome::Forward(result) => {
                nsm.dispatch(result);
            }
            ScreenOutcome::Back => {
                // false means nowhere to go; the screen simply re-runs
                nsm.go_back();
            }
            ScreenOutcome::QuitApp => return Ok(()),
        }
    }
}
