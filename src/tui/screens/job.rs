//! Job selection, with an output preview for the highlighted job.

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEventKind};
use futures::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::model::Selection;
use crate::nav::{NavContext, ScreenResult};
use crate::sessions::DEFAULT_STATUS_FILTER;
use crate::tui::screens::{is_back, is_quit, list_row, move_selection, ScreenOutcome, Term};

struct JobState {
    jobs: Vec<String>,
    /// 0 is the "no job" entry; jobs follow.
    selected: usize,
    preview: String,
}

impl JobState {
    fn entry_count(&self) -> usize {
        self.jobs.len() + 1
    }
}

pub async fn run(
    terminal: &mut Term,
    keys: &mut crossterm::event::EventStream,
    ctx: &NavContext,
) -> Result<ScreenOutcome> {
    // jobs come from the chosen session, or from the archive when the
    // operator skipped session selection
    let jobs = match (&ctx.session, &ctx.archive) {
        (Selection::Chosen(session), _) => session.run_jobs(DEFAULT_STATUS_FILTER),
        (_, Some(archive)) => archive.run_jobs(DEFAULT_STATUS_FILTER),
        _ => Vec::new(),
    };
    let mut state = JobState {
        jobs,
        selected: 0,
        preview: String::new(),
    };
    refresh_preview(&mut state, ctx);

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
                refresh_preview(&mut state, ctx);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let count = state.entry_count();
                move_selection(&mut state.selected, count, 1);
                refresh_preview(&mut state, ctx);
            }
            KeyCode::Enter => {
                if state.selected == 0 {
                    return Ok(ScreenOutcome::Forward(ScreenResult::JobSkipped));
                }
                let job = state.jobs[state.selected - 1].clone();
                return Ok(ScreenOutcome::Forward(ScreenResult::JobPicked(job)));
            }
            _ => {}
        }
    }
}

fn refresh_preview(state: &mut JobState, ctx: &NavContext) {
    state.preview = if state.selected == 0 {
        "Skip job selection and go straight to the editor.".to_string()
    } else {
        let job_id = &state.jobs[state.selected - 1];
        match &ctx.session {
            Selection::Chosen(session) => match session.job_output(job_id) {
                Some(output) => {
                    let mut parts = Vec::new();
                    if !output.comments.is_empty() {
                        parts.push(format!("comments:\n{}", output.comments));
                    }
                    if !output.stdout.is_empty() {
                        parts.push(format!("stdout:\n{}", output.stdout));
                    }
                    if !output.stderr.is_empty() {
                        parts.push(format!("stderr:\n{}", output.stderr));
                    }
                    if parts.is_empty() {
                        "No recorded output for this job.".to_string()
                    } else {
                        parts.join("\n\n")
                    }
                }
                None => "No recorded output for this job.".to_string(),
            },
            _ => "Job listed from the submission archive; no output on disk.".to_string(),
        }
    };
}

fn draw(f: &mut Frame, state: &JobState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new("Select a Job").block(Block::default().borders(Borders::BOTTOM)),
        chunks[0],
    );

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    let mut rows = vec![list_row("No Job (Skip)".to_string(), state.selected == 0)];
    rows.extend(
        state
            .jobs
            .iter()
            .enumerate()
            .map(|(i, job)| list_row(job.clone(), state.selected == i + 1)),
    );
    f.render_widget(
        Paragraph::new(rows).block(Block::default().borders(Borders::ALL).title("Failed jobs")),
        body[0],
    );

    f.render_widget(
        Paragraph::new(state.preview.clone())
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Job output")),
        body[1],
    );

    f.render_widget(
        Paragraph::new(Line::from("enter select | esc back | ctrl+q quit")),
        chunks[2],
    );
}
