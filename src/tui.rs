use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::domain::{MediaId, TrackedItem};
use crate::engine::{Phase, StatusSnapshot};
use crate::runtime::{Command, ProgressEvent, ProgressSink, QueueRuntime};
use crate::store::Storage;

const LOGS_MAX: usize = 200;
const HINTS: &str = "r refresh  s stop  c clear cache  enter details  esc close  tab logs  q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Queue,
    Logs,
}

#[derive(Debug, Default)]
struct LogBuffer {
    lines: VecDeque<String>,
}

struct TuiProgress {
    logs: Arc<Mutex<LogBuffer>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut logs) = self.logs.lock() {
            if logs.lines.len() == LOGS_MAX {
                logs.lines.pop_front();
            }
            logs.lines.push_back(event.message);
        }
    }
}

/// Everything one frame needs, copied out under a single engine lock.
struct ViewModel {
    status: StatusSnapshot,
    rows: Vec<Row>,
    detail: Option<TrackedItem>,
}

struct Row {
    id: MediaId,
    title: String,
    complete: bool,
    unresolved: bool,
}

pub struct Tui {
    logs: Arc<Mutex<LogBuffer>>,
    view: View,
    selected: usize,
    log_scroll: u16,
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

impl Tui {
    pub fn new() -> Self {
        Self {
            logs: Arc::new(Mutex::new(LogBuffer::default())),
            view: View::Queue,
            selected: 0,
            log_scroll: 0,
        }
    }

    /// Sink to hand to [`QueueRuntime::start`] so log lines reach the log pane.
    pub fn sink(&self) -> impl ProgressSink + 'static {
        TuiProgress {
            logs: self.logs.clone(),
        }
    }

    pub fn run<S: Storage + 'static>(&mut self, runtime: &QueueRuntime<S>) -> miette::Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = self.event_loop(&mut terminal, runtime);

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        result
    }

    fn event_loop<S: Storage + 'static>(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        runtime: &QueueRuntime<S>,
    ) -> miette::Result<()> {
        let mut tick = 0usize;
        loop {
            let Some(model) = runtime.with_engine(|engine| ViewModel {
                status: engine.snapshot(),
                rows: engine
                    .collection()
                    .iter()
                    .map(|item| Row {
                        id: item.id,
                        title: item.title.clone(),
                        complete: item.has_complete_metadata(),
                        unresolved: engine.unresolved().contains(item.id),
                    })
                    .collect(),
                detail: engine.detail().cloned(),
            }) else {
                return Err(miette::Report::msg("queue engine is unavailable"));
            };
            if !model.rows.is_empty() {
                self.selected = self.selected.min(model.rows.len() - 1);
            }
            let logs: Vec<String> = self
                .logs
                .lock()
                .map(|logs| logs.lines.iter().cloned().collect())
                .unwrap_or_default();

            terminal
                .draw(|frame| self.draw(frame, &model, &logs, tick))
                .into_diagnostic()?;

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key, &model, runtime) {
                        return Ok(());
                    }
                }
            }
            tick = tick.wrapping_add(1);
        }
    }

    fn handle_key<S: Storage + 'static>(
        &mut self,
        key: KeyEvent,
        model: &ViewModel,
        runtime: &QueueRuntime<S>,
    ) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('r') => runtime.send(Command::Refresh),
            KeyCode::Char('s') => runtime.send(Command::Stop),
            KeyCode::Char('c') => runtime.send(Command::ClearCache),
            KeyCode::Tab => {
                self.view = match self.view {
                    View::Queue => View::Logs,
                    View::Logs => View::Queue,
                };
            }
            KeyCode::Up => match self.view {
                View::Queue => self.selected = self.selected.saturating_sub(1),
                View::Logs => self.log_scroll = self.log_scroll.saturating_add(1),
            },
            KeyCode::Down => match self.view {
                View::Queue => {
                    if self.selected + 1 < model.rows.len() {
                        self.selected += 1;
                    }
                }
                View::Logs => self.log_scroll = self.log_scroll.saturating_sub(1),
            },
            KeyCode::Enter => {
                if let Some(row) = model.rows.get(self.selected) {
                    runtime.send(Command::OpenDetail(row.id));
                }
            }
            KeyCode::Esc => runtime.send(Command::CloseDetail),
            _ => {}
        }
        false
    }

    fn draw(&self, frame: &mut ratatui::Frame, model: &ViewModel, logs: &[String], tick: usize) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(2),
            ])
            .split(frame.area());

        frame.render_widget(draw_header(&model.status, tick), chunks[0]);

        match self.view {
            View::Queue => {
                let main = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                    .split(chunks[1]);
                let left = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(7), Constraint::Min(4)])
                    .split(main[0]);
                frame.render_widget(draw_status_panel(&model.status), left[0]);
                frame.render_widget(draw_log_tail(logs, left[1].height), left[1]);
                let right = match &model.detail {
                    Some(item) => draw_detail_panel(item),
                    None => draw_collection_panel(&model.rows, self.selected, main[1].height),
                };
                frame.render_widget(right, main[1]);
            }
            View::Logs => {
                frame.render_widget(draw_logs_view(logs, self.log_scroll), chunks[1]);
            }
        }

        let footer = Paragraph::new(Line::from(Span::styled(
            HINTS,
            Style::default().fg(Color::Gray),
        )))
        .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, chunks[2]);
    }
}

fn draw_header(status: &StatusSnapshot, tick: usize) -> Paragraph<'static> {
    let hb = if tick % 2 == 0 { "*" } else { " " };
    let (phase_label, phase_color) = phase_style(status.phase);
    let header_line = Line::from(vec![
        Span::styled(
            "KIRA-MT",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   Queue: "),
        Span::styled(phase_label, Style::default().fg(phase_color)),
        Span::raw("   "),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]);
    let summary_line = Line::from(Span::styled(
        format!(
            "Tracked: {} · Pending: {} · Unresolved: {}",
            status.tracked,
            status.queue_len,
            status.unresolved.len()
        ),
        Style::default().fg(Color::Gray),
    ));
    Paragraph::new(vec![header_line, summary_line])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_status_panel(status: &StatusSnapshot) -> Paragraph<'static> {
    let progress = &status.progress;
    let mut lines = vec![Line::from(Span::styled(
        "BACKGROUND FETCH",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];

    if status.rate_limit.active {
        lines.push(Line::from(Span::styled(
            format!(
                "Rate limited. Resuming in {}s",
                status.rate_limit.seconds_remaining
            ),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    }
    if status.network_error.active {
        lines.push(Line::from(Span::styled(
            format!(
                "Network error. Retrying in {}s",
                status.network_error.seconds_remaining
            ),
            Style::default().fg(Color::Red),
        )));
    }

    if progress.total > 0 {
        let percent = progress_percent(progress.current, progress.total);
        lines.push(Line::from(vec![
            Span::raw(progress_bar(percent)),
            Span::raw(format!(
                " {}/{} ({percent:>3}%)",
                progress.current, progress.total
            )),
        ]));
        if !progress.fetching_title.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Fetching: ", Style::default().fg(Color::Gray)),
                Span::raw(progress.fetching_title.clone()),
            ]));
        }
    } else if let Some(batch) = &status.last_batch {
        lines.push(Line::from(Span::styled(
            format!("Last run: {}/{} processed", batch.current, batch.total),
            Style::default().fg(Color::Green),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Idle",
            Style::default().fg(Color::Gray),
        )));
    }

    lines.push(Line::from(vec![
        Span::styled("Delay: ", Style::default().fg(Color::Gray)),
        Span::raw(format!("{}s", status.current_delay_ms / 1000)),
    ]));

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::RIGHT | Borders::BOTTOM))
        .wrap(Wrap { trim: true })
}

fn draw_log_tail(logs: &[String], height: u16) -> Paragraph<'static> {
    let take = usize::from(height.saturating_sub(1));
    let lines: Vec<Line> = logs
        .iter()
        .skip(logs.len().saturating_sub(take))
        .map(|line| Line::from(line.clone()))
        .collect();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::RIGHT).title("Log"))
        .wrap(Wrap { trim: true })
}

fn draw_collection_panel(rows: &[Row], selected: usize, height: u16) -> Paragraph<'static> {
    let mut lines = vec![Line::from(Span::styled(
        "COLLECTION",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];
    let visible = usize::from(height.saturating_sub(2)).max(1);
    let start = selected.saturating_sub(visible.saturating_sub(1));
    for (index, row) in rows.iter().enumerate().skip(start).take(visible) {
        let (marker, color) = if row.unresolved {
            ("?", Color::Yellow)
        } else if row.complete {
            ("+", Color::Green)
        } else {
            (".", Color::Gray)
        };
        let mut style = Style::default().fg(color);
        if index == selected {
            style = style.add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::from(Span::styled(
            format!("{marker} {} ({})", row.title, row.id),
            style,
        )));
    }
    Paragraph::new(lines)
}

fn draw_detail_panel(item: &TrackedItem) -> Paragraph<'static> {
    let field = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
            Span::raw(value),
        ])
    };
    let mut lines = vec![
        Line::from(Span::styled(
            item.title.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        field("MAL ID", item.id.to_string()),
        field("Status", item.status.to_string()),
        field(
            "Episodes",
            format!("{}/{}", item.episodes_watched, item.total_episodes),
        ),
        field(
            "Score",
            item.score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];
    if let Some(season) = &item.season {
        lines.push(field("Season", season.clone()));
    }
    if !item.genres.is_empty() {
        lines.push(field("Genres", item.genres.join(", ")));
    }
    if !item.studios.is_empty() {
        lines.push(field("Studios", item.studios.join(", ")));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(
        item.description
            .clone()
            .unwrap_or_else(|| "Details not fetched yet.".to_string()),
    ));
    Paragraph::new(lines).wrap(Wrap { trim: true })
}

fn draw_logs_view(logs: &[String], scroll: u16) -> Paragraph<'static> {
    let lines: Vec<Line> = logs.iter().rev().map(|line| Line::from(line.clone())).collect();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::NONE).title("Fetch log (newest first)"))
        .scroll((scroll, 0))
        .wrap(Wrap { trim: true })
}

fn phase_style(phase: Phase) -> (&'static str, Color) {
    match phase {
        Phase::Idle => ("idle", Color::Gray),
        Phase::Scheduled => ("scheduled", Color::Cyan),
        Phase::InFlight => ("fetching", Color::Cyan),
        Phase::PausedRateLimit => ("rate limited", Color::Yellow),
        Phase::PausedStopped => ("stopped", Color::Red),
    }
}

fn progress_percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((current.min(total) * 100) / total) as u8
}

fn progress_bar(percent: u8) -> String {
    let total = 20;
    let filled = (percent as usize * total) / 100;
    let mut out = String::from("[");
    for i in 0..total {
        out.push(if i < filled { '#' } else { '.' });
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percent_clamps() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(1, 4), 25);
        assert_eq!(progress_percent(5, 4), 100);
        assert_eq!(progress_bar(50), format!("[{}{}]", "#".repeat(10), ".".repeat(10)));
    }
}
