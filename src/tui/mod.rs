use crate::audit::{AuditLog, AuditSink};
use crate::catalog::StepCatalog;
use crate::cli::{build_config, Cli};
use crate::exec::SystemRunner;
use crate::model::{RestartDecision, RunEvent};
use crate::orchestrator::{self, MaintenanceRunner, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Terminal,
};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

struct UiState {
    running: bool,
    current: usize,
    total: usize,
    succeeded: usize,
    failed: usize,
    // Event log lines with a failure flag for styling.
    lines: Vec<(bool, String)>,
    info: String,
    pending_restart: Option<RestartDecision>,
    quit_pending: bool,
    scroll_offset: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            running: false,
            current: 0,
            total: 0,
            succeeded: 0,
            failed: 0,
            lines: Vec::new(),
            info: "Press s to start the maintenance run".into(),
            pending_restart: None,
            quit_pending: false,
            scroll_offset: 0,
        }
    }
}

impl UiState {
    fn push_line(&mut self, failure: bool, text: String) {
        const MAX: usize = 500;
        self.lines.push((failure, text));
        if self.lines.len() > MAX {
            let _ = self.lines.drain(0..(self.lines.len() - MAX));
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the runner and the UI.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let audit = AuditLog::open(&args.log_file)?;
    let sink = audit.sink();

    let runner = Arc::new(MaintenanceRunner::new(
        build_config(&args),
        StepCatalog::default(),
        Arc::new(SystemRunner),
    ));

    // TUI runs in a dedicated thread to keep all blocking I/O out of the
    // Tokio runtime.
    let ui_sink = sink.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(event_rx, cmd_tx, ui_sink));

    let res = orchestrator::run_controller(runner, event_tx, cmd_rx, sink).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    audit.close().await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut event_rx: UnboundedReceiver<RunEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
    audit: AuditSink,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            audit.event(&ev);
            apply_event(&mut state, ev);
        }

        // Quit is deferred until the cancelled run has wound down.
        if state.quit_pending && !state.running && state.pending_restart.is_none() {
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                // The restart prompt captures y/n while it is open.
                if state.pending_restart.is_some() {
                    match k.code {
                        KeyCode::Char('y') => {
                            if let Some(d) = state.pending_restart.take() {
                                state.info = "Restarting the system…".into();
                                d.resolve(true);
                            }
                            continue;
                        }
                        KeyCode::Char('n') | KeyCode::Esc => {
                            if let Some(d) = state.pending_restart.take() {
                                state.info = "Restart declined".into();
                                d.resolve(false);
                            }
                            continue;
                        }
                        _ => {}
                    }
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        if let Some(d) = state.pending_restart.take() {
                            d.resolve(false);
                        }
                        let _ = cmd_tx.send(UiCommand::Quit);
                        if state.running {
                            // Never kill the in-flight step; cancel and wait.
                            state.quit_pending = true;
                            state.info = "Cancelling; waiting for the current step…".into();
                        } else {
                            break Ok(());
                        }
                    }
                    (_, KeyCode::Char('s')) => {
                        if state.running {
                            state.info = "A maintenance run is already active".into();
                        } else {
                            // A stale restart prompt must not outlive the new run.
                            if let Some(d) = state.pending_restart.take() {
                                d.resolve(false);
                            }
                            state.scroll_offset = 0;
                            let _ = cmd_tx.send(UiCommand::Start);
                        }
                    }
                    (_, KeyCode::Char('c')) => {
                        if state.running {
                            state.info = "Cancelling at the next step boundary…".into();
                            let _ = cmd_tx.send(UiCommand::Cancel);
                        }
                    }
                    (_, KeyCode::Up) => {
                        state.scroll_offset = state
                            .scroll_offset
                            .saturating_add(1)
                            .min(state.lines.len().saturating_sub(1));
                    }
                    (_, KeyCode::Down) => {
                        state.scroll_offset = state.scroll_offset.saturating_sub(1);
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

fn apply_event(state: &mut UiState, ev: RunEvent) {
    let failure = ev.is_failure();
    let text = ev.describe();
    match ev {
        RunEvent::RunStarted { total } => {
            state.running = true;
            state.total = total;
            state.current = 0;
            state.succeeded = 0;
            state.failed = 0;
            state.info = "Maintenance run in progress".into();
        }
        RunEvent::StepStarted { index, .. } => state.current = index + 1,
        RunEvent::StepSucceeded { .. } => state.succeeded += 1,
        RunEvent::StepFailed { .. } => state.failed += 1,
        RunEvent::RunCancelled { .. } => {
            state.running = false;
            state.info = "Run cancelled".into();
        }
        RunEvent::RunCompleted { restart, .. } => {
            state.running = false;
            if state.quit_pending {
                restart.resolve(false);
            } else {
                state.info = "Run completed — restart now? (y/n)".into();
                state.pending_restart = Some(restart);
            }
        }
    }
    state.push_line(failure, text);
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(4),
        ])
        .split(area);

    let done = state.succeeded + state.failed;
    let ratio = if state.total == 0 {
        0.0
    } else {
        done as f64 / state.total as f64
    };
    let label = if state.running {
        format!("step {}/{}", state.current, state.total)
    } else if state.total > 0 {
        format!("{} succeeded, {} failed", state.succeeded, state.failed)
    } else {
        "idle".to_string()
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Maintenance"))
        .gauge_style(Style::default().fg(if state.failed > 0 {
            Color::Yellow
        } else {
            Color::Green
        }))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    f.render_widget(gauge, chunks[0]);

    let visible = chunks[1].height.saturating_sub(2) as usize;
    let end = state.lines.len().saturating_sub(state.scroll_offset);
    let start = end.saturating_sub(visible);
    let lines: Vec<Line> = state.lines[start..end]
        .iter()
        .map(|(failure, text)| {
            let style = if *failure {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Line::from(Span::styled(text.clone(), style))
        })
        .collect();
    let log = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Log"));
    f.render_widget(log, chunks[1]);

    let keys = if state.pending_restart.is_some() {
        "y restart now · n skip restart"
    } else if state.running {
        "c cancel · q quit (cancels first)"
    } else {
        "s start · q quit"
    };
    let status = Paragraph::new(vec![
        Line::from(state.info.clone()),
        Line::from(Span::styled(keys, Style::default().fg(Color::Gray))),
    ])
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}
