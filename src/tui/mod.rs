mod clipboard;
mod help;
mod state;
mod views;

use crate::api::HttpBackend;
use crate::cli::{build_config, Cli};
use crate::model::SessionEvent;
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use state::UiState;
use std::path::PathBuf;
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

const TABS: [&str; 2] = ["StemSense", "Help"];

pub(crate) async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let backend = Arc::new(HttpBackend::new(&cfg)?);

    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // Terminal I/O blocks, so the UI gets its own thread.
    let ui_args = args.clone();
    let base_url = cfg.base_url.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(ui_args, base_url, event_rx, cmd_tx));

    let res = orchestrator::run_controller(backend, &cfg, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res.map(|_| ())
}

fn run_threaded(
    args: Cli,
    base_url: String,
    mut event_rx: UnboundedReceiver<SessionEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState {
        base_url,
        save_dir: args.save_to.clone().unwrap_or_else(|| PathBuf::from(".")),
        ..Default::default()
    };
    if let Some(input) = args.input.as_deref().filter(|s| !s.trim().is_empty()) {
        state.input = input.to_string();
        let _ = cmd_tx.send(UiCommand::Submit(state.input.clone()));
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            state.frame = state.frame.wrapping_add(1);
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &cmd_tx) == KeyOutcome::Quit {
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn handle_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) -> KeyOutcome {
    match (k.modifiers, k.code) {
        (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return KeyOutcome::Quit;
        }
        (_, KeyCode::Tab) | (_, KeyCode::F(1)) => {
            state.tab = (state.tab + 1) % TABS.len();
        }
        (KeyModifiers::CONTROL, KeyCode::Char('r')) => {
            state.downloading = false;
            state.info = "Ready for a new song".into();
            let _ = cmd_tx.send(UiCommand::Reset);
        }
        (KeyModifiers::CONTROL, KeyCode::Char('d')) => {
            if state.download_url().is_none() {
                state.info = "Nothing to download yet".into();
            } else if !state.downloading {
                state.downloading = true;
                state.info = format!("Downloading into {}…", state.save_dir.display());
                let _ = cmd_tx.send(UiCommand::Download {
                    dest_dir: state.save_dir.clone(),
                });
            }
        }
        (KeyModifiers::CONTROL, KeyCode::Char('y')) => match state.download_url() {
            Some(url) => match clipboard::copy_to_clipboard(&url) {
                Ok(()) => state.info = "Download link copied".into(),
                Err(e) => state.info = format!("Copy failed: {e:#}"),
            },
            None => state.info = "No download link yet".into(),
        },
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
            if state.input_enabled() {
                state.input.clear();
            }
        }
        (_, KeyCode::Enter) => {
            if !state.input_enabled() {
                return KeyOutcome::Continue;
            }
            if state.input.trim().is_empty() {
                state.info = "Enter a YouTube URL or a song name".into();
            } else {
                state.tab = 0;
                let _ = cmd_tx.send(UiCommand::Submit(state.input.clone()));
            }
        }
        (_, KeyCode::Backspace) => {
            if state.input_enabled() {
                state.input.pop();
            }
        }
        (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
            if state.input_enabled() && state.tab == 0 {
                state.input.push(c);
            }
        }
        _ => {}
    }
    KeyOutcome::Continue
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    let tabs = Tabs::new(TABS.iter().map(|t| Line::from(*t)).collect::<Vec<_>>())
        .select(state.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("stemsense · AI stem separation"),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => views::draw_main(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, &state.base_url),
    }

    let status = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", state.task.status()),
            Style::default().fg(Color::Black).bg(Color::Gray),
        ),
        Span::raw(" "),
        Span::raw(state.info.clone()),
    ]));
    f.render_widget(status, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskState;
    use crate::model::TaskStatus;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn drain(rx: &mut UnboundedReceiver<UiCommand>) -> Vec<UiCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[test]
    fn typing_and_enter_submit_input() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState::default();
        for c in "daft punk".chars() {
            handle_key(&mut state, press(KeyCode::Char(c)), &tx);
        }
        handle_key(&mut state, press(KeyCode::Backspace), &tx);
        handle_key(&mut state, press(KeyCode::Enter), &tx);

        let cmds = drain(&mut rx);
        assert!(matches!(cmds.as_slice(), [UiCommand::Submit(s)] if s == "daft pun"));
    }

    #[test]
    fn blank_enter_sends_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState {
            input: "   ".into(),
            ..Default::default()
        };
        handle_key(&mut state, press(KeyCode::Enter), &tx);
        assert!(drain(&mut rx).is_empty());
        assert!(!state.info.is_empty());
    }

    #[test]
    fn input_ignored_while_busy() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState {
            input: "song".into(),
            task: TaskState::Active {
                task_id: "t1".into(),
                status: TaskStatus::Separating,
            },
            ..Default::default()
        };
        handle_key(&mut state, press(KeyCode::Char('x')), &tx);
        handle_key(&mut state, press(KeyCode::Enter), &tx);
        assert_eq!(state.input, "song");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn download_only_once_completed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState {
            base_url: "http://localhost:8000".into(),
            ..Default::default()
        };
        handle_key(&mut state, ctrl('d'), &tx);
        assert!(drain(&mut rx).is_empty());

        state.task = TaskState::Completed {
            task_id: "t1".into(),
            result_file: Some("t1.zip".into()),
        };
        handle_key(&mut state, ctrl('d'), &tx);
        handle_key(&mut state, ctrl('d'), &tx);
        let cmds = drain(&mut rx);
        assert_eq!(cmds.len(), 1);
        assert!(matches!(&cmds[0], UiCommand::Download { dest_dir } if dest_dir == &PathBuf::from(".")));
        assert!(state.downloading);
    }

    #[test]
    fn reset_keeps_typed_input_and_quit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = UiState {
            input: "https://youtu.be/abc123".into(),
            task: TaskState::Failed {
                task_id: "t1".into(),
                error: "Download failed".into(),
            },
            ..Default::default()
        };
        assert_eq!(handle_key(&mut state, ctrl('r'), &tx), KeyOutcome::Continue);
        assert_eq!(state.input, "https://youtu.be/abc123");

        // Retrying after the session reports idle resubmits the same text.
        state.apply_event(SessionEvent::StateChanged {
            state: TaskState::default(),
        });
        handle_key(&mut state, press(KeyCode::Enter), &tx);
        assert_eq!(handle_key(&mut state, press(KeyCode::Esc), &tx), KeyOutcome::Quit);

        let cmds = drain(&mut rx);
        assert!(matches!(
            cmds.as_slice(),
            [UiCommand::Reset, UiCommand::Submit(s), UiCommand::Quit] if s == "https://youtu.be/abc123"
        ));
    }

    #[test]
    fn ctrl_u_clears_input() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut state = UiState {
            input: "song".into(),
            ..Default::default()
        };
        handle_key(&mut state, ctrl('u'), &tx);
        assert!(state.input.is_empty());
    }
}
