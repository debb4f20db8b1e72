use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

use super::state::UiState;
use crate::model::TaskStatus;
use crate::view::{Milestone, StepState, View, FEATURES};

const ACCENT: Color = Color::Indexed(99);

pub fn draw_main(area: Rect, f: &mut Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    draw_input(rows[0], f, state);

    match state.view() {
        View::Idle { error } => draw_idle(rows[1], f, error.as_deref()),
        View::InProgress {
            status,
            steps,
            percent,
        } => draw_progress(rows[1], f, state, status, &steps, percent),
        View::Completed { download_url } => {
            draw_completed(rows[1], f, state, download_url.as_deref())
        }
        View::Failed { error } => draw_failed(rows[1], f, &error),
    }
}

fn draw_input(area: Rect, f: &mut Frame, state: &UiState) {
    let enabled = state.input_enabled();
    let (text, style) = if state.input.is_empty() {
        (
            "Paste YouTube URL or type song name...".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (state.input.clone(), Style::default())
    };
    let mut spans = vec![Span::styled(text, style)];
    if enabled {
        spans.push(Span::styled("▏", Style::default().fg(ACCENT)));
    }
    let border = if enabled {
        Style::default().fg(ACCENT)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let p = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title("Song (Enter to process)"),
    );
    f.render_widget(p, area);
}

fn draw_idle(area: Rect, f: &mut Frame, error: Option<&str>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let intro = match error {
        Some(e) => Line::from(vec![
            Span::styled("✗ ", Style::default().fg(Color::Red)),
            Span::styled(e.to_string(), Style::default().fg(Color::Red)),
        ]),
        None => Line::from(Span::styled(
            "Extract vocals, drums, and bass with professional AI accuracy. Fully analyzed.",
            Style::default().fg(Color::Gray),
        )),
    };
    f.render_widget(
        Paragraph::new(intro)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::NONE)),
        rows[0],
    );

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage(33),
                Constraint::Percentage(33),
                Constraint::Percentage(34),
            ]
            .as_ref(),
        )
        .split(rows[1]);

    for ((title, desc), card) in FEATURES.iter().zip(cards.iter()) {
        let p = Paragraph::new(Line::from(Span::styled(
            *desc,
            Style::default().fg(Color::Gray),
        )))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(
                    *title,
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                )),
        );
        f.render_widget(p, *card);
    }
}

fn step_style(step: StepState) -> (Style, &'static str) {
    match step {
        StepState::Completed => (Style::default().fg(ACCENT), "✓ done"),
        StepState::Current => (
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            "in progress…",
        ),
        StepState::Pending => (Style::default().fg(Color::DarkGray), ""),
        StepState::Failed => (Style::default().fg(Color::Red), "✗"),
    }
}

fn draw_progress(
    area: Rect,
    f: &mut Frame,
    state: &UiState,
    status: TaskStatus,
    steps: &[(Milestone, StepState); 4],
    percent: u16,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(2), // Header: pipeline + status label
                Constraint::Length(5), // Step tracker
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),
            ]
            .as_ref(),
        )
        .split(area);

    let mut header = vec![
        Span::styled(
            "Processing Pipeline  ",
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} {}...", state.spinner(), status.as_str().to_uppercase()),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(elapsed) = state.elapsed_label() {
        header.push(Span::styled(
            format!("  ({elapsed})"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(header)), rows[0]);

    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4].as_ref())
        .split(rows[1]);
    for ((milestone, step), cell) in steps.iter().zip(cells.iter()) {
        let (style, note) = step_style(*step);
        let label = if *step == StepState::Current {
            format!("{} {}", state.spinner(), milestone.label.to_uppercase())
        } else {
            milestone.label.to_uppercase()
        };
        let p = Paragraph::new(vec![
            Line::from(Span::styled(label, style)),
            Line::from(Span::styled(note, style)),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(style));
        f.render_widget(p, *cell);
    }

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Start")
                .title(Line::from("Finish").alignment(Alignment::Right)),
        )
        .gauge_style(Style::default().fg(ACCENT).bg(Color::Black))
        .percent(percent.min(100))
        .label(format!("{percent}%"));
    f.render_widget(gauge, rows[2]);
}

fn draw_completed(area: Rect, f: &mut Frame, state: &UiState, download_url: Option<&str>) {
    let mut lines = vec![
        Line::from(Span::styled(
            "✓ Separation Complete!",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Your stems and analysis package is ready for download.",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
    ];
    match download_url {
        Some(url) => {
            lines.push(Line::from(vec![
                Span::styled("Download: ", Style::default().fg(Color::Gray)),
                Span::styled(url.to_string(), Style::default().fg(Color::Cyan)),
            ]));
        }
        None => lines.push(Line::from(Span::styled(
            "The server did not report a package file.",
            Style::default().fg(Color::Yellow),
        ))),
    }
    if state.downloading {
        lines.push(Line::from(Span::styled(
            format!("{} Downloading…", state.spinner()),
            Style::default().fg(ACCENT),
        )));
    }
    if let Some(path) = state.saved_path.as_ref() {
        lines.push(Line::from(vec![
            Span::styled("Saved: ", Style::default().fg(Color::Gray)),
            Span::raw(path.display().to_string()),
        ]));
    }
    lines.push(Line::from(""));
    let mut keys = Vec::new();
    if download_url.is_some() {
        keys.extend([
            Span::styled("Ctrl-D", Style::default().fg(Color::Magenta)),
            Span::raw(format!(" save to {}   ", state.save_dir.display())),
            Span::styled("Ctrl-Y", Style::default().fg(Color::Magenta)),
            Span::raw(" copy link   "),
        ]);
    }
    keys.extend([
        Span::styled("Ctrl-R", Style::default().fg(Color::Magenta)),
        Span::raw(" new song"),
    ]);
    lines.push(Line::from(keys));

    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_failed(area: Rect, f: &mut Frame, error: &str) {
    let p = Paragraph::new(vec![
        Line::from(Span::styled(
            "✗ Processing Failed",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Gray))),
        Line::from(""),
        Line::from(vec![
            Span::styled("Ctrl-R", Style::default().fg(Color::Magenta)),
            Span::raw(" try again"),
        ]),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}
