use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const KEYS: [(&str, &str); 7] = [
    ("Enter", "Submit the song in the input box"),
    ("Ctrl-R", "Start over with a new song"),
    ("Ctrl-D", "Save the finished package"),
    ("Ctrl-Y", "Copy the download link"),
    ("Ctrl-U", "Clear the input box"),
    ("Tab / F1", "Switch tabs"),
    ("Esc / Ctrl-C", "Quit"),
];

fn key_line(key: &'static str, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{key:<14}"), Style::default().fg(Color::Magenta)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, base_url: &str) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYS.iter().map(|(k, w)| key_line(k, w)));
    lines.extend([
        Line::from(""),
        Line::from("Paste a YouTube link or type a song name, then press Enter."),
        Line::from("Status is checked every few seconds until the package is ready."),
        Line::from("Quitting leaves the task running on the server."),
        Line::from(""),
        Line::from("Backend:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(base_url.to_string(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(Span::styled(
            "  set with --base-url or STEMSENSE_API_URL",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
