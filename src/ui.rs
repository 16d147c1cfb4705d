use std::sync::OnceLock;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use regex::Regex;
use crate::app::{App, InputMode, Screen};
use crate::state::{ChatMessage, Sender};

const USER_COLOR: Color = Color::Cyan;
const RULE_WIDTH: usize = 24;

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"))
}

fn rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<hr[^>]*>").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

/// Stands in for a `<hr>` on a line of its own until lines are built.
const RULE_MARK: &str = "\u{1e}";

fn emphasis_style(stars: usize) -> Style {
    match stars {
        1 => Style::default().add_modifier(Modifier::ITALIC),
        2 => Style::default().add_modifier(Modifier::BOLD),
        _ => Style::default().add_modifier(Modifier::BOLD | Modifier::ITALIC),
    }
}

/// Split text into plain and emphasized runs: `*italic*`, `**bold**`, `***both***`.
///
/// Runs may cross line breaks; the server wraps whole poems in one `***` run.
/// A marker without a closing partner stays literal.
fn emphasis_runs(text: &str) -> Vec<(String, Style)> {
    let mut runs = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(start) = rest.find('*') {
        let stars = rest[start..].chars().take_while(|c| *c == '*').count().min(3);
        let marker = &rest[start..start + stars];
        let after = &rest[start + stars..];

        match after.find(marker) {
            Some(end) if !after[..end].trim().is_empty() => {
                plain.push_str(&rest[..start]);
                if !plain.is_empty() {
                    runs.push((std::mem::take(&mut plain), Style::default()));
                }
                runs.push((after[..end].to_string(), emphasis_style(stars)));
                rest = &after[end + stars..];
            }
            _ => {
                plain.push_str(&rest[..start + stars]);
                rest = after;
            }
        }
    }

    plain.push_str(rest);
    if !plain.is_empty() {
        runs.push((plain, Style::default()));
    }
    runs
}

fn finish_line(spans: Vec<Span<'static>>) -> Line<'static> {
    let is_rule = spans.len() == 1 && spans[0].content == RULE_MARK;
    if is_rule {
        Line::from(Span::styled(
            "─".repeat(RULE_WIDTH),
            Style::default().fg(Color::Rgb(0xff, 0x99, 0xaa)),
        ))
    } else if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Turn an agent reply (light HTML + markdown emphasis) into terminal lines.
pub fn reply_lines(text: &str) -> Vec<Line<'static>> {
    let text = line_break_re().replace_all(text, "\n");
    let rule_line = format!("\n{}\n", RULE_MARK);
    let text = rule_re().replace_all(&text, rule_line.as_str());
    let text = tag_re().replace_all(&text, "");
    let text = text.strip_suffix('\n').unwrap_or(&text);

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for (run, style) in emphasis_runs(text) {
        let mut pieces = run.split('\n');
        if let Some(first) = pieces.next() {
            if !first.is_empty() {
                current.push(Span::styled(first.to_string(), style));
            }
        }
        for piece in pieces {
            lines.push(finish_line(std::mem::take(&mut current)));
            if !piece.is_empty() {
                current.push(Span::styled(piece.to_string(), style));
            }
        }
    }
    lines.push(finish_line(current));

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);

    match app.screen {
        Screen::Welcome => render_welcome_screen(frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" 🎁 Birthday Gift Hunt ", Style::default().fg(Color::Magenta).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Welcome => " WELCOME ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match (app.screen, app.input_mode) {
        (Screen::Welcome, _) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" start the hunt ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Chat, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Ctrl+P ", key_style),
            Span::styled(" poem ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        (Screen::Chat, InputMode::Normal) => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" p ", key_style),
            Span::styled(" poem ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    if let Some(status) = &app.status {
        hints.push(Span::styled(
            format!(" {} ", status),
            Style::default().bg(Color::Black).fg(Color::Red),
        ));
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_welcome_screen(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "Happy Birthday!",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("Agent Cupid has hidden a few surprises for you."),
        Line::from("Answer the clues to unlock each gift."),
        Line::default(),
        Line::from(Span::styled(
            "[ Press Enter to start the hunt ]",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    ]);

    let welcome = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(welcome, area);
}

fn message_lines(app: &App, msg: &ChatMessage) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.sender {
        Sender::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(USER_COLOR).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(msg.text.clone()));
        }
        Sender::Agent => {
            lines.push(Line::from(Span::styled(
                "Agent Cupid:",
                Style::default()
                    .fg(app.mood.border_color())
                    .add_modifier(Modifier::BOLD),
            )));
            if msg.is_placeholder() {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("{}{}", msg.text, dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            } else {
                lines.extend(reply_lines(&msg.text));
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, play_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    // Mood indicator: the chat border takes the agent's mood color
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.mood.border_color()))
        .title(format!(" {} Agent Cupid ", app.avatar()))
        .title_bottom(Line::from(format!(" mood: {} ", app.mood.label())).right_aligned());

    let chat_text = if app.messages.is_empty() {
        Text::from(Span::styled(
            "Say hi to Agent Cupid...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let view: &App = app;
        let lines: Vec<Line> = view
            .messages
            .iter()
            .flat_map(|msg| message_lines(view, msg))
            .collect();
        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    render_play_button(app, frame, play_area);
    render_input(app, frame, input_area);
}

fn render_play_button(app: &App, frame: &mut Frame, area: Rect) {
    let (border, caption_style) = if app.play_enabled {
        (
            Style::default().fg(Color::Magenta),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )
    } else {
        (
            Style::default().fg(Color::DarkGray),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        )
    };

    let block = Block::default().borders(Borders::ALL).border_style(border);
    let button = Paragraph::new(Span::styled(app.play_caption(), caption_style))
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(button, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input_border_color = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(" Type your answer here... ");

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(USER_COLOR))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}
