use crate::core::app::{App, ChatSession, InputMode, InstallJob, ScreenState};
use crate::core::error::AppError;
use crate::core::message::Role;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

const STREAMING_CURSOR: &str = "▌";

pub fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    match &app.screen {
        ScreenState::Models => render_models(f, app, chunks[1]),
        ScreenState::Chat(session) => render_chat(f, app, session, chunks[1]),
        ScreenState::Install(job) => render_install(f, job, chunks[1]),
        ScreenState::Error { error, previous } => render_error(f, error, previous, chunks[1]),
    }
    render_status(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!("ollama-tui v{}", env!("CARGO_PKG_VERSION")),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" • Connected to: "),
        Span::styled(app.host.clone(), Style::default().fg(Color::Cyan)),
    ];
    if let Some(session) = app.chat_session() {
        spans.push(Span::raw(format!(" • {}", session.model)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = match &app.ui.status {
        Some(status) => (status.clone(), Style::default().fg(Color::Yellow)),
        None => (key_hints(app).to_string(), Style::default().fg(Color::DarkGray)),
    };
    f.render_widget(Paragraph::new(text).style(style), area);
}

fn key_hints(app: &App) -> &'static str {
    match &app.screen {
        ScreenState::Models => {
            "Enter chat • i install • p pull by name • r refresh • ↑/↓ move • q quit"
        }
        ScreenState::Chat(session) if session.is_streaming() => {
            "Esc interrupt • Ctrl+C quit"
        }
        ScreenState::Chat(_) => {
            "Enter send • Alt+Enter new line • Ctrl+O attach context • Esc back • Ctrl+C quit"
        }
        ScreenState::Install(_) => "Esc cancel • q quit",
        ScreenState::Error { .. } => "b back • q quit",
    }
}

fn render_models(f: &mut Frame, app: &App, area: Rect) {
    let pulling = app.ui.input_mode == InputMode::PullName;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(if pulling { 3 } else { 0 }),
        ])
        .split(area);

    let title = if app.ui.models_loading {
        " Models (loading…) "
    } else {
        " Models "
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    if app.models.is_empty() {
        let text = if app.ui.models_loading {
            "Loading models…"
        } else {
            "No models found. Press p to pull one by name."
        };
        f.render_widget(Paragraph::new(text).block(block), chunks[0]);
    } else {
        let header = Row::new(["Name", "Size (GB)", "Family", "Format", "Modified", ""])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let rows = app.models.iter().map(|model| {
            let state = if model.installed {
                Cell::from("installed").style(Style::default().fg(Color::Green))
            } else {
                Cell::from("available").style(Style::default().fg(Color::DarkGray))
            };
            Row::new([
                Cell::from(model.name.clone()),
                Cell::from(model.size_label()),
                Cell::from(model.family.clone().unwrap_or_else(|| "-".into())),
                Cell::from(model.format.clone().unwrap_or_else(|| "-".into())),
                Cell::from(
                    model
                        .modified_at
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".into()),
                ),
                state,
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Min(20),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(8),
                Constraint::Length(17),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

        let mut state = TableState::default().with_selected(Some(app.ui.selected_model));
        f.render_stateful_widget(table, chunks[0], &mut state);
    }

    if pulling {
        render_input(f, app, " Pull model ", chunks[1]);
    }
}

fn render_chat(f: &mut Frame, app: &App, session: &ChatSession, area: Rect) {
    let input_lines = app.ui.textarea().lines().len().clamp(1, 6) as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(if session.context_attachment.is_some() { 1 } else { 0 }),
            Constraint::Length(input_lines + 2),
        ])
        .split(area);

    let lines = transcript_lines(session);
    let inner_width = chunks[0].width.saturating_sub(2);
    let inner_height = chunks[0].height.saturating_sub(2);
    let total = wrapped_height(&lines, inner_width);
    let scroll = total.saturating_sub(inner_height);

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Chat "))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(transcript, chunks[0]);

    if let Some(attachment) = &session.context_attachment {
        let indicator = Paragraph::new(format!("📎 {}", attachment.label()))
            .style(Style::default().fg(Color::Magenta));
        f.render_widget(indicator, chunks[1]);
    }

    let title = match app.ui.input_mode {
        InputMode::ContextPath => " Attach file or directory (empty detaches) ",
        _ if session.is_streaming() => " Message (waiting for response) ",
        _ => " Message ",
    };
    render_input(f, app, title, chunks[2]);
}

pub(crate) fn transcript_lines(session: &ChatSession) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in &session.messages {
        let (label, color) = match message.role {
            Role::User => ("You", Color::Cyan),
            Role::Assistant => ("Assistant", Color::Green),
            Role::System => ("System", Color::Yellow),
        };
        lines.push(Line::from(Span::styled(
            format!("{label}:"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        let mut body: Vec<Line<'static>> = message
            .content
            .lines()
            .map(|line| Line::from(line.to_string()))
            .collect();
        if !message.complete {
            match body.last_mut() {
                Some(last) => last.push_span(Span::raw(STREAMING_CURSOR)),
                None => body.push(Line::from(STREAMING_CURSOR)),
            }
        }
        lines.extend(body);
        lines.push(Line::default());
    }
    lines
}

/// Rows `lines` occupy once wrapped to `width` columns.
pub(crate) fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| {
            let line_width: usize = line
                .spans
                .iter()
                .map(|span| span.content.as_ref().width())
                .sum();
            line_width.max(1).div_ceil(width)
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn render_input(f: &mut Frame, app: &App, title: &'static str, area: Rect) {
    let mut textarea = app.ui.textarea().clone();
    textarea.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(&textarea, area);
}

fn render_install(f: &mut Frame, job: &InstallJob, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let title = format!(" Installing {} ({}) ", job.model_name, job.status.label());
    let block = Block::default().borders(Borders::ALL).title(title);
    match job.progress.fraction() {
        Some(fraction) => {
            let gauge = Gauge::default()
                .block(block)
                .ratio(fraction.clamp(0.0, 1.0))
                .gauge_style(Style::default().fg(Color::Green));
            f.render_widget(gauge, chunks[0]);
        }
        None => {
            f.render_widget(Paragraph::new("working…").block(block), chunks[0]);
        }
    }

    let detail = match &job.error {
        Some(error) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
        None => Line::from(job.detail.clone()),
    };
    f.render_widget(Paragraph::new(detail).wrap(Wrap { trim: true }), chunks[1]);
}

fn render_error(f: &mut Frame, error: &AppError, previous: &ScreenState, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            error.kind_label().to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(error.to_string()),
        Line::default(),
        Line::from(Span::styled(
            format!("Press b to return to the {} screen.", previous.name()),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let panel = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Error ")
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(panel, area);
}
