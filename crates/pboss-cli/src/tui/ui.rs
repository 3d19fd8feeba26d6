use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;

use pboss_core::Phase;
use pboss_secret::mask;

use super::app::{App, Focus, Pending};
use crate::view;

/// Render the full TUI frame.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // main area
            Constraint::Length(1), // status bar
        ])
        .split(f.area());

    if !app.ready {
        render_loading(f, app, chunks[0]);
    } else {
        match app.phase {
            Phase::Setup => render_setup(f, app, chunks[0]),
            Phase::Active => render_active(f, app, chunks[0]),
            Phase::Reported => render_report(f, app, chunks[0]),
        }
    }
    render_status_bar(f, app, chunks[1]);

    if app.show_consent() {
        render_consent(f, app, f.area());
    } else if app.phase == Phase::Setup && app.focus == Focus::ApiKey {
        render_key_input(f, app, f.area());
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn render_loading(f: &mut Frame, app: &App, area: Rect) {
    let text = if app.is_dead() {
        "Startup failed."
    } else {
        "Connecting to backend..."
    };
    let block = Block::default()
        .title(" Productivity Boss ")
        .borders(Borders::ALL);
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn render_setup(f: &mut Frame, app: &App, area: Rect) {
    let mut constraints = vec![Constraint::Min(3), Constraint::Length(3)];
    if !app.api_key_present {
        constraints.push(Constraint::Length(2));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let items: Vec<ListItem> = app
        .personas
        .iter()
        .enumerate()
        .map(|(i, persona)| {
            let selected = app.selected == Some(i);
            let marker = if selected { ">" } else { " " };
            let style = if selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(
                format!(" {marker} {}", persona.label()),
                style,
            )))
        })
        .collect();
    let personas = List::new(items).block(
        Block::default()
            .title(format!(" Personas ({}) ", app.personas.len()))
            .borders(Borders::ALL)
            .border_style(focus_style(app.focus == Focus::Personas)),
    );
    f.render_widget(personas, chunks[0]);

    let editing = app.focus == Focus::Goal;
    let goal = if app.goal_input.is_empty() && !editing {
        Span::styled("(optional)", Style::default().fg(Color::DarkGray))
    } else if editing {
        Span::raw(format!("{}_", app.goal_input))
    } else {
        Span::raw(app.goal_input.clone())
    };
    let goal = Paragraph::new(Line::from(goal)).block(
        Block::default()
            .title(" Today's goal ")
            .borders(Borders::ALL)
            .border_style(focus_style(editing)),
    );
    f.render_widget(goal, chunks[1]);

    if !app.api_key_present {
        let hint = Paragraph::new(view::KEY_HINT)
            .style(Style::default().fg(Color::Yellow))
            .wrap(Wrap { trim: true });
        f.render_widget(hint, chunks[2]);
    }
}

fn render_active(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    if let Some(persona) = &app.persona {
        lines.push(Line::from(view::persona_line(persona)));
    }
    lines.push(Line::from(view::goal_line(&app.goal)));
    lines.push(Line::from(""));
    for counter in view::counter_lines(&app.totals) {
        lines.push(Line::from(Span::styled(
            counter,
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(message) = &app.message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        )));
    }
    let block = Block::default().title(" Tracking ").borders(Borders::ALL);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_report(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = app
        .report
        .as_ref()
        .map(view::report_lines)
        .unwrap_or_default()
        .into_iter()
        .map(Line::from)
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Enter] Close",
        Style::default().fg(Color::DarkGray),
    )));
    let block = Block::default().title(" Day report ").borders(Borders::ALL);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

/// Centered box `percent_x` wide and `height` rows tall.
fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(rows[1])[1]
}

fn render_consent(f: &mut Frame, app: &App, area: Rect) {
    let area = centered(area, 60, 9);
    let footer = if app.pending == Some(Pending::Consent) {
        "Recording consent..."
    } else {
        "[a] Accept   [q] Quit"
    };
    let lines = vec![
        Line::from(view::CONSENT_TEXT),
        Line::from(""),
        Line::from(Span::styled(footer, Style::default().fg(Color::DarkGray))),
    ];
    let block = Block::default()
        .title(" Consent ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_key_input(f: &mut Frame, app: &App, area: Rect) {
    let area = centered(area, 50, 3);
    let shown = if app.key_input.is_empty() {
        "_".to_string()
    } else {
        mask(&app.key_input)
    };
    let block = Block::default()
        .title(" API key (Enter save, Esc cancel) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(shown).block(block), area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if let Some((_, err)) = &app.error {
        (
            format!(" ERROR: {err}"),
            Style::default().fg(Color::White).bg(Color::Red),
        )
    } else if let Some(pending) = app.pending {
        let doing = match pending {
            Pending::Consent => "recording consent",
            Pending::Start => "starting day",
            Pending::End => "ending day",
            Pending::SaveKey => "saving key",
        };
        (
            format!(" pboss | {doing}..."),
            Style::default().fg(Color::White).bg(Color::Blue),
        )
    } else {
        let help = match (app.ready, app.phase) {
            (false, _) => "q:quit",
            (true, Phase::Setup) => match app.focus {
                Focus::Personas => "↑/↓:persona  Tab:goal  k:api key  Enter:start  q:quit",
                Focus::Goal => "type goal  Enter/Tab:done",
                Focus::ApiKey => "type key  Enter:save  Esc:cancel",
            },
            (true, Phase::Active) => "e:end day  q:quit",
            (true, Phase::Reported) => "Enter:close",
        };
        let notice = app
            .notice
            .as_deref()
            .map(|n| format!("{n} | "))
            .unwrap_or_default();
        (
            format!(" pboss {} | {notice}{help}", app.phase),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        )
    };
    let bar = Paragraph::new(Line::from(Span::styled(text, style)));
    f.render_widget(bar, area);
}
