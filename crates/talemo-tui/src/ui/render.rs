use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use talemo_core::{GateState, LoginSurface};

use crate::app::{App, AppState, LoginFocus};
use crate::ui::styles;

/// Width of the login and quit dialogs.
const DIALOG_WIDTH: u16 = 50;

/// Visible characters of a text field.
const FIELD_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);
    render_account_panel(frame, app, body[0]);
    render_activity_panel(frame, app, body[1]);

    render_status_bar(frame, app, chunks[2]);

    // The gate owns whether the overlay is up; we only draw it.
    if let Some(surface) = app.services.gate.overlay() {
        render_login_overlay(frame, app, &surface);
    }

    if app.state == AppState::ConfirmingQuit {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let state = match app.services.gate.state() {
        GateState::Authenticated => Span::styled("● signed in", styles::signed_in_style()),
        GateState::Unauthenticated => Span::styled("○ signed out", styles::muted_style()),
    };

    let line = Line::from(vec![
        Span::styled(" talemo ", styles::title_style()),
        Span::styled("│ ", styles::muted_style()),
        state,
    ]);
    frame.render_widget(Paragraph::new(line).style(styles::status_bar_style()), area);
}

fn render_account_panel(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![];

    match app.sessions.first() {
        Some(session) => {
            lines.push(Line::from(vec![
                Span::styled("Account:  ", styles::muted_style()),
                Span::styled(session.account.label.clone(), styles::text_style()),
            ]));
            lines.push(Line::from(vec![
                Span::styled("User id:  ", styles::muted_style()),
                Span::styled(session.account.id.clone(), styles::text_style()),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Session:  ", styles::muted_style()),
                Span::styled(session.id.clone(), styles::text_style()),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Scopes:   ", styles::muted_style()),
                Span::styled(session.scopes.join(", "), styles::text_style()),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Token:    ", styles::muted_style()),
                Span::styled(mask_token(&session.access_token), styles::muted_style()),
            ]));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "No session",
                styles::muted_style(),
            )));
        }
    }

    let block = Block::default()
        .title(" Account ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_activity_panel(frame: &mut Frame, app: &App, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = app.event_log.len().saturating_sub(visible);
    let lines: Vec<Line> = app
        .event_log
        .iter()
        .skip(skip)
        .map(|entry| {
            let style = if entry.starts_with('+') {
                styles::signed_in_style()
            } else {
                styles::muted_style()
            };
            Line::from(Span::styled(entry.clone(), style))
        })
        .collect();

    let block = Block::default()
        .title(" Session activity ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = if app.is_login_visible() {
        vec![
            Span::styled(" Tab", styles::help_key_style()),
            Span::raw(" next field  "),
            Span::styled("Enter", styles::help_key_style()),
            Span::raw(" sign in  "),
            Span::styled("Esc", styles::help_key_style()),
            Span::raw(" quit "),
        ]
    } else {
        vec![
            Span::styled(" o", styles::help_key_style()),
            Span::raw(" sign out  "),
            Span::styled("x", styles::help_key_style()),
            Span::raw(" remove session  "),
            Span::styled("r", styles::help_key_style()),
            Span::raw(" refresh  "),
            Span::styled("q", styles::help_key_style()),
            Span::raw(" quit "),
        ]
    };

    if let Some(ref message) = app.status_message {
        spans.push(Span::styled("│ ", styles::muted_style()));
        spans.push(Span::styled(message.clone(), styles::highlight_style()));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(styles::status_bar_style()),
        area,
    );
}

fn render_login_overlay(frame: &mut Frame, app: &App, surface: &LoginSurface) {
    let error = surface.error_message();
    let height = if error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(DIALOG_WIDTH, height, frame.area());

    frame.render_widget(Clear, area);

    let form = &app.login;
    let mut lines = vec![
        Line::from(Span::styled("  Sign in to talemo", styles::title_style())),
        Line::from(""),
    ];

    let email_focused = form.focus == LoginFocus::Email;
    lines.push(field_line(
        "Email:    ",
        &tail(&form.email, FIELD_WIDTH),
        email_focused,
    ));

    let password_focused = form.focus == LoginFocus::Password;
    let masked = "*".repeat(form.password.chars().count().min(FIELD_WIDTH));
    lines.push(field_line("Password: ", &masked, password_focused));

    lines.push(Line::from(""));
    let label = surface.submit_label();
    let button_style = if !surface.is_submit_enabled() {
        styles::disabled_style()
    } else if form.focus == LoginFocus::Button {
        styles::focused_style()
    } else {
        styles::text_style()
    };
    let button_text = if form.focus == LoginFocus::Button && surface.is_submit_enabled() {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    lines.push(Line::from(vec![
        Span::raw("              ["),
        Span::styled(button_text, button_style),
        Span::raw("]"),
    ]));

    if let Some(message) = error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", message),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line<'a>(label: &'a str, value: &str, focused: bool) -> Line<'a> {
    let style = if focused {
        styles::focused_style()
    } else {
        styles::text_style()
    };
    let cursor = if focused { "▌" } else { " " };
    Line::from(vec![
        Span::raw("  "),
        Span::styled(label, styles::muted_style()),
        Span::styled("[", styles::muted_style()),
        Span::styled(
            format!("{:<width$}{}", value, cursor, width = FIELD_WIDTH),
            style,
        ),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(DIALOG_WIDTH, 6, frame.area());

    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

/// Last `width` characters, so the cursor end of a long email stays visible.
fn tail(value: &str, width: usize) -> String {
    let count = value.chars().count();
    value.chars().skip(count.saturating_sub(width)).collect()
}

fn mask_token(token: &str) -> String {
    let shown: String = token.chars().take(4).collect();
    format!("{}…", shown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed_fits_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect_fixed(50, 10, outer);
        assert_eq!(inner, Rect::new(25, 15, 50, 10));
    }

    #[test]
    fn test_centered_rect_fixed_clamps_to_small_area() {
        let outer = Rect::new(0, 0, 30, 5);
        let inner = centered_rect_fixed(50, 10, outer);
        assert_eq!(inner, Rect::new(0, 0, 30, 5));
    }

    #[test]
    fn test_tail_keeps_end_of_long_value() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
        assert_eq!(tail("", 3), "");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("tok123456"), "tok1…");
        assert_eq!(mask_token("ab"), "ab…");
    }
}
