//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget},
    Frame,
};

use super::app::App;
use super::app::Pane;
use super::compose;
use super::messages;

/// Returns feed indicator symbol and color based on attachment state
fn feed_indicator(attached: bool) -> (&'static str, Color) {
    if attached {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: header (1 line) + main content + status bar (1 line)
    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    // Split main area: messages (fill) + compose box (4 lines)
    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(main_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        app.active_pane == Pane::Compose && app.photo_prompt.is_none(),
    );

    render_status(status_area, frame.buffer_mut(), app);

    // Photo path entry overlay (on top of everything else)
    if let Some(ref path) = app.photo_prompt {
        render_photo_prompt(frame, path);
    }
}

/// Render the header bar
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = Span::styled(
        " FriendlyChat",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let (feed_symbol, feed_color) = feed_indicator(app.feed_attached);
    let feed_status = Span::styled(
        format!(" {} live ", feed_symbol),
        Style::default().fg(feed_color),
    );

    let user = app.username().unwrap_or("signed out");
    let user_name = Span::styled(format!(" {} ", user), Style::default().fg(Color::Cyan));

    // Right-align the feed state and user name.
    let left_width = " FriendlyChat".len();
    let right_content = format!(" {} live  {} ", feed_symbol, user);
    let padding_width = area
        .width
        .saturating_sub((left_width + right_content.len()) as u16) as usize;
    let padding = Span::raw(" ".repeat(padding_width));

    let header_line = Line::from(vec![title, padding, feed_status, user_name]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    // A transient status message takes over the whole bar.
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", msg), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let (feed_symbol, feed_color) = feed_indicator(app.feed_attached);
    let feed_state = if app.paused {
        "paused"
    } else if app.feed_attached {
        "live"
    } else {
        "detached"
    };
    let connection = Span::styled(
        format!(" {} {} ", feed_symbol, feed_state),
        Style::default().fg(feed_color),
    );

    let sep_style = Style::default().fg(Color::DarkGray);

    let pane = Span::styled(
        format!("Tab: {} ", app.active_pane.as_str()),
        Style::default().fg(Color::Cyan),
    );

    let pause_hint = Span::styled("C-b: pause", Style::default().fg(Color::Gray));
    let signout_hint = Span::styled("C-o: sign out", Style::default().fg(Color::Gray));
    let quit_hint = Span::styled("C-c: quit", Style::default().fg(Color::Gray));

    let status_line = Line::from(vec![
        connection,
        Span::styled(" | ", sep_style),
        pane,
        Span::styled(" | ", sep_style),
        pause_hint,
        Span::styled(" | ", sep_style),
        signout_hint,
        Span::styled(" | ", sep_style),
        quit_hint,
    ]);

    Paragraph::new(status_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the photo path entry overlay, centered.
fn render_photo_prompt(frame: &mut Frame, path: &str) {
    let area = frame.area();
    let width = area.width.min(60);
    let height = 3;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let popup = Rect::new(x, y, width, height);

    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Send photo -- path ([Enter] send, [Esc] cancel) ");

    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    // Keep the tail of a long path visible.
    let avail = inner.width.saturating_sub(2) as usize;
    let shown: String = if path.chars().count() > avail {
        path.chars()
            .skip(path.chars().count() - avail)
            .collect()
    } else {
        path.to_string()
    };

    let line = Line::from(Span::styled(
        format!(" {}", shown),
        Style::default().fg(Color::White),
    ));
    frame.render_widget(Paragraph::new(line), inner);
    frame.set_cursor_position((inner.x + 1 + shown.chars().count() as u16, inner.y));
}
