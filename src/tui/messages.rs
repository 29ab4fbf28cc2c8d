//! Messages pane: the live-updating list of chat rows.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use std::collections::HashMap;

use crate::models::FriendlyMessage;

/// What a row displays: a message is either text or a photo, never both on
/// screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowBody {
    Text(String),
    Photo(String),
}

/// One rendered row, bound to a message document.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub key: String,
    pub sender: String,
    pub body: RowBody,
    /// Local receive time, for display only.
    pub received_at: String,
}

/// Bind a message record to row content: a present photo URL wins and the
/// text element is suppressed; otherwise the text is shown. The author name
/// is always set.
fn bind_row(key: String, msg: &FriendlyMessage) -> MessageRow {
    let sender = if msg.name.is_empty() {
        "anonymous".to_string()
    } else {
        msg.name.clone()
    };
    let body = if msg.is_photo() {
        RowBody::Photo(msg.photo_url.clone().unwrap_or_default())
    } else {
        RowBody::Text(msg.text.clone().unwrap_or_default())
    };
    MessageRow {
        key,
        sender,
        body,
        received_at: chrono::Local::now().format("%H:%M").to_string(),
    }
}

/// State for the messages pane.
#[derive(Default)]
pub struct MessagesState {
    rows: Vec<MessageRow>,
    /// Row index per message key, for in-place updates.
    by_key: HashMap<String, usize>,
    /// Vertical scroll offset in rendered lines; only meaningful while not
    /// following the tail.
    pub scroll_offset: usize,
    /// Whether the view sticks to the newest row.
    pub follow: bool,
}

impl MessagesState {
    pub fn new() -> Self {
        Self {
            follow: true,
            ..Self::default()
        }
    }

    /// Append a new row or update the row already bound to this key.
    pub fn upsert(&mut self, key: String, msg: &FriendlyMessage) {
        match self.by_key.get(&key) {
            Some(&idx) => {
                self.rows[idx] = bind_row(key, msg);
            }
            None => {
                self.by_key.insert(key.clone(), self.rows.len());
                self.rows.push(bind_row(key, msg));
            }
        }
    }

    /// Discard every row (sign-out, pause).
    pub fn clear(&mut self) {
        self.rows.clear();
        self.by_key.clear();
        self.scroll_offset = 0;
        self.follow = true;
    }

    pub fn rows(&self) -> &[MessageRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn scroll_up(&mut self) {
        self.follow = false;
        self.scroll_offset = self.scroll_offset.saturating_add(1);
    }

    pub fn scroll_down(&mut self) {
        if self.scroll_offset > 0 {
            self.scroll_offset -= 1;
        }
        if self.scroll_offset == 0 {
            self.follow = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the messages pane into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &MessagesState, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if state.is_empty() {
        let line = Line::from(Span::styled(
            " (no messages yet)",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    let all_lines = build_row_lines(state, inner.width as usize);
    let total_lines = all_lines.len();
    let visible_height = inner.height as usize;

    // scroll_offset counts lines back from the tail; follow pins it to 0.
    let offset = if state.follow { 0 } else { state.scroll_offset };
    let end = total_lines.saturating_sub(offset);
    let start = end.saturating_sub(visible_height);

    for (row, line_idx) in (start..end).enumerate() {
        let y = inner.y + row as u16;
        if y >= inner.y + inner.height {
            break;
        }
        let line_area = Rect::new(inner.x, y, inner.width, 1);
        Paragraph::new(all_lines[line_idx].clone()).render(line_area, buf);
    }

    // Scroll indicators.
    if total_lines > visible_height {
        let indicator_x = inner.x + inner.width.saturating_sub(1);
        if start > 0 {
            let cell = &mut buf[(indicator_x, inner.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if end < total_lines {
            let bottom_y = inner.y + inner.height.saturating_sub(1);
            let cell = &mut buf[(indicator_x, bottom_y)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

/// Build the flat line buffer for all rows.
fn build_row_lines(state: &MessagesState, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let content_width = width.saturating_sub(2);

    for row in state.rows() {
        // Header: sender name, right-padded receive time.
        let pad = content_width
            .saturating_sub(row.sender.chars().count())
            .saturating_sub(row.received_at.len());
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {}", row.sender),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" ".repeat(pad)),
            Span::styled(
                row.received_at.clone(),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

        match row.body {
            RowBody::Text(ref text) => {
                for wrapped in wrap_text(text, content_width) {
                    lines.push(Line::from(Span::raw(format!(" {}", wrapped))));
                }
            }
            RowBody::Photo(ref url) => {
                // Terminal stand-in for the image element.
                lines.push(Line::from(vec![
                    Span::styled(
                        " [photo] ".to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(url.clone(), Style::default().fg(Color::Cyan)),
                ]));
            }
        }

        lines.push(Line::from(""));
    }

    lines
}

/// Simple word-wrapping: split content by newlines first, then wrap long lines.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.len() <= max_width {
            result.push(line.to_string());
        } else {
            let words: Vec<&str> = line.split_whitespace().collect();
            let mut current = String::new();
            for word in words {
                if current.is_empty() {
                    current = word.to_string();
                } else if current.len() + 1 + word.len() <= max_width {
                    current.push(' ');
                    current.push_str(word);
                } else {
                    result.push(current);
                    current = word.to_string();
                }
            }
            if !current.is_empty() {
                result.push(current);
            }
        }
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_binds_to_text_row() {
        let mut state = MessagesState::new();
        state.upsert(
            "-N1".to_string(),
            &FriendlyMessage::text("hi", "Alice", None),
        );

        let rows = state.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "Alice");
        assert_eq!(rows[0].body, RowBody::Text("hi".to_string()));
    }

    #[test]
    fn photo_message_suppresses_text() {
        let mut state = MessagesState::new();
        let mut msg = FriendlyMessage::photo("http://x/y.jpg", "Bob", None);
        // Even a document carrying both fields renders as a photo row.
        msg.text = Some("ignored".to_string());
        state.upsert("-N1".to_string(), &msg);

        assert_eq!(
            state.rows()[0].body,
            RowBody::Photo("http://x/y.jpg".to_string())
        );
        assert_eq!(state.rows()[0].sender, "Bob");
    }

    #[test]
    fn missing_name_falls_back_to_anonymous() {
        let mut state = MessagesState::new();
        let msg: FriendlyMessage = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        state.upsert("-N1".to_string(), &msg);
        assert_eq!(state.rows()[0].sender, "anonymous");
    }

    #[test]
    fn upsert_with_known_key_updates_in_place() {
        let mut state = MessagesState::new();
        state.upsert(
            "-N1".to_string(),
            &FriendlyMessage::text("first", "Alice", None),
        );
        state.upsert(
            "-N1".to_string(),
            &FriendlyMessage::text("edited", "Alice", None),
        );

        assert_eq!(state.rows().len(), 1);
        assert_eq!(state.rows()[0].body, RowBody::Text("edited".to_string()));
    }

    #[test]
    fn clear_discards_all_rows() {
        let mut state = MessagesState::new();
        state.upsert(
            "-N1".to_string(),
            &FriendlyMessage::text("hi", "Alice", None),
        );
        state.clear();
        assert!(state.is_empty());
        // A fresh add after clearing appends rather than updating a stale index.
        state.upsert(
            "-N1".to_string(),
            &FriendlyMessage::text("hi again", "Alice", None),
        );
        assert_eq!(state.rows().len(), 1);
    }

    #[test]
    fn wrap_text_preserves_empty_content() {
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }
}
