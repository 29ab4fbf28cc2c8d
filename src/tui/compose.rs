//! Compose box: text input with length limit, photo action, and send hint.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};

use crate::api::remote_config::DEFAULT_MSG_LENGTH_LIMIT;

/// State for the compose box.
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
    /// Maximum number of characters accepted; further input is rejected.
    max_len: usize,
}

impl Default for ComposeState {
    fn default() -> Self {
        Self {
            input: String::new(),
            cursor_pos: 0,
            max_len: DEFAULT_MSG_LENGTH_LIMIT,
        }
    }
}

impl ComposeState {
    /// Insert a character at the current cursor position. Input past the
    /// active length limit is rejected, not trimmed at send time.
    pub fn insert_char(&mut self, c: char) {
        if self.input.chars().count() >= self.max_len {
            return;
        }
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(prev_byte_pos..byte_pos);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character at the cursor (delete key).
    pub fn delete(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor_pos < char_count {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(byte_pos..next_byte_pos);
        }
    }

    /// Move cursor left by one character.
    pub fn move_left(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
        }
    }

    /// Move cursor right by one character.
    pub fn move_right(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor_pos < char_count {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    /// Clear all input text (Ctrl+U).
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// The active length limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Apply a new length limit. Text already typed past a lowered limit is
    /// truncated.
    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;
        let char_count = self.input.chars().count();
        if char_count > max_len {
            let byte_pos = self.char_to_byte(max_len);
            self.input.truncate(byte_pos);
            self.cursor_pos = self.cursor_pos.min(max_len);
        }
    }

    /// Whether the send action is currently enabled.
    pub fn can_send(&self) -> bool {
        !self.input.trim().is_empty()
    }

    /// Take the message text and clear the box. Returns None (and sends
    /// nothing) for empty or whitespace-only input.
    pub fn send(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.input.clear();
        self.cursor_pos = 0;
        Some(text)
    }

    /// Convert a char-based cursor position to a byte offset.
    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Height of the compose box: 1 border + 1 toolbar + 1 input + 1 border.
pub const COMPOSE_HEIGHT: u16 = 4;

/// Render the compose box into the given area.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, focused: bool) {
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
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let toolbar_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_toolbar(toolbar_area, frame.buffer_mut(), state, focused);

    if inner.height >= 2 {
        let input_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);

        let cursor = compute_cursor_position(input_area, state, focused);
        render_input(input_area, frame.buffer_mut(), state);

        if let Some((cx, cy)) = cursor {
            frame.set_cursor_position((cx, cy));
        }
    }
}

/// Compute the cursor position if the compose box is focused.
fn compute_cursor_position(
    input_area: Rect,
    state: &ComposeState,
    focused: bool,
) -> Option<(u16, u16)> {
    if !focused {
        return None;
    }

    if state.input.is_empty() {
        Some((input_area.x + 1, input_area.y))
    } else {
        let w = input_area.width as usize;
        let display = compose_display_text(&state.input, state.cursor_pos, w);
        let cursor_x = input_area.x + 1 + display.cursor_offset as u16;
        Some((cursor_x, input_area.y))
    }
}

/// Render the toolbar line: photo action, character budget, send hint.
fn render_toolbar(area: Rect, buf: &mut Buffer, state: &ComposeState, focused: bool) {
    let w = area.width as usize;

    let left_items = " [Ctrl+P] photo";
    let right_items = format!(
        "{}/{}  [Enter] send ",
        state.input.chars().count(),
        state.max_len()
    );

    let left_style = if focused {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    // The send hint lights up only when there is something to send.
    let right_style = if focused && state.can_send() {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let left_w = unicode_width::UnicodeWidthStr::width(left_items);
    let right_w = unicode_width::UnicodeWidthStr::width(right_items.as_str());
    let padding = w.saturating_sub(left_w + right_w);

    let line = Line::from(vec![
        Span::styled(left_items, left_style),
        Span::raw(" ".repeat(padding)),
        Span::styled(right_items, right_style),
    ]);

    Paragraph::new(line).render(area, buf);
}

/// Render the input line (with placeholder or text).
fn render_input(area: Rect, buf: &mut Buffer, state: &ComposeState) {
    let w = area.width as usize;

    if state.input.is_empty() {
        let placeholder = " Type a message...";
        let style = Style::default().fg(Color::DarkGray);
        let truncated: String = placeholder.chars().take(w).collect();
        let line = Line::from(Span::styled(truncated, style));
        Paragraph::new(line).render(area, buf);
    } else {
        let display = compose_display_text(&state.input, state.cursor_pos, w);
        let line = Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ));
        Paragraph::new(line).render(area, buf);
    }
}

/// Information about what text to display and where the cursor is.
struct DisplayText {
    visible: String,
    cursor_offset: usize,
}

/// Compute the visible text and cursor offset for display, with horizontal
/// scrolling to keep the cursor on screen.
fn compose_display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    let avail = width.saturating_sub(1);

    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let cursor = cursor_pos.min(len);

    if len <= avail {
        DisplayText {
            visible: input.to_string(),
            cursor_offset: cursor,
        }
    } else {
        let scroll_start = if cursor < avail { 0 } else { cursor - avail + 1 };
        let end = (scroll_start + avail).min(len);
        let visible: String = chars[scroll_start..end].iter().collect();

        DisplayText {
            visible,
            cursor_offset: cursor - scroll_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(state: &mut ComposeState, s: &str) {
        for c in s.chars() {
            state.insert_char(c);
        }
    }

    #[test]
    fn send_requires_non_whitespace_input() {
        let mut state = ComposeState::default();
        assert!(!state.can_send());
        assert_eq!(state.send(), None);

        type_str(&mut state, "   \t ");
        assert!(!state.can_send());
        assert_eq!(state.send(), None);

        type_str(&mut state, "  hello  ");
        assert!(state.can_send());
        assert_eq!(state.send(), Some("hello".to_string()));
        assert!(state.input.is_empty());
    }

    #[test]
    fn input_beyond_limit_is_rejected() {
        let mut state = ComposeState::default();
        state.set_max_len(140);
        for _ in 0..200 {
            state.insert_char('x');
        }
        assert_eq!(state.input.chars().count(), 140);
    }

    #[test]
    fn lowering_limit_truncates_existing_input() {
        let mut state = ComposeState::default();
        type_str(&mut state, "abcdefghij");
        state.set_max_len(4);
        assert_eq!(state.input, "abcd");
        assert_eq!(state.cursor_pos, 4);
        // And further typing stays rejected.
        state.insert_char('z');
        assert_eq!(state.input, "abcd");
    }

    #[test]
    fn default_limit_is_one_thousand() {
        let state = ComposeState::default();
        assert_eq!(state.max_len(), 1000);
    }

    #[test]
    fn cursor_editing_is_char_based() {
        let mut state = ComposeState::default();
        type_str(&mut state, "héllo");
        state.move_left();
        state.backspace();
        assert_eq!(state.input, "hélo");
        state.move_home();
        state.delete();
        assert_eq!(state.input, "élo");
    }
}
