//! Single-line text input state.

/// A text input with a cursor, edited one key at a time.
#[derive(Clone, Default)]
pub struct InputField {
    pub value: String,
    pub cursor: usize,
}

impl InputField {
    pub fn new() -> Self {
        InputField::default()
    }

    /// An input pre-filled with `value`, cursor at the end.
    pub fn with_value(value: &str) -> Self {
        InputField {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    pub fn handle_char(&mut self, c: char) {
        self.value.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn handle_backspace(&mut self) {
        if self.cursor > 0 {
            let prev = previous_boundary(&self.value, self.cursor);
            self.value.remove(prev);
            self.cursor = prev;
        }
    }

    pub fn move_cursor_left(&mut self) {
        if self.cursor > 0 {
            self.cursor = previous_boundary(&self.value, self.cursor);
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.value.len() {
            let step = self.value[self.cursor..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
            self.cursor += step;
        }
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn trimmed(&self) -> &str {
        self.value.trim()
    }
}

fn previous_boundary(s: &str, from: usize) -> usize {
    s[..from]
        .char_indices()
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0)
}
