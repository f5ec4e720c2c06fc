//! Response framing: reassembling reader lines into one top-level form.
//!
//! The solver's output stream has no request identifiers; a response is
//! delimited purely by its grammar — a bare atom on one line (`sat`) or
//! one balanced parenthesized form that may span several lines
//! (`get-model` output). String literals and `|…|` quoted symbols are
//! opaque to the balance count, so a payload like `(echo ")")` cannot
//! truncate a frame.

/// Accumulates lines until one complete response frame is available.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: String,
    depth: i64,
    in_string: bool,
    in_symbol: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). Returns the completed
    /// frame once the form is balanced, resetting the buffer for the
    /// next response. Blank lines between frames are ignored.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if self.buf.is_empty() && line.trim().is_empty() {
            return None;
        }

        if !self.buf.is_empty() {
            self.buf.push('\n');
        }
        self.buf.push_str(line);
        self.scan(line);

        if self.depth <= 0 && !self.in_string && !self.in_symbol {
            let frame = std::mem::take(&mut self.buf).trim().to_string();
            self.depth = 0;
            return Some(frame);
        }
        None
    }

    /// Whether a partially accumulated frame is pending.
    pub fn is_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    fn scan(&mut self, line: &str) {
        for ch in line.chars() {
            if self.in_string {
                if ch == '"' {
                    self.in_string = false;
                }
                continue;
            }
            if self.in_symbol {
                if ch == '|' {
                    self.in_symbol = false;
                }
                continue;
            }
            match ch {
                '"' => self.in_string = true,
                '|' => self.in_symbol = true,
                '(' => self.depth += 1,
                ')' => self.depth -= 1,
                _ => {}
            }
        }
    }
}
