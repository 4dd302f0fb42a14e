//! Indent-aware line builder for plain-text reports.
//!
//! Reports use 2-space indentation.

pub struct ReportWriter {
    buf: String,
    indent_level: usize,
    /// True if the current line has not yet been written to.
    at_line_start: bool,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(1024),
            indent_level: 0,
            at_line_start: true,
        }
    }

    /// Write a complete line (appends newline).
    pub fn line(&mut self, text: &str) {
        self.write_indent();
        self.buf.push_str(text);
        self.buf.push('\n');
        self.at_line_start = true;
    }

    /// Write an empty line. Consecutive calls and a leading call collapse.
    pub fn blank(&mut self) {
        if self.buf.is_empty() || self.buf.ends_with("\n\n") {
            return;
        }
        self.buf.push('\n');
        self.at_line_start = true;
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// Write a section heading and indent the lines that follow it.
    pub fn section(&mut self, heading: &str) {
        self.line(heading);
        self.indent();
    }

    pub fn end_section(&mut self) {
        self.dedent();
    }

    /// Write `- text` as a list item.
    pub fn item(&mut self, text: &str) {
        self.line(&format!("- {}", text));
    }

    /// Consume the writer and return the report without its trailing newline.
    pub fn finish(mut self) -> String {
        while self.buf.ends_with('\n') {
            self.buf.pop();
        }
        self.buf
    }

    fn write_indent(&mut self) {
        if self.at_line_start && self.indent_level > 0 {
            for _ in 0..self.indent_level {
                self.buf.push_str("  ");
            }
        }
        self.at_line_start = false;
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}
