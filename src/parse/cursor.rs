use std::iter::Peekable;
use std::str::Chars;

/// Single-character lookahead over a source string, tracking the current line.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Cursor {
            chars: source.chars().peekable(),
            line: 1,
        }
    }

    /// Look at the next character without consuming it
    pub fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consume the next character
    pub fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Consume the next character only if it equals `expected`
    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume up to and including the next newline, returning the line
    /// without its terminator (a trailing `\r` is dropped too).
    pub fn take_line(&mut self) -> String {
        let mut line = String::new();
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
            line.push(c);
        }
        if line.ends_with('\r') {
            line.pop();
        }
        line
    }

    /// Collect everything that has not been consumed yet
    pub fn rest(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.bump() {
            out.push(c);
        }
        out
    }

    pub fn is_at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    /// 1-based line of the next character
    pub fn line(&self) -> usize {
        self.line
    }
}
