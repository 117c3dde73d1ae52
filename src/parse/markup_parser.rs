use crate::parse::cursor::Cursor;

/// Error raised for input the markup tokenizer or the record decoder rejects.
///
/// Every variant carries the 1-based line where the problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("line {line}: missing or malformed declaration header")]
    BadHeader { line: usize },
    #[error("line {line}: '<' inside an open tag")]
    NestedOpen { line: usize },
    #[error("line {line}: whitespace inside a tag")]
    WhitespaceInTag { line: usize },
    #[error("line {line}: '>' before any tag was opened")]
    CloseBeforeOpen { line: usize },
    #[error("line {line}: empty tag")]
    EmptyTag { line: usize },
    #[error("line {line}: unexpected {found:?} outside a tag")]
    StrayText { line: usize, found: char },
    #[error("line {line}: expected a tag, found end of input")]
    MissingTag { line: usize },
    #[error("line {line}: input ended inside a tag")]
    UnterminatedTag { line: usize },
    #[error("line {line}: comment is never closed")]
    UnterminatedComment { line: usize },
    #[error("line {line}: illegal character {found:?} in leaf text")]
    IllegalLeafChar { line: usize, found: char },
    #[error("line {line}: leaf text runs to end of input")]
    UnterminatedLeaf { line: usize },
    #[error("line {line}: expected <{expected}>, found {found}")]
    UnexpectedLabel {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("line {line}: expected </{expected}>, found {found}")]
    MismatchedClose {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("line {line}: unknown field <{label}>")]
    UnknownField { line: usize, label: String },
    #[error("line {line}: text is not valid UTF-8")]
    InvalidEncoding { line: usize },
    #[error("line {line}: invalid {field} value {text:?}")]
    BadValue {
        line: usize,
        field: String,
        text: String,
    },
}

impl FormatError {
    pub fn line(&self) -> usize {
        match self {
            FormatError::BadHeader { line }
            | FormatError::NestedOpen { line }
            | FormatError::WhitespaceInTag { line }
            | FormatError::CloseBeforeOpen { line }
            | FormatError::EmptyTag { line }
            | FormatError::StrayText { line, .. }
            | FormatError::MissingTag { line }
            | FormatError::UnterminatedTag { line }
            | FormatError::UnterminatedComment { line }
            | FormatError::IllegalLeafChar { line, .. }
            | FormatError::UnterminatedLeaf { line }
            | FormatError::UnexpectedLabel { line, .. }
            | FormatError::MismatchedClose { line, .. }
            | FormatError::UnknownField { line, .. }
            | FormatError::InvalidEncoding { line }
            | FormatError::BadValue { line, .. } => *line,
        }
    }
}

/// A tag read by [`MarkupParser::read_label`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// `<name>`
    Open(String),
    /// `</name>`
    Close(String),
}

impl Label {
    pub fn name(&self) -> &str {
        match self {
            Label::Open(name) | Label::Close(name) => name,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Open(name) => write!(f, "<{}>", name),
            Label::Close(name) => write!(f, "</{}>", name),
        }
    }
}

/// Tokenizer for the goal markup format.
///
/// Three token kinds only: the declaration header, tags, and leaf text.
/// Comments (`<!` ... `->`) are skipped wherever a tag is expected.
/// Anything else is rejected, never repaired.
pub struct MarkupParser<'a> {
    cursor: Cursor<'a>,
    /// Line of the most recent tag's `<`
    label_line: usize,
}

impl<'a> MarkupParser<'a> {
    pub fn new(source: &'a str) -> Self {
        MarkupParser {
            cursor: Cursor::new(source),
            label_line: 1,
        }
    }

    /// Read the declaration line and return its inner text without the
    /// `<?` and `?>` delimiters.
    pub fn read_header(&mut self) -> Result<String, FormatError> {
        let line = self.cursor.line();
        if self.cursor.is_at_end() {
            return Err(FormatError::BadHeader { line });
        }
        let header = self.cursor.take_line();
        if header.len() > 4 && header.starts_with("<?") && header.ends_with("?>") {
            Ok(header[2..header.len() - 2].to_string())
        } else {
            Err(FormatError::BadHeader { line })
        }
    }

    /// Read the next tag, skipping surrounding whitespace and comments.
    pub fn read_label(&mut self) -> Result<Label, FormatError> {
        loop {
            match self.cursor.bump() {
                None => {
                    return Err(FormatError::MissingTag {
                        line: self.cursor.line(),
                    });
                }
                Some(' ' | '\t' | '\n' | '\r') => continue,
                Some('<') => {
                    if self.cursor.eat('!') {
                        self.absorb_comment()?;
                        continue;
                    }
                    break;
                }
                Some('>') => {
                    return Err(FormatError::CloseBeforeOpen {
                        line: self.cursor.line(),
                    });
                }
                Some(found) => {
                    return Err(FormatError::StrayText {
                        line: self.cursor.line(),
                        found,
                    });
                }
            }
        }

        let line = self.cursor.line();
        self.label_line = line;
        let mut name = String::new();
        loop {
            match self.cursor.bump() {
                None => return Err(FormatError::UnterminatedTag { line }),
                Some('<') => {
                    return Err(FormatError::NestedOpen {
                        line: self.cursor.line(),
                    });
                }
                Some('>') => break,
                Some(' ' | '\t' | '\n' | '\r') => {
                    return Err(FormatError::WhitespaceInTag { line });
                }
                Some(c) => name.push(c),
            }
        }

        match name.strip_prefix('/') {
            Some("") => Err(FormatError::EmptyTag { line }),
            Some(closed) => Ok(Label::Close(closed.to_string())),
            None if name.is_empty() => Err(FormatError::EmptyTag { line }),
            None => Ok(Label::Open(name)),
        }
    }

    /// Read leaf data up to (not including) the next `<`.
    pub fn read_leaf_text(&mut self) -> Result<String, FormatError> {
        let mut text = String::new();
        loop {
            match self.cursor.peek() {
                None => {
                    return Err(FormatError::UnterminatedLeaf {
                        line: self.cursor.line(),
                    });
                }
                Some('<') => return Ok(text),
                Some(found @ ('\n' | '\r' | '>')) => {
                    return Err(FormatError::IllegalLeafChar {
                        line: self.cursor.line(),
                        found,
                    });
                }
                Some(c) => {
                    text.push(c);
                    self.cursor.bump();
                }
            }
        }
    }

    /// Read an opening tag and require it to be `<expected>`
    pub fn expect_open(&mut self, expected: &str) -> Result<(), FormatError> {
        match self.read_label()? {
            Label::Open(name) if name == expected => Ok(()),
            other => Err(FormatError::UnexpectedLabel {
                line: self.label_line,
                expected: expected.to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Read a closing tag and require it to be `</expected>`
    pub fn expect_close(&mut self, expected: &str) -> Result<(), FormatError> {
        match self.read_label()? {
            Label::Close(name) if name == expected => Ok(()),
            other => Err(FormatError::MismatchedClose {
                line: self.label_line,
                expected: expected.to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Read `<label>text</label>` after its opening tag has been consumed
    pub fn finish_leaf(&mut self, label: &str) -> Result<String, FormatError> {
        let text = self.read_leaf_text()?;
        self.expect_close(label)?;
        Ok(text)
    }

    pub fn has_more(&mut self) -> bool {
        !self.cursor.is_at_end()
    }

    /// Line of the next unread character
    pub fn line(&self) -> usize {
        self.cursor.line()
    }

    /// Line on which the most recently read tag started
    pub fn label_line(&self) -> usize {
        self.label_line
    }

    /// Consume and return whatever input has not been read yet
    pub fn take_rest(&mut self) -> String {
        self.cursor.rest()
    }

    /// Skip a comment body. The `<!` opener has already been consumed; the
    /// first character after it never takes part in the closing `->`.
    fn absorb_comment(&mut self) -> Result<(), FormatError> {
        let line = self.cursor.line();
        let Some(mut prev) = self.cursor.bump() else {
            return Err(FormatError::UnterminatedComment { line });
        };
        while let Some(c) = self.cursor.bump() {
            if prev == '-' && c == '>' {
                return Ok(());
            }
            prev = c;
        }
        Err(FormatError::UnterminatedComment { line })
    }
}
