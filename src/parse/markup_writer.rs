use std::io::{self, Write};

/// The declaration line written at the top of every file
pub const HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Error type for markup output
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("close requested with no open label")]
    NoOpenLabel,
    #[error("labels left open: {0:?}")]
    Unclosed(Vec<String>),
    #[error("text for <{label}> contains a character the parser rejects: {text:?}")]
    IllegalText { label: String, text: String },
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

/// Emits tags matching what [`MarkupParser`](super::MarkupParser) accepts,
/// indenting block labels with one tab per nesting level.
pub struct MarkupWriter<W: Write> {
    out: W,
    indent_level: usize,
    /// Open labels, innermost last, with their block flag
    label_stack: Vec<(String, bool)>,
}

impl<W: Write> MarkupWriter<W> {
    pub fn new(out: W) -> Self {
        MarkupWriter {
            out,
            indent_level: 0,
            label_stack: Vec::new(),
        }
    }

    pub fn write_header(&mut self) -> Result<(), WriteError> {
        writeln!(self.out, "{}", HEADER)?;
        Ok(())
    }

    /// Write `<label>`. A block label ends the line and indents its children.
    pub fn open_label(&mut self, label: &str, block: bool) -> Result<(), WriteError> {
        self.indent()?;
        write!(self.out, "<{}>", label)?;
        self.label_stack.push((label.to_string(), block));
        if block {
            writeln!(self.out)?;
            self.indent_level += 1;
        }
        Ok(())
    }

    /// Pop the innermost label and write its closing tag
    pub fn close_label(&mut self) -> Result<(), WriteError> {
        let (label, block) = self.label_stack.pop().ok_or(WriteError::NoOpenLabel)?;
        if block {
            self.indent_level -= 1;
            self.indent()?;
        }
        writeln!(self.out, "</{}>", label)?;
        Ok(())
    }

    /// Write `<label>text</label>` on its own line
    pub fn write_leaf(&mut self, label: &str, text: &str) -> Result<(), WriteError> {
        if text.contains(['<', '>', '\n', '\r']) {
            return Err(WriteError::IllegalText {
                label: label.to_string(),
                text: text.to_string(),
            });
        }
        self.open_label(label, false)?;
        self.out.write_all(text.as_bytes())?;
        self.close_label()
    }

    /// Number of labels currently open
    pub fn depth(&self) -> usize {
        self.label_stack.len()
    }

    /// Flush and hand back the destination. Fails if any label is still open.
    pub fn finish(mut self) -> Result<W, WriteError> {
        if !self.label_stack.is_empty() {
            let open = self.label_stack.into_iter().map(|(l, _)| l).collect();
            return Err(WriteError::Unclosed(open));
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn indent(&mut self) -> io::Result<()> {
        for _ in 0..self.indent_level {
            self.out.write_all(b"\t")?;
        }
        Ok(())
    }
}
