use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::model::options::UserOptions;
use crate::ops::sort::SortPrefError;
use crate::parse::{FormatError, Label, MarkupParser, MarkupWriter, WriteError};

const ROOT_LABEL: &str = "options";
const VERBOSE: &str = "verbose";
const PAGING: &str = "paging";
const NUMBERS: &str = "numbers";
const SORT: &str = "sort";

/// Error type for the user options file
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("{path}: {source}")]
    Format { path: PathBuf, source: FormatError },
    #[error("{path}: bad sort preference: {source}")]
    Sort { path: PathBuf, source: SortPrefError },
    #[error("could not serialize options: {0}")]
    Serialize(#[from] WriteError),
}

/// Load persisted options into `options`. A missing file leaves the
/// defaults in place.
///
/// Settings are applied through the regular setters, so the sort version
/// only moves when the stored preference differs from the current one.
pub fn load_options(path: &Path, options: &mut UserOptions) -> Result<(), OptionsError> {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(OptionsError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let stored = parse_options(&source).map_err(|source| OptionsError::Format {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(prefs) = &stored.sort {
        options
            .set_sort_prefs(prefs)
            .map_err(|source| OptionsError::Sort {
                path: path.to_path_buf(),
                source,
            })?;
    }
    if let Some(v) = stored.verbose {
        options.verbose = v;
    }
    if let Some(v) = stored.paging {
        options.paging = v;
    }
    if let Some(v) = stored.numbers {
        options.show_numbers = v;
    }
    tracing::debug!(path = %path.display(), sort = %options.sort_prefs(), "options loaded");
    Ok(())
}

/// Write `options` to `path`, replacing any previous file
pub fn save_options(path: &Path, options: &UserOptions) -> Result<(), OptionsError> {
    let content = serialize_options(options)?;
    atomic_write(path, content.as_bytes()).map_err(|e| OptionsError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Leaves found in an options file; absent ones stay `None`
#[derive(Debug, Default, PartialEq)]
struct StoredOptions {
    verbose: Option<bool>,
    paging: Option<bool>,
    numbers: Option<bool>,
    sort: Option<String>,
}

fn parse_options(source: &str) -> Result<StoredOptions, FormatError> {
    let mut parser = MarkupParser::new(source);
    parser.read_header()?;
    parser.expect_open(ROOT_LABEL)?;

    let mut stored = StoredOptions::default();
    loop {
        let field = match parser.read_label()? {
            Label::Close(name) if name == ROOT_LABEL => return Ok(stored),
            close @ Label::Close(_) => {
                return Err(FormatError::MismatchedClose {
                    line: parser.label_line(),
                    expected: ROOT_LABEL.to_string(),
                    found: close.to_string(),
                });
            }
            Label::Open(field) => field,
        };
        match field.as_str() {
            VERBOSE => stored.verbose = Some(parse_flag(&mut parser, VERBOSE)?),
            PAGING => stored.paging = Some(parse_flag(&mut parser, PAGING)?),
            NUMBERS => stored.numbers = Some(parse_flag(&mut parser, NUMBERS)?),
            SORT => stored.sort = Some(parser.finish_leaf(SORT)?.trim().to_string()),
            _ => {
                return Err(FormatError::UnknownField {
                    line: parser.label_line(),
                    label: field,
                });
            }
        }
    }
}

fn parse_flag(parser: &mut MarkupParser, label: &str) -> Result<bool, FormatError> {
    crate::parse::goal_codec::parse_leaf(parser, label)
}

fn serialize_options(options: &UserOptions) -> Result<String, WriteError> {
    let mut writer = MarkupWriter::new(Vec::new());
    writer.write_header()?;
    writer.open_label(ROOT_LABEL, true)?;
    writer.write_leaf(VERBOSE, &options.verbose.to_string())?;
    writer.write_leaf(PAGING, &options.paging.to_string())?;
    writer.write_leaf(NUMBERS, &options.show_numbers.to_string())?;
    writer.write_leaf(SORT, &options.sort_prefs().to_string())?;
    writer.close_label()?;
    let bytes = writer.finish()?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
