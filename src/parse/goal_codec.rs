use std::io::Write;
use std::str::FromStr;

use crate::model::goal::{Goal, PERCENT_RANGE};
use crate::parse::markup_parser::{FormatError, Label, MarkupParser};
use crate::parse::markup_writer::{MarkupWriter, WriteError};

/// Root element of a goal file
pub const ROOT_LABEL: &str = "goalkeeper";
/// One record block
pub const GOAL_LABEL: &str = "goal";

const NAME: &str = "name";
const PRIORITY: &str = "priority";
const COMPLETION: &str = "completion";
const UNIT_COST: &str = "unitcost";

/// Result of reading a goal file.
///
/// Decoding stops at the first error; `goals` holds every record that was
/// complete before it and `unread` the input that was never looked at.
#[derive(Debug, Default)]
pub struct ParsedGoals {
    pub goals: Vec<Goal>,
    pub error: Option<FormatError>,
    pub unread: String,
}

/// Parse a complete goal file
pub fn parse_goals(source: &str) -> ParsedGoals {
    let mut parser = MarkupParser::new(source);
    let mut goals = Vec::new();
    match read_document(&mut parser, &mut goals) {
        Ok(()) => ParsedGoals {
            goals,
            error: None,
            unread: String::new(),
        },
        Err(e) => ParsedGoals {
            goals,
            error: Some(e),
            unread: parser.take_rest(),
        },
    }
}

/// Parse the raw bytes of a goal file.
///
/// Text past the first invalid UTF-8 sequence is never decoded. Records
/// complete before it are kept and the error points at its line, unless
/// the markup already failed earlier.
pub fn parse_goal_bytes(bytes: &[u8]) -> ParsedGoals {
    let valid = match std::str::from_utf8(bytes) {
        Ok(source) => return parse_goals(source),
        Err(e) => e.valid_up_to(),
    };
    let head = String::from_utf8_lossy(&bytes[..valid]);
    let line = head.matches('\n').count() + 1;
    let mut parsed = parse_goals(&head);

    match parsed.error {
        Some(ref e) if e.line() < line => {
            parsed.unread.push_str(&String::from_utf8_lossy(&bytes[valid..]));
        }
        _ => {
            let line_start = head.rfind('\n').map_or(0, |i| i + 1);
            parsed.error = Some(FormatError::InvalidEncoding { line });
            parsed.unread = String::from_utf8_lossy(&bytes[line_start..]).into_owned();
        }
    }
    parsed
}

fn read_document(parser: &mut MarkupParser, goals: &mut Vec<Goal>) -> Result<(), FormatError> {
    parser.read_header()?;
    parser.expect_open(ROOT_LABEL)?;
    loop {
        match parser.read_label()? {
            Label::Close(name) if name == ROOT_LABEL => return Ok(()),
            Label::Open(name) if name == GOAL_LABEL => goals.push(read_goal(parser)?),
            other => {
                return Err(FormatError::UnexpectedLabel {
                    line: parser.label_line(),
                    expected: GOAL_LABEL.to_string(),
                    found: other.to_string(),
                });
            }
        }
    }
}

/// Decode the body of one `<goal>` block, whose opening tag has already
/// been read, up to and including `</goal>`. Leaves may come in any order;
/// missing ones keep their defaults.
pub fn read_goal(parser: &mut MarkupParser) -> Result<Goal, FormatError> {
    let mut goal = Goal::default();
    loop {
        let label = parser.read_label()?;
        let line = parser.label_line();
        let field = match label {
            Label::Close(name) if name == GOAL_LABEL => return Ok(goal),
            close @ Label::Close(_) => {
                return Err(FormatError::MismatchedClose {
                    line,
                    expected: GOAL_LABEL.to_string(),
                    found: close.to_string(),
                });
            }
            Label::Open(field) => field,
        };

        let value_line = parser.line();
        match field.as_str() {
            NAME => goal.name = parser.finish_leaf(NAME)?,
            PRIORITY => {
                let priority: i32 = parse_leaf(parser, PRIORITY)?;
                check_value(PERCENT_RANGE.contains(&priority), value_line, PRIORITY, priority)?;
                goal.priority = priority;
            }
            COMPLETION => {
                let completion: i32 = parse_leaf(parser, COMPLETION)?;
                check_value(
                    PERCENT_RANGE.contains(&completion),
                    value_line,
                    COMPLETION,
                    completion,
                )?;
                goal.completion = completion;
            }
            UNIT_COST => {
                let cost: f64 = parse_leaf(parser, UNIT_COST)?;
                check_value(cost.is_finite() && cost >= 0.0, value_line, UNIT_COST, cost)?;
                goal.unit_cost = cost;
            }
            _ => return Err(FormatError::UnknownField { line, label: field }),
        }
    }
}

/// Read the text of leaf `label` and parse it as a number
pub fn parse_leaf<T: FromStr>(parser: &mut MarkupParser, label: &str) -> Result<T, FormatError> {
    let line = parser.line();
    let text = parser.finish_leaf(label)?;
    text.trim().parse().map_err(|_| FormatError::BadValue {
        line,
        field: label.to_string(),
        text,
    })
}

fn check_value(ok: bool, line: usize, field: &str, value: impl ToString) -> Result<(), FormatError> {
    if ok {
        Ok(())
    } else {
        Err(FormatError::BadValue {
            line,
            field: field.to_string(),
            text: value.to_string(),
        })
    }
}

/// Write one `<goal>` block
pub fn write_goal<W: Write>(writer: &mut MarkupWriter<W>, goal: &Goal) -> Result<(), WriteError> {
    writer.open_label(GOAL_LABEL, true)?;
    writer.write_leaf(NAME, &goal.name)?;
    writer.write_leaf(PRIORITY, &goal.priority.to_string())?;
    writer.write_leaf(COMPLETION, &goal.completion.to_string())?;
    writer.write_leaf(UNIT_COST, &goal.unit_cost.to_string())?;
    writer.close_label()
}

/// Serialize goals into a complete goal file
pub fn serialize_goals<'a, I>(goals: I) -> Result<String, WriteError>
where
    I: IntoIterator<Item = &'a Goal>,
{
    let mut writer = MarkupWriter::new(Vec::new());
    writer.write_header()?;
    writer.open_label(ROOT_LABEL, true)?;
    for goal in goals {
        write_goal(&mut writer, goal)?;
    }
    writer.close_label()?;
    let bytes = writer.finish()?;
    // Only &str input ever reaches the buffer
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<goalkeeper>
\t<!-- sample goals -->
\t<goal>
\t\t<name>Sample goal</name>
\t\t<priority>100</priority>
\t\t<completion>50</completion>
\t\t<unitcost>0.01</unitcost>
\t</goal>
\t<goal>
\t\t<unitcost>0.1</unitcost>
\t\t<name>Create Goals app</name>
\t\t<completion>10</completion>
\t\t<priority>100</priority>
\t</goal>
</goalkeeper>
";

    #[test]
    fn test_parse_sample() {
        let parsed = parse_goals(SAMPLE);
        assert_eq!(parsed.error, None);
        assert_eq!(
            parsed.goals,
            vec![
                Goal::new("Sample goal", 100, 50, 0.01),
                Goal::new("Create Goals app", 100, 10, 0.1),
            ]
        );
    }

    #[test]
    fn test_serialize_layout() {
        let out = serialize_goals(&[Goal::new("Sample goal", 100, 50, 0.01)]).unwrap();
        assert_eq!(
            out,
            "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<goalkeeper>
\t<goal>
\t\t<name>Sample goal</name>
\t\t<priority>100</priority>
\t\t<completion>50</completion>
\t\t<unitcost>0.01</unitcost>
\t</goal>
</goalkeeper>
"
        );
    }

    #[test]
    fn test_serialize_then_parse() {
        let goals = vec![
            Goal::new("Learn Rust", 90, 35, 1.5),
            Goal::new("Ship it", 0, 100, 0.0),
            Goal::new("  padded name  ", 55, 5, 1e-7),
        ];
        let parsed = parse_goals(&serialize_goals(&goals).unwrap());
        assert_eq!(parsed.error, None);
        assert_eq!(parsed.goals, goals);
    }

    #[test]
    fn test_empty_file_body() {
        let parsed = parse_goals("<?xml version=\"1.0\"?>\n<goalkeeper>\n</goalkeeper>\n");
        assert!(parsed.goals.is_empty());
        assert_eq!(parsed.error, None);
    }

    #[test]
    fn test_unknown_field() {
        let source = SAMPLE.replace("<completion>50</completion>", "<done>50</done>");
        let parsed = parse_goals(&source);
        assert!(parsed.goals.is_empty());
        assert_eq!(
            parsed.error,
            Some(FormatError::UnknownField {
                line: 7,
                label: "done".into()
            })
        );
    }

    #[test]
    fn test_mismatched_leaf_close() {
        let source = SAMPLE.replace("<priority>100</priority>", "<priority>100</completion>");
        let parsed = parse_goals(&source);
        assert!(matches!(
            parsed.error,
            Some(FormatError::MismatchedClose { line: 6, .. })
        ));
    }

    #[test]
    fn test_non_numeric_value_keeps_earlier_records() {
        let source = SAMPLE.replace("<completion>10</completion>", "<completion>ten</completion>");
        let parsed = parse_goals(&source);
        assert_eq!(parsed.goals.len(), 1);
        assert_eq!(
            parsed.error,
            Some(FormatError::BadValue {
                line: 13,
                field: "completion".into(),
                text: "ten".into()
            })
        );
        assert!(parsed.unread.contains("</goalkeeper>"));
    }

    #[test]
    fn test_non_finite_cost_rejected() {
        let source = SAMPLE.replace("<unitcost>0.01</unitcost>", "<unitcost>NaN</unitcost>");
        let parsed = parse_goals(&source);
        assert!(parsed.goals.is_empty());
        assert!(matches!(parsed.error, Some(FormatError::BadValue { .. })));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let source = SAMPLE.replacen("<priority>100</priority>", "<priority>500</priority>", 1);
        let parsed = parse_goals(&source);
        assert!(parsed.goals.is_empty());
        assert_eq!(
            parsed.error,
            Some(FormatError::BadValue {
                line: 6,
                field: "priority".into(),
                text: "500".into()
            })
        );

        let source = SAMPLE.replace("<completion>10</completion>", "<completion>-5</completion>");
        let parsed = parse_goals(&source);
        assert_eq!(parsed.goals.len(), 1);
        assert!(matches!(
            parsed.error,
            Some(FormatError::BadValue { line: 13, ref field, .. }) if field == "completion"
        ));

        let source = SAMPLE.replace("<unitcost>0.01</unitcost>", "<unitcost>-3</unitcost>");
        let parsed = parse_goals(&source);
        assert!(parsed.goals.is_empty());
        assert!(matches!(
            parsed.error,
            Some(FormatError::BadValue { line: 8, ref field, .. }) if field == "unitcost"
        ));
    }

    #[test]
    fn test_invalid_utf8_keeps_records_before_it() {
        let source = SAMPLE.replace("Create Goals app", "Caf\u{e9} goal");
        let mut bytes = source.into_bytes();
        // Latin-1 é where UTF-8 expects a two-byte sequence
        let at = bytes.iter().position(|&b| b == 0xC3).unwrap();
        bytes[at] = 0xE9;
        bytes.remove(at + 1);

        let parsed = parse_goal_bytes(&bytes);
        assert_eq!(parsed.goals, vec![Goal::new("Sample goal", 100, 50, 0.01)]);
        assert_eq!(parsed.error, Some(FormatError::InvalidEncoding { line: 12 }));
        assert!(parsed.unread.starts_with("\t\t<name>Caf\u{fffd} goal</name>"));
        assert!(parsed.unread.ends_with("</goalkeeper>\n"));
    }

    #[test]
    fn test_earlier_markup_error_wins_over_encoding() {
        let source = SAMPLE.replace("<completion>50</completion>", "<done>50</done>");
        let mut bytes = source.into_bytes();
        let at = bytes.len() - "</goalkeeper>\n".len();
        bytes.insert(at, 0xFF);

        let parsed = parse_goal_bytes(&bytes);
        assert!(parsed.goals.is_empty());
        assert!(matches!(
            parsed.error,
            Some(FormatError::UnknownField { line: 7, .. })
        ));
        assert!(parsed.unread.contains("Create Goals app"));
    }

    #[test]
    fn test_valid_bytes_parse_like_text() {
        let parsed = parse_goal_bytes(SAMPLE.as_bytes());
        assert_eq!(parsed.error, None);
        assert_eq!(parsed.goals.len(), 2);
    }

    #[test]
    fn test_second_block_never_closes() {
        let source = "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<goalkeeper>
\t<goal>
\t\t<name>first</name>
\t</goal>
\t<goal>
\t\t<name>second</name>
</goalkeeper>
";
        let parsed = parse_goals(source);
        assert_eq!(parsed.goals, vec![Goal::new("first", 0, 0, 0.0)]);
        assert!(matches!(
            parsed.error,
            Some(FormatError::MismatchedClose { line: 8, .. })
        ));
    }

    #[test]
    fn test_foreign_block_label() {
        let source = SAMPLE.replacen("<goal>", "<task>", 1);
        let parsed = parse_goals(&source);
        assert!(parsed.goals.is_empty());
        assert!(matches!(
            parsed.error,
            Some(FormatError::UnexpectedLabel { line: 4, .. })
        ));
    }

    #[test]
    fn test_truncated_file() {
        let cut = SAMPLE.find("\t<goal>\n\t\t<unitcost>").unwrap();
        let parsed = parse_goals(&SAMPLE[..cut]);
        assert_eq!(parsed.goals.len(), 1);
        assert!(matches!(parsed.error, Some(FormatError::MissingTag { .. })));
    }
}
