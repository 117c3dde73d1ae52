pub mod cursor;
pub mod goal_codec;
pub mod markup_parser;
pub mod markup_writer;

pub use goal_codec::{ParsedGoals, parse_goal_bytes, parse_goals, serialize_goals};
pub use markup_parser::{FormatError, Label, MarkupParser};
pub use markup_writer::{MarkupWriter, WriteError};
