use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::goal::Goal;

/// At most one key per field
pub const MAX_KEYS: usize = 4;

/// Field a goal listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Priority,
    Completion,
    UnitCost,
}

impl SortField {
    /// Letter used in preference strings
    pub fn code(self) -> char {
        match self {
            SortField::Name => 'n',
            SortField::Priority => 'p',
            SortField::Completion => 'c',
            SortField::UnitCost => 'u',
        }
    }

    pub fn from_code(c: char) -> Option<SortField> {
        match c {
            'n' => Some(SortField::Name),
            'p' => Some(SortField::Priority),
            'c' => Some(SortField::Completion),
            'u' => Some(SortField::UnitCost),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Priority => "priority",
            SortField::Completion => "completion",
            SortField::UnitCost => "unit cost",
        }
    }

    fn compare(self, a: &Goal, b: &Goal) -> Ordering {
        match self {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Completion => a.completion.cmp(&b.completion),
            SortField::UnitCost => a.unit_cost.total_cmp(&b.unit_cost),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn code(self) -> char {
        match self {
            Direction::Ascending => 'a',
            Direction::Descending => 'd',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        }
    }

    pub fn from_code(c: char) -> Option<Direction> {
        match c {
            'a' => Some(Direction::Ascending),
            'd' => Some(Direction::Descending),
            _ => None,
        }
    }
}

/// One (field, direction) pair of a sort preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub direction: Direction,
}

impl SortKey {
    pub fn compare(self, a: &Goal, b: &Goal) -> Ordering {
        let ord = self.field.compare(a, b);
        match self.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }
}

/// Error type for rejected preference strings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SortPrefError {
    #[error("sort string must hold field/order pairs, got {0} characters")]
    OddLength(usize),
    #[error("sort string is {0} characters long; at most 8 are allowed")]
    TooLong(usize),
    #[error("sort string may only contain letters, found {0:?}")]
    NonAlphabetic(char),
    #[error("unknown sort field {0:?} (use n, p, c or u)")]
    UnknownField(char),
    #[error("unknown sort order {0:?} (use a or d)")]
    UnknownDirection(char),
    #[error("field {0:?} appears more than once")]
    DuplicateField(char),
}

/// Ordered list of sort keys; the first is the primary key.
///
/// Written as a string of field/order letter pairs, e.g. `napd` for
/// "name ascending, then priority descending". The empty preference keeps
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortPreference {
    keys: Vec<SortKey>,
}

impl SortPreference {
    pub fn new(keys: Vec<SortKey>) -> Result<Self, SortPrefError> {
        let pref = SortPreference { keys };
        // Round through the string form so both constructors validate alike
        pref.to_string().parse()
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Full ordering for two arena entries: the preference keys first, then
    /// the arena index so that ties keep insertion order.
    pub fn compare_entries(&self, a: (usize, &Goal), b: (usize, &Goal)) -> Ordering {
        compare_from(&self.keys, 0, a.1, b.1).then(a.0.cmp(&b.0))
    }
}

/// Compare by `keys[pos..]`. A tie on the key at `pos` defers to the next
/// key; running out of keys means the goals are equal.
pub fn compare_from(keys: &[SortKey], pos: usize, a: &Goal, b: &Goal) -> Ordering {
    let Some(key) = keys.get(pos) else {
        return Ordering::Equal;
    };
    match key.compare(a, b) {
        Ordering::Equal => compare_from(keys, pos + 1, a, b),
        decided => decided,
    }
}

impl FromStr for SortPreference {
    type Err = SortPrefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() > MAX_KEYS * 2 {
            return Err(SortPrefError::TooLong(chars.len()));
        }
        if chars.len() % 2 != 0 {
            return Err(SortPrefError::OddLength(chars.len()));
        }
        if let Some(&c) = chars.iter().find(|c| !c.is_ascii_alphabetic()) {
            return Err(SortPrefError::NonAlphabetic(c));
        }

        let mut keys: Vec<SortKey> = Vec::with_capacity(chars.len() / 2);
        for pair in chars.chunks(2) {
            let f = pair[0].to_ascii_lowercase();
            let d = pair[1].to_ascii_lowercase();
            let field = SortField::from_code(f).ok_or(SortPrefError::UnknownField(f))?;
            let direction = Direction::from_code(d).ok_or(SortPrefError::UnknownDirection(d))?;
            if keys.iter().any(|k| k.field == field) {
                return Err(SortPrefError::DuplicateField(f));
            }
            keys.push(SortKey { field, direction });
        }
        Ok(SortPreference { keys })
    }
}

impl fmt::Display for SortPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.keys {
            write!(f, "{}{}", key.field.code(), key.direction.code())?;
        }
        Ok(())
    }
}
