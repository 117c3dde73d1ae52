use std::collections::HashMap;

use serde::Serialize;

use crate::parse::parse_goal_bytes;

/// Structured result from `gk check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    /// Records that a load would keep
    pub records: usize,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// Something that stops a load part way.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// The markup is malformed; loading stops here
    #[serde(rename = "malformed")]
    Malformed {
        line: usize,
        message: String,
        /// Records decoded before the error
        before: usize,
    },
}

/// A record a load would silently drop.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Later records with the same name are dropped
    #[serde(rename = "duplicate_name")]
    DuplicateName { name: String, position: usize },
    #[serde(rename = "empty_name")]
    EmptyName { position: usize },
}

/// Validate the contents of a goal file without touching any store.
/// Positions are 1-based, in file order.
pub fn check_goals(source: &[u8]) -> CheckResult {
    let parsed = parse_goal_bytes(source);
    let mut result = CheckResult::default();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (i, goal) in parsed.goals.iter().enumerate() {
        let position = i + 1;
        if goal.name.is_empty() {
            result.warnings.push(CheckWarning::EmptyName { position });
        } else if seen.insert(&goal.name, position).is_some() {
            result.warnings.push(CheckWarning::DuplicateName {
                name: goal.name.clone(),
                position,
            });
        } else {
            result.records += 1;
        }
    }

    if let Some(e) = parsed.error {
        result.errors.push(CheckError::Malformed {
            line: e.line(),
            message: e.to_string(),
            before: parsed.goals.len(),
        });
    }

    result.valid = result.errors.is_empty();
    result
}
