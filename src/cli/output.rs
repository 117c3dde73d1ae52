use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::goal::{Goal, NAME_WIDTH};
use crate::model::options::UserOptions;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct GoalJson {
    /// 1-based position in the listing
    pub slot: usize,
    pub name: String,
    pub priority: i32,
    pub completion: i32,
    pub unit_cost: f64,
    pub remaining_cost: f64,
}

#[derive(Serialize)]
pub struct GoalListJson {
    pub sort: String,
    /// Live goals in the store
    pub total: usize,
    /// Goals matching the filters
    pub matched: usize,
    pub goals: Vec<GoalJson>,
}

#[derive(Serialize)]
pub struct OptionsJson {
    pub verbose: bool,
    pub paging: bool,
    pub numbers: bool,
    pub sort: String,
}

#[derive(Serialize)]
pub struct RecoveryEntryJson {
    pub timestamp: String,
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<(String, String)>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

pub fn goal_to_json(slot: usize, goal: &Goal) -> GoalJson {
    GoalJson {
        slot,
        name: goal.name.clone(),
        priority: goal.priority,
        completion: goal.completion,
        unit_cost: goal.unit_cost,
        remaining_cost: goal.remaining_cost(),
    }
}

pub fn options_to_json(options: &UserOptions) -> OptionsJson {
    OptionsJson {
        verbose: options.verbose,
        paging: options.paging,
        numbers: options.show_numbers,
        sort: options.sort_prefs().to_string(),
    }
}

pub fn recovery_entry_to_json(entry: &RecoveryEntry) -> RecoveryEntryJson {
    RecoveryEntryJson {
        timestamp: entry
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        category: entry.category.to_string(),
        description: entry.description.clone(),
        fields: entry.fields.clone(),
        body: entry.body.clone(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// Width of the row-number prefix written by `GoalStore::print_range`
const NUMBER_WIDTH: usize = 5;

/// Column titles lined up with `Goal`'s row format
pub fn table_header(numbered: bool) -> String {
    let prefix = if numbered {
        format!("{:>4} ", "#")
    } else {
        String::new()
    };
    format!(
        "{}{:>width$}{:>9}{:>12}{:7}{}",
        prefix,
        "Name",
        "Priority",
        "Completion",
        "",
        "Unit cost",
        width = NAME_WIDTH
    )
}

/// Horizontal rule as wide as the header
pub fn table_ruler(numbered: bool) -> String {
    let width = NAME_WIDTH + 9 + 12 + 7 + "Unit cost".len();
    "-".repeat(if numbered { width + NUMBER_WIDTH } else { width })
}

/// Render the sort preference in words, e.g. "priority descending, name ascending"
pub fn describe_sort(options: &UserOptions) -> String {
    let prefs = options.sort_prefs();
    if prefs.is_empty() {
        return "insertion order".to_string();
    }
    prefs
        .keys()
        .iter()
        .map(|k| format!("{} {}", k.field.label(), k.direction.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_matches_row_width() {
        let row = Goal::new("x", 100, 50, 0.25).to_string();
        let header = table_header(false);
        // The completion column ends in the same cell in both
        assert_eq!(
            header.find("Completion").map(|i| i + "Completion".len()),
            Some(NAME_WIDTH + 9 + 12)
        );
        assert_eq!(row.find("50").map(|i| i + 2), Some(NAME_WIDTH + 9 + 12));
        assert_eq!(table_ruler(false).len(), header.len());
        assert_eq!(table_ruler(true).len(), table_header(true).len());
    }

    #[test]
    fn test_describe_sort() {
        let mut opts = UserOptions::default();
        assert_eq!(describe_sort(&opts), "insertion order");
        opts.set_sort_prefs("pdna").unwrap();
        assert_eq!(describe_sort(&opts), "priority descending, name ascending");
    }

    #[test]
    fn test_goal_json() {
        let json = serde_json::to_value(goal_to_json(3, &Goal::new("g", 5, 40, 0.5))).unwrap();
        assert_eq!(json["slot"], 3);
        assert_eq!(json["remaining_cost"], 30.0);
    }
}
