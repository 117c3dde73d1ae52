use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::util::unicode::{align_right, fit_to_cells};

/// Width of the name column in listings
pub const NAME_WIDTH: usize = 40;

/// Allowed priority and completion values
pub const PERCENT_RANGE: RangeInclusive<i32> = 0..=100;

/// A tracked goal
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Goal {
    /// Unique among live goals, never empty
    pub name: String,
    /// 0–100
    pub priority: i32,
    /// Percent complete, 0–100
    pub completion: i32,
    /// Hours per 1% of completion, never negative
    pub unit_cost: f64,
}

impl Goal {
    pub fn new(name: impl Into<String>, priority: i32, completion: i32, unit_cost: f64) -> Self {
        Goal {
            name: name.into(),
            priority,
            completion,
            unit_cost,
        }
    }

    /// Hours still needed to reach 100%
    pub fn remaining_cost(&self) -> f64 {
        f64::from((100 - self.completion).max(0)) * self.unit_cost
    }
}

/// One listing row: name right-aligned in 40 cells, then priority,
/// completion and unit cost.
impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = align_right(&fit_to_cells(&self.name, NAME_WIDTH), NAME_WIDTH);
        write!(
            f,
            "{}{:>9}{:>12}{:7}{}",
            name,
            self.priority,
            self.completion,
            "",
            self.unit_cost
        )
    }
}
