use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::goal::Goal;

/// Filter applied to live goals. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Regular expression matched anywhere in the name; empty matches all
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub completion: Option<i32>,
    #[serde(default)]
    pub unit_cost: Option<f64>,
}

impl SearchCriteria {
    /// Build criteria from sentinel-style values: a negative number means
    /// "ignore this field".
    pub fn from_sentinels(name: &str, priority: i32, completion: i32, unit_cost: f64) -> Self {
        SearchCriteria {
            name: name.to_string(),
            priority: (priority >= 0).then_some(priority),
            completion: (completion >= 0).then_some(completion),
            unit_cost: (unit_cost >= 0.0).then_some(unit_cost),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.priority.is_none()
            && self.completion.is_none()
            && self.unit_cost.is_none()
    }
}

#[derive(Debug, Clone)]
enum NameMatcher {
    Any,
    Pattern(Regex),
    /// Used when the pattern is not a valid regex
    Literal(String),
}

/// Search criteria with the name pattern compiled once
#[derive(Debug, Clone)]
pub struct SearchMatcher {
    criteria: SearchCriteria,
    name: NameMatcher,
}

impl SearchMatcher {
    pub fn new(criteria: SearchCriteria) -> Self {
        let name = if criteria.name.is_empty() {
            NameMatcher::Any
        } else {
            match Regex::new(&criteria.name) {
                Ok(re) => NameMatcher::Pattern(re),
                Err(_) => NameMatcher::Literal(criteria.name.clone()),
            }
        };
        SearchMatcher { criteria, name }
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn matches(&self, goal: &Goal) -> bool {
        let name_ok = match &self.name {
            NameMatcher::Any => true,
            NameMatcher::Pattern(re) => re.is_match(&goal.name),
            NameMatcher::Literal(text) => goal.name.contains(text.as_str()),
        };
        name_ok
            && self.criteria.priority.is_none_or(|p| p == goal.priority)
            && self.criteria.completion.is_none_or(|c| c == goal.completion)
            && self.criteria.unit_cost.is_none_or(|u| u == goal.unit_cost)
    }
}

impl Default for SearchMatcher {
    fn default() -> Self {
        SearchMatcher::new(SearchCriteria::default())
    }
}
