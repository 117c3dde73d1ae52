use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};

use crate::model::goal::{Goal, PERCENT_RANGE};
use crate::model::options::UserOptions;
use crate::ops::search::SearchMatcher;
use crate::ops::sort::SortPreference;

/// Error type for rejected store mutations. The store is unchanged when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("goal name must not be empty")]
    EmptyName,
    #[error("a goal named {0:?} already exists")]
    DuplicateName(String),
    #[error("goal name may not contain '<', '>' or line breaks: {0:?}")]
    IllegalName(String),
    #[error("unit cost must be a finite number, got {0}")]
    NonFiniteCost(f64),
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("no goal at position {slot}; {len} shown")]
    SlotOutOfRange { slot: usize, len: usize },
}

/// Arena slot. Dead entries stay in place so indices never shift.
#[derive(Debug, Clone)]
struct Entry {
    goal: Goal,
    live: bool,
}

/// In-memory goal records plus the views derived from them.
///
/// Records live in an index-stable arena; deletion only clears the
/// liveness flag. Three views sit on top:
///
/// - active: live arena entries
/// - search: active entries matching the current [`SearchMatcher`]
/// - sorted: search entries in display order
///
/// Display positions ("slots") handed out by [`GoalStore::visible`] index
/// the sorted view. The search and sorted views are rebuilt lazily by
/// [`refresh_search`](GoalStore::refresh_search) and
/// [`refresh_sort`](GoalStore::refresh_sort) when the matching version
/// counter in [`UserOptions`] has moved past the store's bookmark, or a
/// mutation forced a rebuild.
#[derive(Debug, Default)]
pub struct GoalStore {
    entries: Vec<Entry>,
    /// Live name → arena index
    names: HashMap<String, usize>,
    live_count: usize,
    search_hits: BTreeSet<usize>,
    sorted: Vec<usize>,

    search: SearchMatcher,
    sort: SortPreference,
    searched_at: Option<u64>,
    sorted_at: Option<u64>,
    force_search: bool,
    force_sort: bool,

    dirty: bool,
}

impl GoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record and view. The search and sort settings survive but
    /// both views are due for a rebuild.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.names.clear();
        self.live_count = 0;
        self.search_hits.clear();
        self.sorted.clear();
        self.force_search = true;
        self.force_sort = true;
        self.dirty = false;
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a goal. Returns its arena index.
    pub fn insert(&mut self, goal: Goal) -> Result<usize, StoreError> {
        validate(&goal)?;
        if self.names.contains_key(&goal.name) {
            return Err(StoreError::DuplicateName(goal.name));
        }

        let idx = self.entries.len();
        if self.search.matches(&goal) {
            self.search_hits.insert(idx);
        }
        self.names.insert(goal.name.clone(), idx);
        self.entries.push(Entry { goal, live: true });
        self.live_count += 1;
        self.dirty = true;
        self.force_sort = true;
        Ok(idx)
    }

    /// Soft-delete the goal shown at `slot`, returning a copy of it.
    ///
    /// The sorted view loses just that slot; nothing is rebuilt.
    pub fn delete(&mut self, slot: usize) -> Result<Goal, StoreError> {
        let idx = self.resolve(slot)?;
        let entry = &mut self.entries[idx];
        entry.live = false;
        self.names.remove(&entry.goal.name);
        self.live_count -= 1;
        self.search_hits.remove(&idx);
        self.sorted.remove(slot);
        self.dirty = true;
        Ok(entry.goal.clone())
    }

    /// Replace the goal shown at `slot` in place.
    pub fn modify(&mut self, slot: usize, goal: Goal) -> Result<(), StoreError> {
        let idx = self.resolve(slot)?;
        validate(&goal)?;
        if let Some(&other) = self.names.get(&goal.name)
            && other != idx
        {
            return Err(StoreError::DuplicateName(goal.name));
        }

        let old_name = std::mem::take(&mut self.entries[idx].goal.name);
        if old_name != goal.name {
            self.names.remove(&old_name);
            self.names.insert(goal.name.clone(), idx);
        }
        if !self.search.matches(&goal) {
            self.search_hits.remove(&idx);
            self.sorted.remove(slot);
        }
        self.entries[idx].goal = goal;
        self.dirty = true;
        self.force_sort = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Arena index and goal shown at `slot`
    pub fn get(&self, slot: usize) -> Option<(usize, &Goal)> {
        let idx = *self.sorted.get(slot)?;
        Some((idx, &self.entries[idx].goal))
    }

    /// Whether `slot` is a valid display position
    pub fn check_slot(&self, slot: usize) -> bool {
        slot < self.sorted.len()
    }

    /// Arena index of the live goal with this name
    pub fn find_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Goal at an arena index, live or not
    pub fn raw(&self, idx: usize) -> Option<&Goal> {
        self.entries.get(idx).map(|e| &e.goal)
    }

    pub fn is_live(&self, idx: usize) -> bool {
        self.entries.get(idx).is_some_and(|e| e.live)
    }

    /// Live goals in arena (insertion) order
    pub fn active(&self) -> impl Iterator<Item = (usize, &Goal)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.live)
            .map(|(i, e)| (i, &e.goal))
    }

    /// Arena indices of the current search result, ascending
    pub fn search_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.search_hits.iter().copied()
    }

    /// Arena indices in display order
    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted
    }

    /// Goals in display order
    pub fn visible(&self) -> impl Iterator<Item = &Goal> {
        self.sorted.iter().map(|&i| &self.entries[i].goal)
    }

    /// Arena size, dead entries included
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn active_count(&self) -> usize {
        self.live_count
    }

    pub fn search_count(&self) -> usize {
        self.search_hits.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called after the records have been written out
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn sort_preference(&self) -> &SortPreference {
        &self.sort
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Rebuild the search view if the criteria changed or a rebuild was
    /// forced. Returns whether anything was rebuilt.
    pub fn refresh_search(&mut self, options: &UserOptions) -> bool {
        if !self.force_search && self.searched_at == Some(options.search_version()) {
            return false;
        }
        if self.search.criteria() != options.search_criteria() {
            self.search = SearchMatcher::new(options.search_criteria().clone());
        }
        self.search_hits = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.live && self.search.matches(&e.goal))
            .map(|(i, _)| i)
            .collect();
        self.searched_at = Some(options.search_version());
        self.force_search = false;
        // A new result set always needs ordering
        self.force_sort = true;
        tracing::debug!(hits = self.search_hits.len(), "search view rebuilt");
        true
    }

    /// Rebuild the sorted view if the preference changed or a rebuild was
    /// forced. Returns whether anything was rebuilt.
    pub fn refresh_sort(&mut self, options: &UserOptions) -> bool {
        if !self.force_sort && self.sorted_at == Some(options.sort_version()) {
            return false;
        }
        self.sort = options.sort_prefs().clone();
        let entries = &self.entries;
        let mut sorted: Vec<usize> = self.search_hits.iter().copied().collect();
        sorted.sort_by(|&a, &b| {
            self.sort
                .compare_entries((a, &entries[a].goal), (b, &entries[b].goal))
        });
        self.sorted = sorted;
        self.sorted_at = Some(options.sort_version());
        self.force_sort = false;
        tracing::debug!(prefs = %self.sort, rows = self.sorted.len(), "sorted view rebuilt");
        true
    }

    /// Bring both views up to date: search first, then sort.
    pub fn refresh(&mut self, options: &UserOptions) {
        self.refresh_search(options);
        self.refresh_sort(options);
    }

    /// Write up to `count` rows of the sorted view starting at `start`.
    ///
    /// Returns the slot to continue from, or 0 once the end was reached.
    /// With `numbered`, each row is prefixed by its 1-based slot.
    pub fn print_range<W: Write>(
        &self,
        out: &mut W,
        start: usize,
        count: usize,
        numbered: bool,
    ) -> io::Result<usize> {
        let end = start.saturating_add(count).min(self.sorted.len());
        for slot in start..end {
            let goal = &self.entries[self.sorted[slot]].goal;
            if numbered {
                write!(out, "{:>4} ", slot + 1)?;
            }
            writeln!(out, "{}", goal)?;
        }
        Ok(if end < self.sorted.len() { end } else { 0 })
    }

    fn resolve(&self, slot: usize) -> Result<usize, StoreError> {
        self.sorted
            .get(slot)
            .copied()
            .ok_or(StoreError::SlotOutOfRange {
                slot,
                len: self.sorted.len(),
            })
    }
}

/// A stored goal must survive a save/load cycle: a non-empty name the
/// markup can carry, percentages within 0..=100 and a finite cost that is
/// not negative.
fn validate(goal: &Goal) -> Result<(), StoreError> {
    if goal.name.is_empty() {
        return Err(StoreError::EmptyName);
    }
    if goal.name.contains(['<', '>', '\n', '\r']) {
        return Err(StoreError::IllegalName(goal.name.clone()));
    }
    if !goal.unit_cost.is_finite() {
        return Err(StoreError::NonFiniteCost(goal.unit_cost));
    }
    if !PERCENT_RANGE.contains(&goal.priority) {
        return Err(out_of_range("priority", PERCENT_EXPECTED, goal.priority));
    }
    if !PERCENT_RANGE.contains(&goal.completion) {
        return Err(out_of_range("completion", PERCENT_EXPECTED, goal.completion));
    }
    if goal.unit_cost < 0.0 {
        return Err(out_of_range("unit cost", COST_EXPECTED, goal.unit_cost));
    }
    Ok(())
}

const PERCENT_EXPECTED: &str = "between 0 and 100";
const COST_EXPECTED: &str = "zero or more";

fn out_of_range(field: &'static str, expected: &'static str, value: impl ToString) -> StoreError {
    StoreError::OutOfRange {
        field,
        expected,
        value: value.to_string(),
    }
}
