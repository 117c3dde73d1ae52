use crate::ops::search::SearchCriteria;
use crate::ops::sort::{SortPrefError, SortPreference};

/// User preferences that shape the goal listing.
///
/// The sort preference and search criteria each carry a version counter
/// that advances whenever the value actually changes. A [`GoalStore`]
/// compares those counters against its own bookmarks to decide whether a
/// view has to be rebuilt.
///
/// [`GoalStore`]: crate::model::store::GoalStore
#[derive(Debug, Clone)]
pub struct UserOptions {
    /// Print the summary header and full prompts
    pub verbose: bool,
    /// Split long listings into pages
    pub paging: bool,
    /// Prefix each listed goal with its 1-based slot
    pub show_numbers: bool,
    sort: SortPreference,
    search: SearchCriteria,
    sort_version: u64,
    search_version: u64,
}

impl Default for UserOptions {
    fn default() -> Self {
        UserOptions {
            verbose: true,
            paging: false,
            show_numbers: false,
            sort: SortPreference::default(),
            search: SearchCriteria::default(),
            sort_version: 0,
            search_version: 0,
        }
    }
}

impl UserOptions {
    pub fn sort_prefs(&self) -> &SortPreference {
        &self.sort
    }

    pub fn search_criteria(&self) -> &SearchCriteria {
        &self.search
    }

    pub fn sort_version(&self) -> u64 {
        self.sort_version
    }

    pub fn search_version(&self) -> u64 {
        self.search_version
    }

    /// Validate and apply a preference string such as `napd`.
    /// An invalid string leaves the current preference untouched.
    pub fn set_sort_prefs(&mut self, prefs: &str) -> Result<(), SortPrefError> {
        let parsed: SortPreference = prefs.parse()?;
        self.set_sort_preference(parsed);
        Ok(())
    }

    pub fn set_sort_preference(&mut self, pref: SortPreference) {
        if pref != self.sort {
            self.sort = pref;
            self.sort_version += 1;
        }
    }

    pub fn set_search_criteria(&mut self, criteria: SearchCriteria) {
        if criteria != self.search {
            self.search = criteria;
            self.search_version += 1;
        }
    }
}
