//! Group display name -> group id bookkeeping for one run.

use crate::nerdgraph::GroupSummary;
use std::collections::HashMap;

/// Maps group display names to server-assigned ids.
///
/// The first id recorded for a name is kept; later records for the same name
/// are ignored. Lookups are exact and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    ids: HashMap<String, String>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with groups that already exist in a domain.
    pub fn seeded<I: IntoIterator<Item = GroupSummary>>(groups: I) -> Self {
        let mut table = Self::new();
        for group in groups {
            table.record(&group.display_name, &group.id);
        }
        table
    }

    pub fn get(&self, display_name: &str) -> Option<&str> {
        self.ids.get(display_name).map(String::as_str)
    }

    pub fn contains(&self, display_name: &str) -> bool {
        self.ids.contains_key(display_name)
    }

    /// Record `id` for `display_name`. Returns false if the name was already known.
    pub fn record(&mut self, display_name: &str, id: &str) -> bool {
        if self.ids.contains_key(display_name) {
            return false;
        }
        self.ids.insert(display_name.to_string(), id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
