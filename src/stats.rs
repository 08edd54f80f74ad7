use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use crate::category::Category;

/// Point-in-time copy of the engine's counters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatisticsSnapshot {
    /// Distinct keys in the flat view
    pub total_entries: usize,
    /// Entries held by each category (before merging)
    pub per_category_counts: BTreeMap<Category, usize>,
    /// Substitutions made since the engine was created
    pub total_replacements: u64,
    /// Completion time of the last successful reload
    pub last_reload_time: Option<SystemTime>,
    /// Substitutions made by each regex rule
    pub pattern_replacements: HashMap<String, u64>,
}

/// Mutable counters owned by the engine
#[derive(Debug, Default)]
pub struct Statistics {
    snapshot: StatisticsSnapshot,
}

impl Statistics {
    /// Creates zeroed statistics with every category at 0
    #[must_use]
    pub fn new() -> Self {
        let mut stats = Self::default();
        for category in Category::ALL {
            stats.snapshot.per_category_counts.insert(category, 0);
        }
        stats
    }

    /// Refreshes entry counts after any dictionary mutation
    pub fn set_counts<I>(&mut self, total_entries: usize, per_category: I)
    where
        I: IntoIterator<Item = (Category, usize)>,
    {
        self.snapshot.total_entries = total_entries;
        self.snapshot.per_category_counts.extend(per_category);
    }

    /// Stamps the reload time
    pub fn mark_reloaded(&mut self, at: SystemTime) {
        self.snapshot.last_reload_time = Some(at);
    }

    /// Adds the substitutions of one `process_text` call
    pub fn record_replacements(&mut self, count: u64) {
        self.snapshot.total_replacements = self.snapshot.total_replacements.saturating_add(count);
    }

    /// Adds substitutions made by one regex rule
    pub fn record_pattern(&mut self, pattern: &str, count: u64) {
        let counter = self
            .snapshot
            .pattern_replacements
            .entry(pattern.to_owned())
            .or_insert(0);
        *counter = counter.saturating_add(count);
    }

    /// Consistent copy of all counters
    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_every_category() {
        let snapshot = Statistics::new().snapshot();
        assert_eq!(snapshot.per_category_counts.len(), Category::ALL.len());
        assert!(snapshot.per_category_counts.values().all(|&c| c == 0));
        assert!(snapshot.last_reload_time.is_none());
    }

    #[test]
    fn test_counts_and_replacements() {
        let mut stats = Statistics::new();
        stats.set_counts(3, [(Category::Primary, 2), (Category::Runtime, 1)]);
        stats.record_replacements(4);
        stats.record_replacements(1);
        stats.record_pattern(r"\d+", 2);
        stats.record_pattern(r"\d+", 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_entries, 3);
        assert_eq!(snapshot.per_category_counts[&Category::Primary], 2);
        assert_eq!(snapshot.per_category_counts[&Category::Secondary], 0);
        assert_eq!(snapshot.total_replacements, 5);
        assert_eq!(snapshot.pattern_replacements[r"\d+"], 5);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut stats = Statistics::new();
        let before = stats.snapshot();
        stats.record_replacements(10);
        assert_eq!(before.total_replacements, 0);
        assert_eq!(stats.snapshot().total_replacements, 10);
    }
}
