//! Per-category dictionaries and the merged flat view

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::category::{Category, Entry};

/// Owns one map per category
///
/// Only the engine mutates this, inside its exclusive section. Readers see
/// the [`FlatView`] built from it.
#[derive(Debug)]
pub struct DictionaryStore {
    categories: HashMap<Category, HashMap<String, Arc<Entry>>>,
}

impl DictionaryStore {
    /// Creates a store with every category empty
    #[must_use]
    pub fn new() -> Self {
        Self {
            categories: Category::ALL
                .into_iter()
                .map(|c| (c, HashMap::new()))
                .collect(),
        }
    }

    /// Replaces the whole map of `category` with `pairs`
    ///
    /// Later duplicates overwrite earlier ones; returns how many did.
    pub fn replace<I>(&mut self, category: Category, pairs: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = HashMap::new();
        let mut duplicates = 0;
        for (original, replacement) in pairs {
            let entry = Arc::new(Entry::new(original.clone(), replacement, category));
            if map.insert(original, entry).is_some() {
                duplicates += 1;
            }
        }
        self.categories.insert(category, map);
        duplicates
    }

    /// Inserts or replaces a runtime entry
    pub fn insert_runtime(&mut self, original: String, replacement: String) {
        let entry = Arc::new(Entry::new(original.clone(), replacement, Category::Runtime));
        self.map_mut(Category::Runtime).insert(original, entry);
    }

    /// Removes a runtime entry, returning whether it existed
    pub fn remove_runtime(&mut self, original: &str) -> bool {
        self.map_mut(Category::Runtime).remove(original).is_some()
    }

    /// Drops every runtime entry, returning how many were removed
    pub fn clear_runtime(&mut self) -> usize {
        let map = self.map_mut(Category::Runtime);
        let count = map.len();
        map.clear();
        count
    }

    /// Number of entries in `category`
    #[must_use]
    pub fn len(&self, category: Category) -> usize {
        self.categories.get(&category).map_or(0, HashMap::len)
    }

    /// Number of entries across all categories (before merging)
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.categories.values().map(HashMap::len).sum()
    }

    /// Entries of `category` in processing order
    #[must_use]
    pub fn entries(&self, category: Category) -> Vec<Arc<Entry>> {
        let mut entries: Vec<_> = self
            .categories
            .get(&category)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        sort_for_processing(&mut entries);
        entries
    }

    /// Merges all categories, highest priority first; the first writer of a key wins
    #[must_use]
    pub fn build_flat_view(&self) -> FlatView {
        let mut map: HashMap<String, Arc<Entry>> = HashMap::new();
        let mut rules = Vec::new();
        let mut literals = Vec::new();

        for category in Category::by_priority() {
            for entry in self.entries(category) {
                if map.contains_key(entry.original()) {
                    continue;
                }
                map.insert(entry.original().to_owned(), Arc::clone(&entry));
                if category.is_pattern() {
                    rules.push(entry);
                } else {
                    literals.push(entry);
                }
            }
        }

        FlatView {
            map,
            rules,
            literals,
        }
    }

    fn map_mut(&mut self, category: Category) -> &mut HashMap<String, Arc<Entry>> {
        self.categories.entry(category).or_default()
    }
}

impl Default for DictionaryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Longer keys first, then lexicographic, so the order is stable
fn sort_for_processing(entries: &mut [Arc<Entry>]) {
    entries.sort_by(|a, b| {
        Reverse(a.original().chars().count())
            .cmp(&Reverse(b.original().chars().count()))
            .then_with(|| a.original().cmp(b.original()))
    });
}

/// Priority-resolved lookup table, rebuilt wholesale on every mutation
#[derive(Debug, Default)]
pub struct FlatView {
    map: HashMap<String, Arc<Entry>>,
    rules: Vec<Arc<Entry>>,
    literals: Vec<Arc<Entry>>,
}

impl FlatView {
    /// Winning entry for `original`
    #[must_use]
    pub fn lookup(&self, original: &str) -> Option<&Arc<Entry>> {
        self.map.get(original)
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no category holds any entry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rule-category winners in processing order
    #[must_use]
    pub fn rules(&self) -> &[Arc<Entry>] {
        &self.rules
    }

    /// Literal winners in descending priority order
    #[must_use]
    pub fn literals(&self) -> &[Arc<Entry>] {
        &self.literals
    }
}
