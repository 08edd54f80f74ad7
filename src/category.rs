use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Fixed-priority partition of the rule set
///
/// Declaration order is the tie-break among categories sharing a priority,
/// so `Rule` wins over `Runtime` when both hold the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Regex-based rules, applied in the pattern phase
    Rule,
    /// Entries added programmatically; survives reloads of other categories
    Runtime,
    /// Primary-language dictionary
    Primary,
    /// Secondary-language dictionary
    Secondary,
}

impl Category {
    /// All categories in enumeration order
    pub const ALL: [Self; 4] = [Self::Rule, Self::Runtime, Self::Primary, Self::Secondary];

    /// Categories that can be filled by `reload`
    pub const LOADABLE: [Self; 3] = [Self::Rule, Self::Primary, Self::Secondary];

    /// Static priority of this category (higher wins)
    #[must_use]
    pub const fn priority(self) -> u32 {
        match self {
            Self::Rule | Self::Runtime => 100,
            Self::Primary => 50,
            Self::Secondary => 10,
        }
    }

    /// Whether entries of this category are regex patterns
    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(self, Self::Rule)
    }

    /// Stable lowercase name, used in config and logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Runtime => "runtime",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// Categories ordered highest priority first, enumeration order breaking ties
    #[must_use]
    pub fn by_priority() -> [Self; 4] {
        let mut ordered = Self::ALL;
        // sort_by_key is stable, so equal priorities keep declaration order
        ordered.sort_by_key(|c| std::cmp::Reverse(c.priority()));
        ordered
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// One substitution rule
///
/// Shared as `Arc<Entry>` between the dictionary store and the flat view, so
/// usage counts are visible from both.
#[derive(Debug)]
pub struct Entry {
    original: String,
    replacement: String,
    category: Category,
    priority: u32,
    usage_count: AtomicU64,
    created_at: SystemTime,
}

impl Entry {
    /// Creates an entry; its priority is taken from `category`
    #[must_use]
    pub fn new(original: String, replacement: String, category: Category) -> Self {
        Self {
            original,
            replacement,
            category,
            priority: category.priority(),
            usage_count: AtomicU64::new(0),
            created_at: SystemTime::now(),
        }
    }

    /// Lookup key (a literal, or a pattern for `Category::Rule`)
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Substituted text
    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Owning category
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Priority derived from the category at creation
    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    /// Number of substitutions this entry has produced
    #[must_use]
    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    /// Creation time
    #[must_use]
    pub const fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub(crate) fn record_usage(&self, count: u64) {
        self.usage_count.fetch_add(count, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_tiers() {
        assert_eq!(Category::Rule.priority(), Category::Runtime.priority());
        assert!(Category::Runtime.priority() > Category::Primary.priority());
        assert!(Category::Primary.priority() > Category::Secondary.priority());
    }

    #[test]
    fn test_by_priority_keeps_declaration_order_on_ties() {
        assert_eq!(
            Category::by_priority(),
            [
                Category::Rule,
                Category::Runtime,
                Category::Primary,
                Category::Secondary
            ]
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("primary".parse::<Category>(), Ok(Category::Primary));
        assert_eq!(" Rule ".parse::<Category>(), Ok(Category::Rule));
        assert!("tertiary".parse::<Category>().is_err());
    }

    #[test]
    fn test_entry_priority_follows_category() {
        for category in Category::ALL {
            let entry = Entry::new("a".to_owned(), "b".to_owned(), category);
            assert_eq!(entry.priority(), category.priority());
        }
    }

    #[test]
    fn test_usage_count_accumulates() {
        let entry = Entry::new("a".to_owned(), "b".to_owned(), Category::Primary);
        assert_eq!(entry.usage_count(), 0);
        entry.record_usage(3);
        entry.record_usage(2);
        assert_eq!(entry.usage_count(), 5);
    }
}
