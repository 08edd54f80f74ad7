use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::safety::{check_pattern, SafetyLimits, UnsafePattern};

/// Upper bound on the compiled program size of a single rule
const COMPILED_SIZE_LIMIT: usize = 1 << 20;

/// Cached verdict for one pattern string
///
/// Rejected patterns keep only the reason, never a matcher.
#[derive(Debug, Clone)]
pub enum CachedPattern {
    /// Passed screening and compiled
    Ready(Regex),
    /// Refused by screening or compilation
    Rejected(UnsafePattern),
}

/// Pattern string → verdict, evicting the oldest insert once full
#[derive(Debug)]
pub struct RegexCache {
    capacity: usize,
    limits: SafetyLimits,
    entries: HashMap<String, CachedPattern>,
    order: VecDeque<String>,
}

impl RegexCache {
    /// Creates an empty cache holding at most `capacity` patterns
    #[must_use]
    pub fn new(capacity: usize, limits: SafetyLimits) -> Self {
        Self {
            capacity,
            limits,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns the cached verdict for `pattern`, screening and compiling on a miss
    pub fn get_or_compile(&mut self, pattern: &str) -> CachedPattern {
        if let Some(cached) = self.entries.get(pattern) {
            return cached.clone();
        }

        let verdict = compile(pattern, &self.limits);
        if let CachedPattern::Rejected(reason) = &verdict {
            warn!(pattern = pattern, reason = %reason, "regex rule disabled");
        }

        if self.capacity > 0 {
            while self.entries.len() >= self.capacity {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                debug!(pattern = %oldest, "evicting regex from cache");
                self.entries.remove(&oldest);
            }
            self.order.push_back(pattern.to_owned());
            self.entries.insert(pattern.to_owned(), verdict.clone());
        }

        verdict
    }

    /// Whether `pattern` currently has a cached verdict
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.entries.contains_key(pattern)
    }

    /// Number of cached patterns
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compile(pattern: &str, limits: &SafetyLimits) -> CachedPattern {
    if let Err(reason) = check_pattern(pattern, limits) {
        return CachedPattern::Rejected(reason);
    }

    match RegexBuilder::new(pattern)
        .size_limit(COMPILED_SIZE_LIMIT)
        .dfa_size_limit(COMPILED_SIZE_LIMIT)
        .build()
    {
        Ok(regex) => CachedPattern::Ready(regex),
        Err(e) => CachedPattern::Rejected(UnsafePattern::Invalid(e.to_string())),
    }
}
