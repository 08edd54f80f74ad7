//! Two-phase text substitution
//!
//! Regex rules run first, each on a bounded worker with its own timeout and
//! all of them under one overall budget. Literal entries run second, in
//! descending priority order, each capped at a fixed number of substitutions.

use regex::Regex;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::regex_cache::CachedPattern;
use crate::safety::UnsafePattern;
use crate::store::FlatView;
use crate::worker::{WorkerOutcome, WorkerPool};

/// Something the executor left out while still returning text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Input exceeded the length limit and was returned unchanged
    InputTooLong {
        /// Configured limit in chars
        max_chars: usize,
    },
    /// Rule refused by the safety validator or the compiler
    UnsafePattern {
        /// Rule pattern
        pattern: String,
        /// Why it was refused
        reason: UnsafePattern,
    },
    /// Rule did not finish within its timeout
    PatternTimedOut {
        /// Rule pattern
        pattern: String,
    },
    /// No worker could be started for the rule
    WorkerUnavailable {
        /// Rule pattern
        pattern: String,
    },
    /// Worker died while applying the rule
    PatternFailed {
        /// Rule pattern
        pattern: String,
    },
    /// Overall budget ran out before these rules were tried
    BudgetExhausted {
        /// Rules not attempted
        remaining_rules: usize,
    },
}

/// Text produced by `process`, with anything that was skipped on the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Every applicable rule ran
    Complete(String),
    /// Best-effort text; some rules or the whole input were skipped
    Degraded {
        /// Output text
        text: String,
        /// What was skipped
        skipped: Vec<SkipReason>,
    },
}

impl ProcessOutcome {
    fn new(text: String, skipped: Vec<SkipReason>) -> Self {
        if skipped.is_empty() {
            Self::Complete(text)
        } else {
            Self::Degraded { text, skipped }
        }
    }

    /// Output text
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Complete(text) | Self::Degraded { text, .. } => text,
        }
    }

    /// Consumes the outcome, returning the output text
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Complete(text) | Self::Degraded { text, .. } => text,
        }
    }

    /// Skip reasons; empty when complete
    #[must_use]
    pub fn skipped(&self) -> &[SkipReason] {
        match self {
            Self::Complete(_) => &[],
            Self::Degraded { skipped, .. } => skipped,
        }
    }

    /// True if anything was skipped
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Result of one execution, before statistics are folded in
#[derive(Debug)]
pub struct Execution {
    /// Output text and skip reasons
    pub outcome: ProcessOutcome,
    /// Substitutions made by both phases
    pub replacements: u64,
    /// Substitutions per regex rule that matched
    pub pattern_hits: Vec<(String, u64)>,
}

/// Applies one regex rule to a text: `Some((output, count))` when it matched
pub type PatternFn = fn(&Regex, &str, &str) -> Option<(String, u64)>;

/// Applies a [`FlatView`] to text within the configured limits
pub struct Executor<'a> {
    config: &'a EngineConfig,
    workers: &'a WorkerPool,
    apply: PatternFn,
}

impl<'a> Executor<'a> {
    /// Creates an executor borrowing the engine's limits and worker pool
    #[must_use]
    pub const fn new(config: &'a EngineConfig, workers: &'a WorkerPool) -> Self {
        Self {
            config,
            workers,
            apply: apply_pattern,
        }
    }

    /// Replaces the function run on a worker for each regex rule
    #[must_use]
    pub const fn with_pattern_fn(mut self, apply: PatternFn) -> Self {
        self.apply = apply;
        self
    }

    /// Runs both phases over `text`
    ///
    /// `resolve` maps a rule pattern to its cached verdict.
    pub fn run<F>(&self, text: &str, view: &FlatView, resolve: F) -> Execution
    where
        F: FnMut(&str) -> CachedPattern,
    {
        if text.chars().nth(self.config.max_text_chars).is_some() {
            warn!(
                max_chars = self.config.max_text_chars,
                "input too long, returning it unchanged"
            );
            return Execution {
                outcome: ProcessOutcome::Degraded {
                    text: text.to_owned(),
                    skipped: vec![SkipReason::InputTooLong {
                        max_chars: self.config.max_text_chars,
                    }],
                },
                replacements: 0,
                pattern_hits: Vec::new(),
            };
        }

        let mut execution = Execution {
            outcome: ProcessOutcome::Complete(String::new()),
            replacements: 0,
            pattern_hits: Vec::new(),
        };
        let mut skipped = Vec::new();

        let mut output = text.to_owned();
        if !output.is_empty() {
            output = self.pattern_phase(output, view, resolve, &mut execution, &mut skipped);
            output = self.literal_phase(output, view, &mut execution);
        }

        execution.outcome = ProcessOutcome::new(output, skipped);
        execution
    }

    fn pattern_phase<F>(
        &self,
        mut text: String,
        view: &FlatView,
        mut resolve: F,
        execution: &mut Execution,
        skipped: &mut Vec<SkipReason>,
    ) -> String
    where
        F: FnMut(&str) -> CachedPattern,
    {
        let started = Instant::now();
        let budget = self.config.total_budget();
        let rules = view.rules();

        for (index, entry) in rules.iter().enumerate() {
            let elapsed = started.elapsed();
            if elapsed >= budget {
                let remaining_rules = rules.len() - index;
                warn!(remaining_rules, "pattern budget exhausted, skipping the rest");
                skipped.push(SkipReason::BudgetExhausted { remaining_rules });
                break;
            }

            let pattern = entry.original();
            let regex = match resolve(pattern) {
                CachedPattern::Ready(regex) => regex,
                CachedPattern::Rejected(reason) => {
                    skipped.push(SkipReason::UnsafePattern {
                        pattern: pattern.to_owned(),
                        reason,
                    });
                    continue;
                }
            };

            let timeout = self.config.pattern_timeout().min(budget - elapsed);
            let input = text.clone();
            let replacement = entry.replacement().to_owned();
            let apply = self.apply;
            let outcome = self
                .workers
                .run_with_timeout(timeout, move || apply(&regex, &input, &replacement));

            match outcome {
                WorkerOutcome::Completed(Some((replaced, count))) => {
                    debug!(pattern = pattern, count, "regex rule applied");
                    text = replaced;
                    entry.record_usage(count);
                    execution.replacements += count;
                    execution.pattern_hits.push((pattern.to_owned(), count));
                }
                WorkerOutcome::Completed(None) => {}
                WorkerOutcome::TimedOut => {
                    warn!(pattern = pattern, timeout_ms = timeout.as_millis(), "regex rule timed out");
                    skipped.push(SkipReason::PatternTimedOut {
                        pattern: pattern.to_owned(),
                    });
                }
                WorkerOutcome::Unavailable => {
                    warn!(pattern = pattern, "no pattern worker available");
                    skipped.push(SkipReason::WorkerUnavailable {
                        pattern: pattern.to_owned(),
                    });
                }
                WorkerOutcome::Panicked => {
                    warn!(pattern = pattern, "pattern worker failed");
                    skipped.push(SkipReason::PatternFailed {
                        pattern: pattern.to_owned(),
                    });
                }
            }
        }

        text
    }

    fn literal_phase(&self, mut text: String, view: &FlatView, execution: &mut Execution) -> String {
        let cap = self.config.max_replacements_per_key;

        for entry in view.literals() {
            let key = entry.original();
            if !text.contains(key) {
                continue;
            }

            let count = text.matches(key).take(cap).count();
            if count == 0 {
                continue;
            }
            text = text.replacen(key, entry.replacement(), cap);

            let count = count as u64;
            debug!(key = key, count, category = %entry.category(), "hot word replaced");
            entry.record_usage(count);
            execution.replacements += count;
        }

        text
    }
}

/// Replaces every match; `None` when nothing matched
#[must_use]
pub fn apply_pattern(regex: &Regex, input: &str, replacement: &str) -> Option<(String, u64)> {
    let count = regex.find_iter(input).count();
    if count == 0 {
        return None;
    }
    let replaced = regex.replace_all(input, replacement).into_owned();
    Some((replaced, count as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::regex_cache::RegexCache;
    use crate::safety::SafetyLimits;
    use crate::store::DictionaryStore;

    fn view(items: &[(Category, &str, &str)]) -> (DictionaryStore, FlatView) {
        let mut store = DictionaryStore::new();
        for category in Category::LOADABLE {
            let pairs: Vec<(String, String)> = items
                .iter()
                .filter(|(c, _, _)| *c == category)
                .map(|(_, a, b)| ((*a).to_owned(), (*b).to_owned()))
                .collect();
            store.replace(category, pairs);
        }
        for (_, a, b) in items.iter().filter(|(c, _, _)| *c == Category::Runtime) {
            store.insert_runtime((*a).to_owned(), (*b).to_owned());
        }
        let view = store.build_flat_view();
        (store, view)
    }

    fn run_with(config: &EngineConfig, view: &FlatView, text: &str) -> Execution {
        let workers = WorkerPool::new(config.max_pending_workers);
        let mut cache = RegexCache::new(config.regex_cache_capacity, SafetyLimits::from(config));
        Executor::new(config, &workers).run(text, view, |p| cache.get_or_compile(p))
    }

    fn run(view: &FlatView, text: &str) -> Execution {
        run_with(&EngineConfig::default(), view, text)
    }

    /// Sleeps well past the rule timeout for the rule `slow`
    fn stall_on_slow(regex: &Regex, input: &str, replacement: &str) -> Option<(String, u64)> {
        if regex.as_str() == "slow" {
            std::thread::sleep(std::time::Duration::from_millis(500));
        }
        apply_pattern(regex, input, replacement)
    }

    /// Unwinds for the rule `boom`
    fn fail_on_boom(regex: &Regex, input: &str, replacement: &str) -> Option<(String, u64)> {
        assert_ne!(regex.as_str(), "boom", "rule worker failure");
        apply_pattern(regex, input, replacement)
    }

    fn run_with_pattern_fn(
        config: &EngineConfig,
        view: &FlatView,
        text: &str,
        apply: PatternFn,
    ) -> Execution {
        let workers = WorkerPool::new(config.max_pending_workers);
        let mut cache = RegexCache::new(config.regex_cache_capacity, SafetyLimits::from(config));
        Executor::new(config, &workers)
            .with_pattern_fn(apply)
            .run(text, view, |p| cache.get_or_compile(p))
    }

    #[test]
    fn test_literal_replacement() {
        let (_store, view) = view(&[(Category::Primary, "你好", "hello")]);
        let execution = run(&view, "你好世界");
        assert_eq!(execution.outcome, ProcessOutcome::Complete("hello世界".to_owned()));
        assert_eq!(execution.replacements, 1);
    }

    #[test]
    fn test_empty_and_unmatched_input() {
        let (_store, view) = view(&[(Category::Primary, "你好", "hello")]);
        assert_eq!(run(&view, "").outcome.text(), "");
        let execution = run(&view, "nothing here");
        assert_eq!(execution.outcome.text(), "nothing here");
        assert_eq!(execution.replacements, 0);
    }

    #[test]
    fn test_literal_cap_per_key() {
        let (store, view) = view(&[(Category::Primary, "ab", "X")]);
        let text = "ab".repeat(1000);
        let execution = run(&view, &text);

        assert_eq!(execution.replacements, 100);
        assert_eq!(execution.outcome.text().matches('X').count(), 100);
        assert_eq!(execution.outcome.text().matches("ab").count(), 900);
        assert_eq!(store.entries(Category::Primary)[0].usage_count(), 100);
    }

    #[test]
    fn test_oversized_input_returned_unchanged() {
        let (_store, view) = view(&[(Category::Primary, "a", "b")]);
        let text = "a".repeat(10_001);
        let execution = run(&view, &text);

        assert_eq!(execution.outcome.text(), text);
        assert_eq!(
            execution.outcome.skipped(),
            &[SkipReason::InputTooLong { max_chars: 10_000 }]
        );
        assert_eq!(execution.replacements, 0);
    }

    #[test]
    fn test_input_at_limit_is_processed() {
        let (_store, view) = view(&[(Category::Primary, "字", "z")]);
        let text = "字".repeat(10_000);
        let execution = run(&view, &text);
        assert!(!execution.outcome.is_degraded());
        assert!(execution.outcome.text().starts_with('z'));
    }

    #[test]
    fn test_regex_rule_applies_before_literals() {
        let (_store, view) = view(&[
            (Category::Rule, r"(\d+)\s*percent", "${1}%"),
            (Category::Primary, "%", " pct"),
        ]);
        let execution = run(&view, "up 5 percent");

        // literal phase sees the rule's output
        assert_eq!(execution.outcome.text(), "up 5 pct");
        assert_eq!(execution.replacements, 2);
        assert_eq!(
            execution.pattern_hits,
            vec![(r"(\d+)\s*percent".to_owned(), 1)]
        );
    }

    #[test]
    fn test_unsafe_rule_never_applied() {
        let (_store, view) = view(&[(Category::Rule, "(.*)+", "gone")]);
        let execution = run(&view, "anything at all");

        assert_eq!(execution.outcome.text(), "anything at all");
        assert!(matches!(
            execution.outcome.skipped(),
            [SkipReason::UnsafePattern { pattern, .. }] if pattern == "(.*)+"
        ));
    }

    #[test]
    fn test_exhausted_budget_skips_rules() {
        let config = EngineConfig {
            total_budget_ms: 0,
            ..EngineConfig::default()
        };
        let (_store, view) = view(&[(Category::Rule, "a", "b"), (Category::Rule, "c", "d")]);
        let execution = run_with(&config, &view, "ac");

        assert_eq!(execution.outcome.text(), "ac");
        assert_eq!(
            execution.outcome.skipped(),
            &[SkipReason::BudgetExhausted { remaining_rules: 2 }]
        );
    }

    #[test]
    fn test_no_workers_skips_rules_but_keeps_literals() {
        let config = EngineConfig {
            max_pending_workers: 0,
            ..EngineConfig::default()
        };
        let (_store, view) = view(&[(Category::Rule, "a", "b"), (Category::Primary, "c", "d")]);
        let execution = run_with(&config, &view, "ac");

        assert_eq!(execution.outcome.text(), "ad");
        assert_eq!(
            execution.outcome.skipped(),
            &[SkipReason::WorkerUnavailable {
                pattern: "a".to_owned()
            }]
        );
    }

    #[test]
    fn test_runtime_beats_dictionary() {
        let (_store, view) = view(&[
            (Category::Secondary, "key", "secondary"),
            (Category::Runtime, "key", "runtime"),
        ]);
        assert_eq!(run(&view, "a key").outcome.text(), "a runtime");
    }

    #[test]
    fn test_timed_out_rule_is_skipped() {
        let config = EngineConfig {
            pattern_timeout_ms: 50,
            ..EngineConfig::default()
        };
        let (store, view) = view(&[
            (Category::Rule, "slow", "SLOW"),
            (Category::Rule, "fast", "FAST"),
            (Category::Primary, "word", "WORD"),
        ]);
        let started = Instant::now();
        let execution = run_with_pattern_fn(&config, &view, "slow fast word", stall_on_slow);

        assert!(started.elapsed() < std::time::Duration::from_millis(400));
        // the other rule and the literal phase still apply
        assert_eq!(execution.outcome.text(), "slow FAST WORD");
        assert_eq!(
            execution.outcome.skipped(),
            &[SkipReason::PatternTimedOut {
                pattern: "slow".to_owned()
            }]
        );
        assert_eq!(execution.pattern_hits, vec![("fast".to_owned(), 1)]);
        let slow = store
            .entries(Category::Rule)
            .into_iter()
            .find(|e| e.original() == "slow")
            .unwrap();
        assert_eq!(slow.usage_count(), 0);
    }

    #[test]
    fn test_failed_rule_is_skipped() {
        let (_store, view) = view(&[
            (Category::Rule, "boom", "BOOM"),
            (Category::Rule, "fast", "FAST"),
            (Category::Primary, "word", "WORD"),
        ]);
        let execution =
            run_with_pattern_fn(&EngineConfig::default(), &view, "boom fast word", fail_on_boom);

        assert_eq!(execution.outcome.text(), "boom FAST WORD");
        assert_eq!(
            execution.outcome.skipped(),
            &[SkipReason::PatternFailed {
                pattern: "boom".to_owned()
            }]
        );
    }
}
