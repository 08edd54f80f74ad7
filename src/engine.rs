use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::category::{Category, Entry};
use crate::config::EngineConfig;
use crate::error::{LoadError, LoadResult};
use crate::executor::{Executor, ProcessOutcome};
use crate::parser::{parse_dictionary, SkippedLine};
use crate::regex_cache::{CachedPattern, RegexCache};
use crate::safety::{check_pattern, SafetyLimits};
use crate::source::DictionarySource;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::store::{DictionaryStore, FlatView};
use crate::worker::WorkerPool;

/// What a successful `reload` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Category that was replaced
    pub category: Category,
    /// Distinct keys now in the category
    pub loaded: usize,
    /// Lines whose key repeated an earlier line (later line kept)
    pub duplicates: usize,
    /// Malformed lines that were ignored
    pub skipped: Vec<SkippedLine>,
}

/// Hot-word substitution engine
///
/// Construct one per application and share it behind an `Arc`. All
/// dictionary mutation and flat-view rebuilding happen under the store lock;
/// readers take an `Arc` of the last published view and never see a partial
/// rebuild.
#[derive(Debug)]
pub struct HotwordEngine {
    config: EngineConfig,
    store: Mutex<DictionaryStore>,
    view: RwLock<Arc<FlatView>>,
    patterns: Mutex<RegexCache>,
    stats: Mutex<Statistics>,
    workers: WorkerPool,
}

impl HotwordEngine {
    /// Creates an engine with empty dictionaries
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let limits = SafetyLimits::from(&config);
        Self {
            store: Mutex::new(DictionaryStore::new()),
            view: RwLock::new(Arc::new(FlatView::default())),
            patterns: Mutex::new(RegexCache::new(config.regex_cache_capacity, limits)),
            stats: Mutex::new(Statistics::new()),
            workers: WorkerPool::new(config.max_pending_workers),
            config,
        }
    }

    /// Limits this engine was built with
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces `category` with the entries parsed from `content`
    ///
    /// Empty content empties the category. Malformed lines are skipped and
    /// reported in the summary. Runtime entries are never touched.
    ///
    /// # Errors
    /// Returns [`LoadError::RuntimeCategory`] for `Category::Runtime` and
    /// [`LoadError::TooManyEntries`] when the entry cap is exceeded; in both
    /// cases the category keeps its previous entries.
    pub fn reload(&self, category: Category, content: &str) -> LoadResult<LoadSummary> {
        if category == Category::Runtime {
            return Err(LoadError::RuntimeCategory);
        }

        let parsed = parse_dictionary(category, content);
        if parsed.pairs.len() > self.config.max_entries_per_category {
            return Err(LoadError::TooManyEntries {
                category,
                count: parsed.pairs.len(),
                max: self.config.max_entries_per_category,
            });
        }

        let (summary, rules) = {
            let mut store = lock(&self.store);
            let duplicates = store.replace(category, parsed.pairs);
            self.publish(&store);
            lock(&self.stats).mark_reloaded(SystemTime::now());

            let summary = LoadSummary {
                category,
                loaded: store.len(category),
                duplicates,
                skipped: parsed.skipped,
            };
            let rules = if category.is_pattern() {
                store.entries(category)
            } else {
                Vec::new()
            };
            (summary, rules)
        };

        if !rules.is_empty() {
            self.prewarm(&rules);
        }

        info!(
            category = %category,
            loaded = summary.loaded,
            duplicates = summary.duplicates,
            skipped = summary.skipped.len(),
            "dictionary reloaded"
        );

        Ok(summary)
    }

    /// Reads `category` from `source` and reloads it
    ///
    /// An absent source counts as empty content.
    ///
    /// # Errors
    /// Returns [`LoadError::Unreadable`] when the source fails for a reason
    /// other than absence, plus any error from [`Self::reload`].
    pub fn reload_from_source<S>(&self, category: Category, source: &S) -> LoadResult<LoadSummary>
    where
        S: DictionarySource + ?Sized,
    {
        let content = source
            .read(category)
            .map_err(|source| LoadError::Unreadable { category, source })?;

        if content.is_none() {
            debug!(category = %category, "no dictionary source, loading empty");
        }

        self.reload(category, content.as_deref().unwrap_or_default())
    }

    /// Loads every loadable category from `source`
    ///
    /// A failing category does not stop the others.
    pub fn load_from_source<S>(&self, source: &S) -> Vec<(Category, LoadResult<LoadSummary>)>
    where
        S: DictionarySource + ?Sized,
    {
        Category::LOADABLE
            .into_iter()
            .map(|category| {
                let result = self.reload_from_source(category, source);
                if let Err(e) = &result {
                    warn!(category = %category, error = %e, "dictionary load failed");
                }
                (category, result)
            })
            .collect()
    }

    /// Adds or replaces a runtime entry; a blank key is ignored
    pub fn add_runtime_entry(&self, original: &str, replacement: &str) {
        let original = original.trim();
        if original.is_empty() {
            warn!("ignoring runtime entry with empty key");
            return;
        }

        let mut store = lock(&self.store);
        store.insert_runtime(original.to_owned(), replacement.to_owned());
        self.publish(&store);
        debug!(original = original, "runtime entry added");
    }

    /// Removes a runtime entry, returning whether it existed
    pub fn remove_runtime_entry(&self, original: &str) -> bool {
        let mut store = lock(&self.store);
        let removed = store.remove_runtime(original.trim());
        if removed {
            self.publish(&store);
            debug!(original = original, "runtime entry removed");
        }
        removed
    }

    /// Removes every runtime entry, returning how many there were
    pub fn clear_runtime_entries(&self) -> usize {
        let mut store = lock(&self.store);
        let removed = store.clear_runtime();
        if removed > 0 {
            self.publish(&store);
        }
        removed
    }

    /// Applies all hot words to `text`; never fails
    #[must_use]
    pub fn process_text(&self, text: &str) -> String {
        self.process(text).into_text()
    }

    /// Applies all hot words to `text`, reporting anything that was skipped
    #[must_use]
    pub fn process(&self, text: &str) -> ProcessOutcome {
        let view = self.current_view();
        let executor = Executor::new(&self.config, &self.workers);
        let execution = executor.run(text, &view, |pattern| self.resolve(pattern));

        if execution.replacements > 0 || !execution.pattern_hits.is_empty() {
            let mut stats = lock(&self.stats);
            stats.record_replacements(execution.replacements);
            for (pattern, count) in &execution.pattern_hits {
                stats.record_pattern(pattern, *count);
            }
        }

        execution.outcome
    }

    /// Consistent copy of the counters
    #[must_use]
    pub fn statistics(&self) -> StatisticsSnapshot {
        lock(&self.stats).snapshot()
    }

    /// Entries of one category in processing order
    #[must_use]
    pub fn entries(&self, category: Category) -> Vec<Arc<Entry>> {
        lock(&self.store).entries(category)
    }

    /// Winning entry for `original` in the flat view
    #[must_use]
    pub fn lookup(&self, original: &str) -> Option<Arc<Entry>> {
        self.current_view().lookup(original).cloned()
    }

    /// Screens `pattern` with this engine's limits
    #[must_use]
    pub fn is_pattern_safe(&self, pattern: &str) -> bool {
        check_pattern(pattern, &SafetyLimits::from(&self.config)).is_ok()
    }

    fn current_view(&self) -> Arc<FlatView> {
        let view = self.view.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*view)
    }

    /// Rebuilds the flat view from `store` and swaps it in; caller holds the store lock
    fn publish(&self, store: &DictionaryStore) {
        let view = Arc::new(store.build_flat_view());
        let total = view.len();
        debug!(
            merged = total,
            shadowed = store.total_len() - total,
            "flat view rebuilt"
        );
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = view;

        lock(&self.stats).set_counts(
            total,
            Category::ALL.into_iter().map(|c| (c, store.len(c))),
        );
    }

    fn resolve(&self, pattern: &str) -> CachedPattern {
        lock(&self.patterns).get_or_compile(pattern)
    }

    fn prewarm(&self, rules: &[Arc<Entry>]) {
        let mut cache = lock(&self.patterns);
        let rejected = rules
            .iter()
            .filter(|e| matches!(cache.get_or_compile(e.original()), CachedPattern::Rejected(_)))
            .count();
        if rejected > 0 {
            warn!(rejected, total = rules.len(), "some regex rules were disabled");
        }
    }
}

impl Default for HotwordEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
