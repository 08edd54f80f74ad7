//! Polling for dictionary file changes
//!
//! Modification times are compared on every tick. A file that changes more
//! often than the throttle window is reloaded at most once per window; the
//! pending change is picked up on a later tick.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::config::WatchConfig;
use crate::engine::HotwordEngine;
use crate::source::FileSource;

/// Allows one reload per path per `min_interval`
#[derive(Debug)]
pub struct ReloadThrottle {
    min_interval: Duration,
    last: HashMap<PathBuf, Instant>,
}

impl ReloadThrottle {
    /// Creates a throttle with the given window
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: HashMap::new(),
        }
    }

    /// Returns true and records `now` if `path` may reload
    pub fn allow(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(last) = self.last.get(path) {
            if now.saturating_duration_since(*last) < self.min_interval {
                return false;
            }
        }
        self.last.insert(path.to_path_buf(), now);
        true
    }
}

/// Tracks modification times of the files behind a [`FileSource`]
#[derive(Debug)]
pub struct ChangeWatcher {
    paths: Vec<(Category, PathBuf)>,
    seen: HashMap<Category, Option<SystemTime>>,
    throttle: ReloadThrottle,
}

impl ChangeWatcher {
    /// Records the current state of every configured file as the baseline
    #[must_use]
    pub fn new(source: &FileSource, throttle: Duration) -> Self {
        let paths: Vec<(Category, PathBuf)> = Category::LOADABLE
            .into_iter()
            .filter_map(|c| source.path(c).map(|p| (c, p.to_path_buf())))
            .collect();
        let seen = paths
            .iter()
            .map(|(c, p)| (*c, modified(p)))
            .collect();

        Self {
            paths,
            seen,
            throttle: ReloadThrottle::new(throttle),
        }
    }

    /// Categories whose file appeared, vanished or changed since last reported
    pub fn poll(&mut self, now: Instant) -> Vec<Category> {
        let mut changed = Vec::new();

        for (category, path) in &self.paths {
            let current = modified(path);
            if self.seen.get(category) == Some(&current) {
                continue;
            }
            if !self.throttle.allow(path, now) {
                debug!(path = %path.display(), "change throttled");
                continue;
            }
            self.seen.insert(*category, current);
            changed.push(*category);
        }

        changed
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Polls forever, reloading changed categories into `engine`
pub async fn watch(engine: Arc<HotwordEngine>, source: Arc<FileSource>, config: WatchConfig) {
    let mut watcher = ChangeWatcher::new(&source, Duration::from_millis(config.throttle_ms));
    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));

    info!(poll_ms = config.poll_interval_ms, "dictionary watcher started");

    loop {
        ticker.tick().await;

        for category in watcher.poll(Instant::now()) {
            let engine = Arc::clone(&engine);
            let source = Arc::clone(&source);
            let result =
                tokio::task::spawn_blocking(move || engine.reload_from_source(category, &*source))
                    .await;

            match result {
                Ok(Ok(summary)) => info!(
                    category = %category,
                    loaded = summary.loaded,
                    "dictionary change applied"
                ),
                Ok(Err(e)) => warn!(category = %category, error = %e, "dictionary reload failed"),
                Err(e) => warn!(category = %category, "reload task failed: {}", e),
            }
        }
    }
}
