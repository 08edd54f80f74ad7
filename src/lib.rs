//! Hotword Engine - priority-merged text substitution for dictation output
//!
//! Rewrites transcribed text using literal and regex replacement rules drawn
//! from several independently reloadable dictionaries.

/// Categories, priorities and entries
pub mod category;
/// Configuration management
pub mod config;
/// Hot-word engine: the shared owner of all dictionary state
pub mod engine;
/// Load errors
pub mod error;
/// Replacement phases
pub mod executor;
/// Dictionary text parser
pub mod parser;
/// Bounded cache of compiled regex rules
pub mod regex_cache;
/// Regex safety screening
pub mod safety;
/// Dictionary sources (files on disk)
pub mod source;
/// Statistics
pub mod stats;
/// Dictionary store and flat view
pub mod store;
/// Logging setup
pub mod telemetry;
/// Dictionary change polling
pub mod watch;
/// Timed pattern workers
pub mod worker;

pub use category::{Category, Entry};
pub use engine::{HotwordEngine, LoadSummary};
pub use error::{LoadError, SourceError};
pub use executor::{ProcessOutcome, SkipReason};
pub use safety::is_pattern_safe;
pub use stats::StatisticsSnapshot;
