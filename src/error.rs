use thiserror::Error;

use crate::category::Category;

/// Errors returned by `reload` and source loading
///
/// Each error concerns a single category; other categories are unaffected.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The runtime category is only mutated through add/remove
    #[error("the runtime category cannot be reloaded")]
    RuntimeCategory,

    /// Category would exceed the configured entry cap; previous entries kept
    #[error("too many entries for {category}: {count} > {max}")]
    TooManyEntries {
        /// Category being loaded
        category: Category,
        /// Entries parsed from the source
        count: usize,
        /// Configured cap
        max: usize,
    },

    /// Source exists but could not be read
    #[error("failed to read {category} dictionary: {source}")]
    Unreadable {
        /// Category being loaded
        category: Category,
        /// Underlying read failure
        source: SourceError,
    },
}

/// Failures of a dictionary source other than absence
#[derive(Debug, Error)]
pub enum SourceError {
    /// Path escapes the configured base directory
    #[error("path {0} is outside the dictionary directory")]
    OutsideBaseDir(String),

    /// Extension is not on the allow-list
    #[error("extension of {0} is not allowed")]
    DisallowedExtension(String),

    /// File exceeds the size limit
    #[error("{path} is {size} bytes, limit is {max}")]
    TooLarge {
        /// Offending path
        path: String,
        /// Actual size
        size: u64,
        /// Configured limit
        max: u64,
    },

    /// Content is not valid UTF-8
    #[error("{0} is not valid UTF-8")]
    Encoding(String),

    /// Any other I/O failure (permissions, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for load operations
pub type LoadResult<T> = Result<T, LoadError>;
