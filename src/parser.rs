//! Dictionary text parser
//!
//! One rule per line. Blank lines and `#` comments are skipped. Each line is
//! split on the first separator that yields two non-empty fields:
//!
//! ```text
//! # comment
//! 你好	hello
//! github  GitHub
//! 深度 学习 | deep learning
//! k8s = Kubernetes
//! ```

use tracing::warn;

use crate::category::Category;

/// Separators in the order they are tried
const SEPARATORS: &[&str] = &["\t", "  ", " | ", " = ", "|", "="];

const COMMENT_MARKER: char = '#';

/// A line that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number
    pub line_number: usize,
    /// Raw line content (trimmed)
    pub content: String,
}

/// Output of [`parse_dictionary`], in source order
#[derive(Debug, Default)]
pub struct ParsedDictionary {
    /// `(original, replacement)` pairs; later duplicates are kept in order
    pub pairs: Vec<(String, String)>,
    /// Lines with no usable separator
    pub skipped: Vec<SkippedLine>,
}

/// Splits one line into `(original, replacement)`
#[must_use]
pub fn parse_line(line: &str) -> Option<(String, String)> {
    SEPARATORS.iter().find_map(|sep| {
        let mut fields = line.split(sep).map(str::trim).filter(|f| !f.is_empty());
        let original = fields.next()?;
        let replacement = fields.next()?;
        Some((original.to_owned(), replacement.to_owned()))
    })
}

/// Parses raw dictionary content; malformed lines are skipped with a warning
#[must_use]
pub fn parse_dictionary(category: Category, content: &str) -> ParsedDictionary {
    let mut parsed = ParsedDictionary::default();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }

        match parse_line(line) {
            Some(pair) => parsed.pairs.push(pair),
            None => {
                warn!(
                    category = %category,
                    line = index + 1,
                    content = line,
                    "skipping malformed dictionary line"
                );
                parsed.skipped.push(SkippedLine {
                    line_number: index + 1,
                    content: line.to_owned(),
                });
            }
        }
    }

    parsed
}
