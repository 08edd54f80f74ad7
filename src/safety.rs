//! Heuristic screening of user-supplied regex patterns
//!
//! Rejects the shapes known to cause catastrophic backtracking before a
//! pattern is ever compiled. This is a defense-in-depth filter, not a proof:
//! composite shapes such as `(a|ab)(c|bcd)(d*)` still pass.

use thiserror::Error;

use crate::config::EngineConfig;

/// Substrings rejected outright
const CATASTROPHIC_SHAPES: &[&str] = &[
    "(.*)+", "(.*)*", "(.+)+", "(.+)*", "(a*)*", "(a+)+", "(a*)+", "(a+)*", "(a|a)+",
    "(a|a)*", ".*.*.*.*", ".+.+.+.+",
];

/// Quantifier pairs that never appear in a sane hot-word rule
const ADJACENT_QUANTIFIERS: &[&str] = &["*+", "+*", "?+", "+?"];

/// Consecutive unbounded wildcards (`.*`, `.+`) tolerated before rejecting
const MAX_WILDCARD_RUN: usize = 3;

/// Why a pattern was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsafePattern {
    /// Pattern is longer than the configured maximum
    #[error("pattern is {len} chars, limit is {max}")]
    TooLong {
        /// Actual length in chars
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Pattern contains a known catastrophic shape
    #[error("pattern contains catastrophic shape `{0}`")]
    Blacklisted(&'static str),

    /// A group holding an unbounded quantifier is itself repeated without bound
    #[error("unbounded quantifier nested inside an unbounded repeat")]
    NestedQuantifier,

    /// A repeated group has two identical alternatives
    #[error("repeated group has duplicate alternative `{0}`")]
    RepeatedAlternation(String),

    /// Too many unbounded wildcards in a row
    #[error("{0} consecutive unbounded wildcards")]
    WildcardRun(usize),

    /// Two quantifiers directly adjacent
    #[error("adjacent quantifiers `{0}`")]
    AdjacentQuantifiers(&'static str),

    /// Groups nested deeper than the configured maximum
    #[error("group nesting depth exceeds {max}")]
    TooDeep {
        /// Configured limit
        max: usize,
    },

    /// Passed screening but the regex engine refused it
    #[error("pattern failed to compile: {0}")]
    Invalid(String),
}

/// Limits applied by [`check_pattern`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyLimits {
    /// Longest accepted pattern, in chars
    pub max_length: usize,
    /// Deepest accepted group nesting
    pub max_depth: usize,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for SafetyLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_length: config.max_pattern_length,
            max_depth: config.max_group_depth,
        }
    }
}

/// Returns true if `pattern` passes screening with the default limits
#[must_use]
pub fn is_pattern_safe(pattern: &str) -> bool {
    check_pattern(pattern, &SafetyLimits::default()).is_ok()
}

/// Screens `pattern`, returning the first reason it is unsafe
///
/// # Errors
/// Returns the [`UnsafePattern`] reason when the pattern is rejected
pub fn check_pattern(pattern: &str, limits: &SafetyLimits) -> Result<(), UnsafePattern> {
    let len = pattern.chars().count();
    if len > limits.max_length {
        return Err(UnsafePattern::TooLong {
            len,
            max: limits.max_length,
        });
    }

    if let Some(shape) = CATASTROPHIC_SHAPES.iter().copied().find(|s| pattern.contains(s)) {
        return Err(UnsafePattern::Blacklisted(shape));
    }

    Scanner::new(pattern, limits.max_depth).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Start,
    Atom,
    Wildcard,
    Open,
    Alternation,
    Quantifier(char),
}

/// Open group while scanning
#[derive(Default)]
struct Group {
    has_unbounded: bool,
    alternatives: Vec<String>,
    current: String,
}

impl Group {
    fn duplicate_alternative(&self) -> Option<&str> {
        self.alternatives
            .iter()
            .enumerate()
            .find(|&(i, alt)| self.alternatives[..i].contains(alt))
            .map(|(_, alt)| alt.as_str())
    }
}

/// Single pass over the pattern tracking group structure
///
/// Escapes and character classes are treated as opaque atoms so `\++` or
/// `[*+]` are not mistaken for quantifiers.
struct Scanner {
    chars: Vec<char>,
    pos: usize,
    max_depth: usize,
    stack: Vec<Group>,
    root: Group,
    prev: Token,
    wildcard_run: usize,
}

impl Scanner {
    fn new(pattern: &str, max_depth: usize) -> Self {
        Self {
            chars: pattern.chars().collect(),
            pos: 0,
            max_depth,
            stack: Vec::new(),
            root: Group::default(),
            prev: Token::Start,
            wildcard_run: 0,
        }
    }

    fn run(mut self) -> Result<(), UnsafePattern> {
        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                '\\' => {
                    let end = (self.pos + 2).min(self.chars.len());
                    self.atom(self.pos, end);
                }
                '[' => {
                    let end = self.class_end();
                    self.atom(self.pos, end);
                }
                '(' => self.open()?,
                ')' => self.close()?,
                '|' => {
                    let group = self.top();
                    let alt = std::mem::take(&mut group.current);
                    group.alternatives.push(alt);
                    self.prev = Token::Alternation;
                    self.wildcard_run = 0;
                    self.pos += 1;
                }
                '*' | '+' | '?' => {
                    self.quantifier(c, c != '?')?;
                    self.pos += 1;
                }
                '{' => match self.repetition() {
                    Some((end, unbounded)) => {
                        self.quantifier('}', unbounded)?;
                        self.pos = end;
                    }
                    None => self.atom(self.pos, self.pos + 1),
                },
                '.' => {
                    self.top().current.push('.');
                    self.prev = Token::Wildcard;
                    self.pos += 1;
                }
                _ => self.atom(self.pos, self.pos + 1),
            }
        }
        Ok(())
    }

    fn top(&mut self) -> &mut Group {
        self.stack.last_mut().unwrap_or(&mut self.root)
    }

    fn atom(&mut self, start: usize, end: usize) {
        let text: String = self.chars[start..end].iter().collect();
        self.top().current.push_str(&text);
        self.prev = Token::Atom;
        self.wildcard_run = 0;
        self.pos = end;
    }

    fn class_end(&self) -> usize {
        let mut i = self.pos + 1;
        if self.chars.get(i) == Some(&'^') {
            i += 1;
        }
        // a leading `]` is literal
        if self.chars.get(i) == Some(&']') {
            i += 1;
        }
        while let Some(&c) = self.chars.get(i) {
            match c {
                '\\' => i += 2,
                ']' => return i + 1,
                _ => i += 1,
            }
        }
        self.chars.len()
    }

    fn open(&mut self) -> Result<(), UnsafePattern> {
        if self.stack.len() + 1 > self.max_depth {
            return Err(UnsafePattern::TooDeep {
                max: self.max_depth,
            });
        }
        self.stack.push(Group::default());
        self.prev = Token::Open;
        self.wildcard_run = 0;
        self.pos += 1;

        // (?:, (?i), (?P<name>, (?<name>
        if self.chars.get(self.pos) == Some(&'?') {
            while let Some(&c) = self.chars.get(self.pos) {
                if c == ')' {
                    break;
                }
                self.pos += 1;
                if c == ':' || c == '>' {
                    break;
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), UnsafePattern> {
        self.pos += 1;
        let Some(mut group) = self.stack.pop() else {
            // unbalanced; left for the compiler to reject
            self.prev = Token::Atom;
            return Ok(());
        };
        let last = std::mem::take(&mut group.current);
        group.alternatives.push(last);

        let repeated_unbounded = match self.chars.get(self.pos) {
            Some('*' | '+') => true,
            Some('{') => self.repetition().is_some_and(|(_, unbounded)| unbounded),
            _ => false,
        };

        if repeated_unbounded {
            if group.has_unbounded {
                return Err(UnsafePattern::NestedQuantifier);
            }
            if let Some(dup) = group.duplicate_alternative() {
                return Err(UnsafePattern::RepeatedAlternation(dup.to_owned()));
            }
        }

        let text = format!("({})", group.alternatives.join("|"));
        let parent = self.top();
        parent.has_unbounded |= group.has_unbounded;
        parent.current.push_str(&text);
        self.prev = Token::Atom;
        self.wildcard_run = 0;
        Ok(())
    }

    /// Parses `{n}`, `{n,}` or `{n,m}` at `pos`; returns end index and boundedness
    fn repetition(&self) -> Option<(usize, bool)> {
        let rest: String = self.chars[self.pos..].iter().take(32).collect();
        let close = rest.find('}')?;
        let body = &rest[1..close];
        let (min, max) = match body.split_once(',') {
            Some((min, max)) => (min, Some(max)),
            None => (body, None),
        };
        if min.trim().parse::<u32>().is_err() {
            return None;
        }
        let unbounded = match max {
            Some(m) if m.trim().is_empty() => true,
            Some(m) => {
                m.trim().parse::<u32>().ok()?;
                false
            }
            None => false,
        };
        Some((self.pos + body.chars().count() + 2, unbounded))
    }

    fn quantifier(&mut self, c: char, unbounded: bool) -> Result<(), UnsafePattern> {
        if let Token::Quantifier(prev) = self.prev {
            let pair: String = [prev, c].iter().collect();
            if let Some(bad) = ADJACENT_QUANTIFIERS.iter().copied().find(|p| *p == pair) {
                return Err(UnsafePattern::AdjacentQuantifiers(bad));
            }
            // lazy/possessive suffix on an earlier quantifier
            self.prev = Token::Quantifier(c);
            return Ok(());
        }

        if unbounded {
            self.top().has_unbounded = true;
            if self.prev == Token::Wildcard {
                self.wildcard_run += 1;
                if self.wildcard_run > MAX_WILDCARD_RUN {
                    return Err(UnsafePattern::WildcardRun(self.wildcard_run));
                }
            } else {
                self.wildcard_run = 0;
            }
        } else {
            self.wildcard_run = 0;
        }
        self.top().current.push(c);
        self.prev = Token::Quantifier(c);
        Ok(())
    }
}
