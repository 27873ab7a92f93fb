//! Device error recognition.

use regex::Regex;

/// Ordered set of patterns that mark a reply as a device-reported error.
///
/// Case sensitivity is part of each pattern: human-readable fragments
/// carry `(?i)`, structured markers such as `%Error` do not.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    patterns: Vec<Regex>,
}

impl ErrorClassifier {
    /// Create an empty classifier; it accepts every reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a classifier from patterns, keeping their order.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .try_fold(Self::new(), |classifier, p| classifier.with_pattern(p.as_ref()))
    }

    /// Append a pattern.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// The first pattern matching `output`, if any.
    pub fn classify(&self, output: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(output))
            .map(Regex::as_str)
    }

    /// Pattern sources in evaluation order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
