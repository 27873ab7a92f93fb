//! Regex find/replace over device output.
//!
//! Rules come from configuration and are applied line by line, in order.
//! A replacement is a printf-style template whose conversions name the
//! rule's capture groups:
//!
//! ```text
//! find:    '(?P<prefix>\d+\.\d+)\.\d+\.\d+'
//! replace: '%(prefix)s.x.x'
//! ```
//!
//! Supported conversions are `%(name)s` with an optional `-` flag and
//! minimum width up to [`MAX_WIDTH`] (`%(name)-15s`), plus `%%` for a
//! literal percent sign.
//! A group that did not take part in a match expands to nothing.
//!
//! A rule that cannot be used (bad pattern, bad template, unknown group) is
//! skipped with a warning; it never fails the request.

use log::warn;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Widest padding a conversion may ask for.
pub const MAX_WIDTH: usize = 256;

/// One configured substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindReplaceRule {
    /// Regular expression, optionally with named groups.
    pub find: String,

    /// Replacement template.
    pub replace: String,
}

impl FindReplaceRule {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }
}

/// Why a rule was skipped.
#[derive(Debug, Error)]
enum RuleError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid template at byte {0}")]
    Template(usize),

    #[error("width {0} exceeds {MAX_WIDTH}")]
    Width(usize),

    #[error("template refers to unknown group '{0}'")]
    UnknownGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group {
        name: String,
        width: usize,
        left_align: bool,
    },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    template: Vec<Piece>,
}

impl CompiledRule {
    fn compile(rule: &FindReplaceRule) -> Result<Self, RuleError> {
        let regex = Regex::new(&rule.find)?;
        let template = parse_template(&rule.replace)?;

        for piece in &template {
            if let Piece::Group { name, .. } = piece {
                if !regex.capture_names().flatten().any(|n| n == name) {
                    return Err(RuleError::UnknownGroup(name.clone()));
                }
            }
        }

        Ok(Self { regex, template })
    }

    /// Rewrite every non-overlapping match in `line`.
    fn apply(&self, line: &str) -> Option<String> {
        let mut out = String::with_capacity(line.len());
        let mut last = 0;
        let mut matched = false;

        for caps in self.regex.captures_iter(line) {
            let Some(m) = caps.get(0) else { continue };
            matched = true;
            out.push_str(&line[last..m.start()]);
            self.expand(&caps, &mut out);
            last = m.end();
        }

        if !matched {
            return None;
        }
        out.push_str(&line[last..]);
        Some(out)
    }

    fn expand(&self, caps: &Captures<'_>, out: &mut String) {
        for piece in &self.template {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Group {
                    name,
                    width,
                    left_align,
                } => {
                    let value = caps.name(name).map_or("", |m| m.as_str());
                    let pad = width.saturating_sub(value.chars().count());
                    if *left_align {
                        out.push_str(value);
                        out.extend(std::iter::repeat_n(' ', pad));
                    } else {
                        out.extend(std::iter::repeat_n(' ', pad));
                        out.push_str(value);
                    }
                }
            }
        }
    }
}

fn parse_template(template: &str) -> Result<Vec<Piece>, RuleError> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        literal.push_str(&rest[..pos]);
        let offset = template.len() - rest.len() + pos;
        let directive = &rest[pos + 1..];

        if let Some(after) = directive.strip_prefix('%') {
            literal.push('%');
            rest = after;
            continue;
        }

        let body = directive.strip_prefix('(').ok_or(RuleError::Template(offset))?;
        let close = body.find(')').ok_or(RuleError::Template(offset))?;
        let name = &body[..close];
        let mut conv = &body[close + 1..];

        let left_align = conv.starts_with('-');
        if left_align {
            conv = &conv[1..];
        }
        let digits = conv.bytes().take_while(u8::is_ascii_digit).count();
        let width = if digits == 0 {
            0
        } else {
            conv[..digits]
                .parse()
                .map_err(|_| RuleError::Template(offset))?
        };
        if width > MAX_WIDTH {
            return Err(RuleError::Width(width));
        }
        conv = &conv[digits..];

        rest = conv.strip_prefix('s').ok_or(RuleError::Template(offset))?;
        if name.is_empty() {
            return Err(RuleError::Template(offset));
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(std::mem::take(&mut literal)));
        }
        pieces.push(Piece::Group {
            name: name.to_string(),
            width,
            left_align,
        });
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

/// Ordered find/replace pipeline, compiled once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct OutputSanitizer {
    rules: Vec<CompiledRule>,
}

impl OutputSanitizer {
    /// Compile `rules`, skipping (and logging) the unusable ones.
    pub fn new(rules: &[FindReplaceRule]) -> Self {
        let rules = rules
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| match CompiledRule::compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!("skipping findreplace rule #{i} ({:?}): {e}", rule.find);
                    None
                }
            })
            .collect();

        Self { rules }
    }

    /// Apply every rule to every line.
    ///
    /// With no usable rules the text is returned unchanged; otherwise lines
    /// are rejoined with `\n`.
    pub fn apply(&self, text: &str) -> String {
        if self.rules.is_empty() {
            return text.to_string();
        }

        text.lines()
            .map(|line| {
                self.rules
                    .iter()
                    .fold(line.to_string(), |line, rule| rule.apply(&line).unwrap_or(line))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of usable rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// One-shot form of [`OutputSanitizer::apply`].
pub fn sanitize(text: &str, rules: &[FindReplaceRule]) -> String {
    OutputSanitizer::new(rules).apply(text)
}
