//! Pattern helpers for prompt detection.

use regex::Regex;

/// Compile a prompt pattern string into a regex.
///
/// Prompts are matched against the trailing line of output, so the pattern
/// is anchored to the end of that line unless it already is.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("(?:{pattern})\\s*$")
    };

    Regex::new(&pattern)
}
