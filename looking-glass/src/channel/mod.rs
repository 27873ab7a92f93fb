//! Channel layer: output accumulation and prompt matching.
//!
//! Raw transport chunks are cleaned of terminal control sequences here
//! before the session looks for prompts in them.

mod buffer;
mod patterns;

pub use buffer::{DEFAULT_MAX_OUTPUT, OutputBuffer};
pub use patterns::compile_prompt_pattern;
