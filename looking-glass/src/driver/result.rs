//! Result type for completed operations.

use std::time::Duration;

use serde::{Serialize, Serializer};

/// Sanitized output of one operation on one router.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    /// Router name.
    pub router: String,

    /// Media type the output was produced in.
    pub format: String,

    /// Command line sent to the device.
    pub command: String,

    /// Device output after find/replace.
    pub output: String,

    /// Wall time from connect to disconnect.
    #[serde(rename = "runtime", serialize_with = "as_secs_f64")]
    pub elapsed: Duration,

    /// Loopback interface the probe was sourced from.
    pub loopback: Option<String>,
}

impl CommandResult {
    /// Get the output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Check if the output contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.output.contains(pattern)
    }
}

impl std::fmt::Display for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.output)
    }
}

fn as_secs_f64<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}
