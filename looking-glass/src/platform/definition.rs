//! Platform definition for vendor-specific session behaviour.

use regex::Regex;

use super::{ErrorClassifier, Vendor};
use crate::channel::compile_prompt_pattern;

/// Default pattern for the username prompt of a CLI login dialogue.
pub const DEFAULT_USERNAME_PROMPT: &str = r"[Uu]sername.*:|[Ll]ogin:";

/// Default pattern for the password prompt of a CLI login dialogue.
pub const DEFAULT_PASSWORD_PROMPT: &str = r"[Pp]assword.*:";

/// Messages a device prints when it rejects credentials.
pub const DEFAULT_LOGIN_FAILURES: &[&str] = &[
    r"(?i)% ?login invalid",
    r"(?i)authentication failed",
    r"(?i)access denied",
    r"(?i)% ?bad passwords",
];

/// Everything the session layer needs to know about a vendor's CLI.
///
/// Prompts are matched against the trailing line of output only; see
/// [`compile_prompt_pattern`].
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Vendor this definition belongs to.
    pub vendor: Vendor,

    /// Exec prompt.
    pub prompt: Regex,

    /// Username prompt in the login dialogue.
    pub username_prompt: Regex,

    /// Password prompt in the login dialogue.
    pub password_prompt: Regex,

    /// Messages that mean the device rejected the credentials.
    pub login_failures: ErrorClassifier,

    /// Device-reported command errors.
    pub errors: ErrorClassifier,

    /// Commands run once the first prompt is seen (paging off and the like).
    pub on_open_commands: Vec<String>,

    /// Lines sent, without waiting for replies, to log out.
    pub on_close_commands: Vec<String>,
}

impl PlatformDefinition {
    /// Create a definition with the default login dialogue, no error
    /// patterns, and a double `exit` logout.
    pub fn new(vendor: Vendor, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            vendor,
            prompt: compile_prompt_pattern(prompt)?,
            username_prompt: compile_prompt_pattern(DEFAULT_USERNAME_PROMPT)?,
            password_prompt: compile_prompt_pattern(DEFAULT_PASSWORD_PROMPT)?,
            login_failures: ErrorClassifier::from_patterns(DEFAULT_LOGIN_FAILURES)?,
            errors: ErrorClassifier::new(),
            on_open_commands: vec![],
            on_close_commands: vec!["exit".to_string(), "exit".to_string()],
        })
    }

    /// Replace the username prompt pattern.
    pub fn with_username_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.username_prompt = compile_prompt_pattern(pattern)?;
        Ok(self)
    }

    /// Replace the password prompt pattern.
    pub fn with_password_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.password_prompt = compile_prompt_pattern(pattern)?;
        Ok(self)
    }

    /// Add a login failure message pattern.
    pub fn with_login_failure(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.login_failures = self.login_failures.with_pattern(pattern)?;
        Ok(self)
    }

    /// Add a device error pattern.
    pub fn with_error_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.errors = self.errors.with_pattern(pattern)?;
        Ok(self)
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Replace the logout sequence.
    pub fn with_on_close_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_close_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Registry name of the vendor.
    pub fn name(&self) -> &'static str {
        self.vendor.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let platform = PlatformDefinition::new(Vendor::Ios, r"router#").unwrap();
        assert_eq!(platform.name(), "ios");
        assert!(platform.errors.is_empty());
        assert_eq!(platform.on_close_commands, ["exit", "exit"]);

        assert!(platform.username_prompt.is_match("Username: "));
        assert!(platform.username_prompt.is_match("login:"));
        assert!(platform.password_prompt.is_match("Password: "));
        assert!(!platform.password_prompt.is_match("Password: hunter2"));
        assert!(platform.login_failures.classify("% Login invalid").is_some());
        assert!(platform.login_failures.classify("% Bad passwords").is_some());
    }

    #[test]
    fn test_builder_methods() {
        let platform = PlatformDefinition::new(Vendor::Ios, r"router#")
            .unwrap()
            .with_username_prompt(r"User:")
            .unwrap()
            .with_error_pattern(r"%Error")
            .unwrap()
            .with_on_open_command("terminal length 0")
            .with_on_close_commands(["logout"]);

        assert!(platform.username_prompt.is_match("User: "));
        assert!(!platform.username_prompt.is_match("Username: "));
        assert_eq!(platform.errors.len(), 1);
        assert_eq!(platform.on_open_commands, ["terminal length 0"]);
        assert_eq!(platform.on_close_commands, ["logout"]);
    }

    #[test]
    fn test_invalid_prompt() {
        assert!(PlatformDefinition::new(Vendor::Ios, r"(").is_err());
    }
}
