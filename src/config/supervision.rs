/// Supervision configuration: defaults, JSON loading and environment overrides
use crate::config::types::{
    BlockStyle, OutputLimits, Paragraphs, PrintPolicy, Result, StudentboxError,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_EXCEPTION_PREFIX: &str = "I got an exception:";
pub const DEFAULT_PRINT_PREFIX: &str = "Your code printed:";
pub const DEFAULT_TOO_SLOW_MESSAGE: &str =
    "Your program looks too slow, looks like an infinite loop.";
pub const DEFAULT_PRINTED_INSTEAD_MESSAGE: &str =
    "Your code printed what I expected it to return, don't print the result, return it.";
pub const DEFAULT_EXIT_MESSAGE: &str = "Your program tried to exit, remove any call to `exit` from your code, else I won't be able to check it.";
pub const DEFAULT_INPUT_MESSAGE: &str =
    "Don't read from standard input, there's no human to interact with here.";
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 1.0;

/// Environment variable overriding `timeout_seconds`
pub const ENV_TIMEOUT: &str = "STUDENTBOX_TIMEOUT";
/// Environment variable overriding `friendly` (`0`/`false`/`no` disable it)
pub const ENV_FRIENDLY: &str = "STUDENTBOX_FRIENDLY";

/// Everything a supervised scope needs to judge one block of student code.
///
/// Every field is optional in the JSON form; missing fields take the
/// defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    /// Prepended to whichever message is finally emitted
    pub prefix: Paragraphs,
    pub exception_prefix: Paragraphs,
    pub print_prefix: Paragraphs,
    pub too_slow_message: Paragraphs,
    /// Used when stdout equals `print_expect`
    pub printed_instead_message: Paragraphs,
    /// Exception text for an intercepted exit request
    pub exit_message: Paragraphs,
    /// Exception text for an attempt to read standard input
    pub input_message: Paragraphs,
    /// Run exception text through the beautifier
    pub friendly: bool,
    pub print_policy: PrintPolicy,
    pub print_expect: Option<String>,
    /// Wall-clock deadline in seconds
    pub timeout_seconds: f64,
    pub block_style: BlockStyle,
    pub output_limits: OutputLimits,
    /// Redirect the process descriptors 1 and 2 while the block runs, so
    /// plain `println!`/`eprintln!` is captured too
    pub capture_descriptors: bool,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            prefix: Paragraphs::new(),
            exception_prefix: Paragraphs::from(DEFAULT_EXCEPTION_PREFIX),
            print_prefix: Paragraphs::from(DEFAULT_PRINT_PREFIX),
            too_slow_message: Paragraphs::from(DEFAULT_TOO_SLOW_MESSAGE),
            printed_instead_message: Paragraphs::from(DEFAULT_PRINTED_INSTEAD_MESSAGE),
            exit_message: Paragraphs::from(DEFAULT_EXIT_MESSAGE),
            input_message: Paragraphs::from(DEFAULT_INPUT_MESSAGE),
            friendly: true,
            print_policy: PrintPolicy::default(),
            print_expect: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            block_style: BlockStyle::default(),
            output_limits: OutputLimits::default(),
            capture_descriptors: true,
        }
    }
}

impl SupervisionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StudentboxError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(content: &str) -> Result<Self> {
        let config: SupervisionConfig = serde_json::from_str(content)
            .map_err(|e| StudentboxError::Config(format!("Failed to parse config JSON: {}", e)))?;
        config.validated()
    }

    /// Apply `STUDENTBOX_TIMEOUT` and `STUDENTBOX_FRIENDLY` when set
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            self.timeout_seconds = raw.trim().parse::<f64>().map_err(|e| {
                StudentboxError::Config(format!("{ENV_TIMEOUT}={raw:?} is not a number: {e}"))
            })?;
            log::debug!("timeout overridden from environment: {}s", self.timeout_seconds);
        }
        if let Some(raw) = lookup(ENV_FRIENDLY) {
            self.friendly = !matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        self.validated()
    }

    /// Fail fast on a configuration the scope cannot honor
    pub fn validated(self) -> Result<Self> {
        let report = crate::config::validator::validate_config(&self);
        for warning in &report.warnings {
            log::warn!("{}", warning);
        }
        if !report.is_valid() {
            return Err(StudentboxError::Config(format!(
                "Config validation failed:\n{}",
                report.errors.join("\n")
            )));
        }
        Ok(self)
    }

    /// The deadline as a `Duration`.
    ///
    /// Values rejected by validation fall back to the default deadline; a
    /// scope refuses to run with them.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn with_prefix(mut self, prefix: impl Into<Paragraphs>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_exception_prefix(mut self, prefix: impl Into<Paragraphs>) -> Self {
        self.exception_prefix = prefix.into();
        self
    }

    pub fn with_print_prefix(mut self, prefix: impl Into<Paragraphs>) -> Self {
        self.print_prefix = prefix.into();
        self
    }

    pub fn with_too_slow_message(mut self, message: impl Into<Paragraphs>) -> Self {
        self.too_slow_message = message.into();
        self
    }

    pub fn with_printed_instead_message(mut self, message: impl Into<Paragraphs>) -> Self {
        self.printed_instead_message = message.into();
        self
    }

    pub fn with_exit_message(mut self, message: impl Into<Paragraphs>) -> Self {
        self.exit_message = message.into();
        self
    }

    pub fn with_input_message(mut self, message: impl Into<Paragraphs>) -> Self {
        self.input_message = message.into();
        self
    }

    pub fn with_friendly(mut self, friendly: bool) -> Self {
        self.friendly = friendly;
        self
    }

    pub fn with_print_policy(mut self, policy: impl Into<PrintPolicy>) -> Self {
        self.print_policy = policy.into();
        self
    }

    pub fn with_print_expect(mut self, expected: impl Into<String>) -> Self {
        self.print_expect = Some(expected.into());
        self
    }

    pub fn with_timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs_f64();
        self
    }

    pub fn with_block_style(mut self, style: BlockStyle) -> Self {
        self.block_style = style;
        self
    }

    pub fn with_output_limits(mut self, limits: OutputLimits) -> Self {
        self.output_limits = limits;
        self
    }

    pub fn with_descriptor_capture(mut self, enabled: bool) -> Self {
        self.capture_descriptors = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SupervisionConfig::default();
        assert!(config.prefix.is_empty());
        assert_eq!(config.exception_prefix, Paragraphs::from("I got an exception:"));
        assert_eq!(config.print_prefix, Paragraphs::from("Your code printed:"));
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.print_policy, PrintPolicy::Shown);
        assert!(config.friendly);
        assert!(config.print_expect.is_none());
        assert!(config.capture_descriptors);
    }

    #[test]
    fn test_from_json_partial() {
        let config = SupervisionConfig::from_json(
            r#"{"prefix": ["When called as `f(1)`:"], "print_policy": "denied", "timeout_seconds": 0.5}"#,
        )
        .expect("valid config");
        assert_eq!(config.prefix, Paragraphs::from("When called as `f(1)`:"));
        assert_eq!(config.print_policy, PrintPolicy::Denied);
        assert_eq!(config.timeout(), Duration::from_millis(500));
        assert_eq!(config.too_slow_message, Paragraphs::from(DEFAULT_TOO_SLOW_MESSAGE));
    }

    #[test]
    fn test_from_json_rejects_bad_timeout() {
        let err = SupervisionConfig::from_json(r#"{"timeout_seconds": -1}"#).unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [(ENV_TIMEOUT, "2.5"), (ENV_FRIENDLY, "no")].into_iter().collect();
        let config = SupervisionConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert!(!config.friendly);
    }

    #[test]
    fn test_env_override_not_a_number() {
        let result = SupervisionConfig::default()
            .with_overrides_from(|key| (key == ENV_TIMEOUT).then(|| "soon".to_string()));
        assert!(matches!(result, Err(StudentboxError::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = SupervisionConfig::new()
            .with_print_policy(None::<bool>)
            .with_print_expect("42")
            .with_timeout_secs(0.2);
        assert_eq!(config.print_policy, PrintPolicy::Hidden);
        assert_eq!(config.print_expect.as_deref(), Some("42"));
        assert_eq!(config.timeout(), Duration::from_millis(200));
    }
}
