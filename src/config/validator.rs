// Config validation
// Invalid supervision settings must fail fast with actionable errors
// instead of surfacing later as a confusing student failure.

use crate::config::supervision::SupervisionConfig;
use crate::config::types::PrintPolicy;
use std::time::Duration;

/// Deadlines above this are almost certainly a unit mistake (ms vs s)
const SUSPICIOUS_TIMEOUT_SECONDS: f64 = 600.0;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a supervision config
pub fn validate_config(config: &SupervisionConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_timeout(config, &mut result);
    validate_limits(config, &mut result);
    validate_messages(config, &mut result);

    result
}

fn validate_timeout(config: &SupervisionConfig, result: &mut ValidationResult) {
    let timeout = config.timeout_seconds;
    if !timeout.is_finite() {
        result.add_error(format!("timeout_seconds must be finite, got {timeout}"));
    } else if timeout <= 0.0 {
        result.add_error(format!("timeout_seconds must be positive, got {timeout}"));
    } else if !Duration::try_from_secs_f64(timeout).is_ok_and(|d| !d.is_zero()) {
        result.add_error(format!(
            "timeout_seconds {timeout} is not representable as a deadline"
        ));
    } else if timeout > SUSPICIOUS_TIMEOUT_SECONDS {
        result.add_warning(format!(
            "timeout_seconds {timeout} is very high (> {SUSPICIOUS_TIMEOUT_SECONDS}s), is it in milliseconds?"
        ));
    }
}

fn validate_limits(config: &SupervisionConfig, result: &mut ValidationResult) {
    if config.output_limits.stdout_limit == 0 {
        result.add_error("output_limits.stdout_limit cannot be zero".to_string());
    }
    if config.output_limits.stderr_limit == 0 {
        result.add_error("output_limits.stderr_limit cannot be zero".to_string());
    }
}

fn validate_messages(config: &SupervisionConfig, result: &mut ValidationResult) {
    if config.too_slow_message.is_empty() {
        result.add_warning("too_slow_message is empty, timeouts will only show the prefix".to_string());
    }
    if config.print_policy == PrintPolicy::Denied && config.print_prefix.is_empty() {
        result.add_warning("print_policy is denied but print_prefix is empty".to_string());
    }
    if let Some(expected) = &config.print_expect {
        if expected.trim().is_empty() {
            result.add_warning(
                "print_expect is blank, it can never match since silent code prints nothing"
                    .to_string(),
            );
        }
    }
}
