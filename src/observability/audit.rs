/// Supervision audit trail
///
/// Every scope invocation and every external program run emits structured
/// events correlated by a per-run UUID. Events always go to the `log` facade
/// under the `studentbox::audit` target; when an audit file is initialized
/// they are also appended to it as JSON lines.
use crate::config::types::{Result, StudentboxError};
use crate::verdict::failure::FailureKind;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Log target of audit events
pub const AUDIT_TARGET: &str = "studentbox::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    ScopeEnter,
    ScopeExit,
    DeadlineExpired,
    WorkerAbandoned,
    WorkerVanished,
    OutputTruncated,
    ProgramStart,
    ProgramExit,
    ProgramKilled,
}

impl AuditEventType {
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::ScopeEnter => AuditSeverity::Low,
            AuditEventType::ScopeExit => AuditSeverity::Low,
            AuditEventType::ProgramStart => AuditSeverity::Low,
            AuditEventType::ProgramExit => AuditSeverity::Low,
            AuditEventType::DeadlineExpired => AuditSeverity::Medium,
            AuditEventType::OutputTruncated => AuditSeverity::Medium,
            AuditEventType::ProgramKilled => AuditSeverity::Medium,
            AuditEventType::WorkerAbandoned => AuditSeverity::High,
            AuditEventType::WorkerVanished => AuditSeverity::High,
        }
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub timestamp: SystemTime,
    pub run_id: Uuid,
    pub details: String,
    pub outcome: Option<FailureKind>,
    pub elapsed_ms: Option<u64>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, run_id: Uuid, details: impl Into<String>) -> Self {
        Self {
            severity: event_type.default_severity(),
            event_type,
            timestamp: SystemTime::now(),
            run_id,
            details: details.into(),
            outcome: None,
            elapsed_ms: None,
        }
    }

    pub fn with_outcome(mut self, outcome: Option<FailureKind>) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = Some(elapsed.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    /// The event as one JSON line
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"event_type\":\"{:?}\",\"serialization_error\":\"{}\"}}",
                self.event_type, e
            )
        })
    }
}

/// Appends audit events to a file
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StudentboxError::Config(format!("Failed to create audit log directory: {}", e))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StudentboxError::Config(format!("Failed to open audit log: {}", e)))?;
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn append(&self, event: &AuditEvent) {
        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", event.to_json_line()) {
                    error!("Failed to write to audit log: {}", e);
                }
            }
            Err(_) => error!("Failed to acquire lock on audit log"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Mirror audit events to `path` for the rest of the process
pub fn init_audit_log(path: &Path) -> Result<()> {
    let logger = AuditLogger::open(path)?;
    if AUDIT_LOGGER.set(logger).is_err() {
        warn!("Audit log already initialized, ignoring {}", path.display());
    } else {
        info!("Audit log initialized at {}", path.display());
    }
    Ok(())
}

pub fn record(event: AuditEvent) {
    let line = event.to_json_line();
    match event.severity {
        AuditSeverity::High => warn!(target: AUDIT_TARGET, "{}", line),
        AuditSeverity::Medium => info!(target: AUDIT_TARGET, "{}", line),
        AuditSeverity::Low => log::debug!(target: AUDIT_TARGET, "{}", line),
    }
    if let Some(logger) = AUDIT_LOGGER.get() {
        logger.append(&event);
    }
}

/// Convenience functions for common supervision events
pub mod events {
    use super::*;

    pub fn scope_entered(run_id: Uuid, timeout: Duration) {
        record(AuditEvent::new(
            AuditEventType::ScopeEnter,
            run_id,
            format!("Scope entered: timeout={:?}", timeout),
        ));
    }

    pub fn scope_exited(run_id: Uuid, outcome: Option<FailureKind>, elapsed: Duration) {
        let details = match outcome {
            Some(kind) => format!("Scope failed: {}", kind),
            None => "Scope completed".to_string(),
        };
        record(
            AuditEvent::new(AuditEventType::ScopeExit, run_id, details)
                .with_outcome(outcome)
                .with_elapsed(elapsed),
        );
    }

    pub fn deadline_expired(run_id: Uuid, timeout: Duration) {
        record(
            AuditEvent::new(
                AuditEventType::DeadlineExpired,
                run_id,
                format!("Deadline of {:?} expired", timeout),
            )
            .with_elapsed(timeout),
        );
    }

    pub fn worker_abandoned(run_id: Uuid, thread: &str) {
        record(AuditEvent::new(
            AuditEventType::WorkerAbandoned,
            run_id,
            format!("Worker thread {} left running after its deadline", thread),
        ));
    }

    pub fn worker_vanished(run_id: Uuid) {
        record(AuditEvent::new(
            AuditEventType::WorkerVanished,
            run_id,
            "Worker thread ended without reporting an outcome",
        ));
    }

    pub fn output_truncated(run_id: Uuid, stdout_limit: usize, stderr_limit: usize) {
        record(AuditEvent::new(
            AuditEventType::OutputTruncated,
            run_id,
            format!(
                "Captured output hit its limit: stdout_limit={} bytes, stderr_limit={} bytes",
                stdout_limit, stderr_limit
            ),
        ));
    }

    pub fn program_started(run_id: Uuid, command: &str) {
        record(AuditEvent::new(
            AuditEventType::ProgramStart,
            run_id,
            format!("Program started: {}", command),
        ));
    }

    pub fn program_exited(run_id: Uuid, status: &str, elapsed: Duration) {
        record(
            AuditEvent::new(
                AuditEventType::ProgramExit,
                run_id,
                format!("Program exited: {}", status),
            )
            .with_elapsed(elapsed),
        );
    }

    pub fn program_killed(run_id: Uuid, reason: &str, elapsed: Duration) {
        record(
            AuditEvent::new(
                AuditEventType::ProgramKilled,
                run_id,
                format!("Program killed: {}", reason),
            )
            .with_elapsed(elapsed),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_line() {
        let run_id = Uuid::new_v4();
        let event = AuditEvent::new(AuditEventType::ScopeExit, run_id, "Scope failed: timeout")
            .with_outcome(Some(FailureKind::Timeout))
            .with_elapsed(Duration::from_millis(1500));
        let value: serde_json::Value = serde_json::from_str(&event.to_json_line()).unwrap();
        assert_eq!(value["event_type"], "ScopeExit");
        assert_eq!(value["severity"], "Low");
        assert_eq!(value["run_id"], run_id.to_string());
        assert_eq!(value["outcome"], "timeout");
        assert_eq!(value["elapsed_ms"], 1500);
    }

    #[test]
    fn test_abandoned_worker_is_high_severity() {
        assert_eq!(
            AuditEventType::WorkerAbandoned.default_severity(),
            AuditSeverity::High
        );
    }

    #[test]
    fn test_logger_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("events.jsonl");
        let logger = AuditLogger::open(&path).unwrap();
        logger.append(&AuditEvent::new(
            AuditEventType::ScopeEnter,
            Uuid::new_v4(),
            "Scope entered",
        ));
        logger.append(&AuditEvent::new(
            AuditEventType::ScopeExit,
            Uuid::new_v4(),
            "Scope completed",
        ));
        let content = std::fs::read_to_string(logger.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"ScopeEnter\""));
    }
}
