/// The uniform failure signal
///
/// Every way a submission can be rejected ends up as one `Failure` carrying a
/// self-contained Markdown message. The grading harness only has to handle
/// this single type.
use crate::config::types::Paragraphs;
use crate::exec::capture::RunResult;
use crate::report::{admonition, join_paragraphs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use thiserror::Error;

/// Exit status used by [`Failure::exit`]
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Why the submission was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The student code panicked, tried to exit or to read stdin
    Exception,
    /// The deadline elapsed
    Timeout,
    /// Disallowed output, or the expected value printed instead of returned
    Output,
    /// Raised explicitly by the grading script
    Grader,
    /// The harness itself could not supervise the code
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Exception => write!(f, "exception"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Output => write!(f, "output"),
            FailureKind::Grader => write!(f, "grader"),
            FailureKind::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct Failure {
    kind: FailureKind,
    message: String,
    run: Option<RunResult>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            run: None,
        }
    }

    /// A failure raised by the grading script, paragraphs joined by blank lines
    pub fn grader(parts: impl Into<Paragraphs>) -> Self {
        Self::new(
            FailureKind::Grader,
            join_paragraphs(&parts.into(), &[]),
        )
    }

    pub(crate) fn with_run(mut self, run: RunResult) -> Self {
        self.run = Some(run);
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The Markdown message shown to the student
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_message(self) -> String {
        self.message
    }

    /// What the supervised block wrote before the failure, when it came from a scope
    pub fn run(&self) -> Option<&RunResult> {
        self.run.as_ref()
    }

    /// The message wrapped in a `failure` admonition
    pub fn to_admonition(&self) -> String {
        admonition("failure", "", &Paragraphs::from(self.message.as_str()))
    }

    /// Print the message on stderr and end the process with status 1.
    ///
    /// This is the default process-boundary behavior for grading scripts
    /// that don't handle the failure themselves.
    pub fn exit(self) -> ! {
        log::info!("exiting after {} failure", self.kind);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", self.message);
        let _ = stderr.flush();
        std::process::exit(FAILURE_EXIT_CODE)
    }
}

/// Build a grader failure from message paragraphs.
///
/// Use as `return Err(studentbox::fail([...]))` from grading code, or call
/// [`crate::Student::fail`] from inside a supervised block.
pub fn fail(parts: impl Into<Paragraphs>) -> Failure {
    Failure::grader(parts)
}

/// Unwrap a grading result, exiting with the failure message otherwise
pub fn exit_on_failure<T>(result: Result<T, Failure>) -> T {
    match result {
        Ok(value) => value,
        Err(failure) => failure.exit(),
    }
}
