//! Exception capture and beautification
//!
//! A [`StudentException`] is what the scope recovers when supervised code
//! unwinds. A [`Beautifier`] turns it into a friendlier Markdown explanation;
//! when it fails the scope falls back to [`StudentException::standard_text`].

mod hints;
mod markdown;

pub use hints::hint_for;
pub use markdown::MarkdownTraceback;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// How the supervised code left its normal path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// A panic
    Panic,
    /// An intercepted request to terminate the process
    ExitRequest { code: i32 },
    /// An attempt to read standard input
    InputRequest,
}

/// Source location of a panic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for PanicLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// An exception raised by student code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentException {
    pub kind: ExceptionKind,
    pub message: String,
    pub location: Option<PanicLocation>,
    /// Rendered backtrace, present when `RUST_BACKTRACE` enabled capture
    pub backtrace: Option<String>,
    pub thread: Option<String>,
}

impl StudentException {
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            kind: ExceptionKind::Panic,
            message: message.into(),
            location: None,
            backtrace: None,
            thread: None,
        }
    }

    pub(crate) fn interception(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            backtrace: None,
            thread: None,
        }
    }

    pub fn with_location(mut self, location: PanicLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    pub fn is_panic(&self) -> bool {
        self.kind == ExceptionKind::Panic
    }

    /// The exception in the form the Rust runtime prints it.
    ///
    /// Panics read `panicked at src/lib.rs:3:5:` followed by the message;
    /// interceptions are their configured message alone.
    pub fn standard_text(&self) -> String {
        match (&self.kind, &self.location) {
            (ExceptionKind::Panic, Some(location)) => {
                format!("panicked at {}:\n{}", location, self.message)
            }
            (ExceptionKind::Panic, None) => format!("panicked:\n{}", self.message),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for StudentException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.standard_text())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeautifyError {
    #[error("nothing to explain: the exception has no message and no location")]
    Empty,

    #[error("beautifier failed: {0}")]
    Failed(String),
}

/// Turns a raw exception into explanatory Markdown
pub trait Beautifier: Send + Sync {
    fn explain(&self, exception: &StudentException) -> Result<String, BeautifyError>;
}

impl<F> Beautifier for F
where
    F: Fn(&StudentException) -> Result<String, BeautifyError> + Send + Sync,
{
    fn explain(&self, exception: &StudentException) -> Result<String, BeautifyError> {
        self(exception)
    }
}

/// Beautified text when possible, standard text otherwise.
///
/// A failing or panicking beautifier is logged and never escalates.
pub fn explain_or_standard(beautifier: &dyn Beautifier, exception: &StudentException) -> String {
    let explained = panic::catch_unwind(AssertUnwindSafe(|| beautifier.explain(exception)))
        .unwrap_or_else(|_| Err(BeautifyError::Failed("beautifier panicked".to_string())));
    match explained {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            log::warn!("beautifier returned nothing, using standard exception text");
            exception.standard_text()
        }
        Err(e) => {
            log::warn!("{}, using standard exception text", e);
            exception.standard_text()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(message: &str) -> StudentException {
        StudentException::panic(message).with_location(PanicLocation {
            file: "src/solution.rs".to_string(),
            line: 3,
            column: 5,
        })
    }

    #[test]
    fn test_standard_text_panic() {
        assert_eq!(
            located("bad").standard_text(),
            "panicked at src/solution.rs:3:5:\nbad"
        );
        assert_eq!(StudentException::panic("bad").standard_text(), "panicked:\nbad");
    }

    #[test]
    fn test_standard_text_interception() {
        let exception =
            StudentException::interception(ExceptionKind::ExitRequest { code: 2 }, "no exit");
        assert_eq!(exception.standard_text(), "no exit");
        assert!(!exception.is_panic());
    }

    #[test]
    fn test_closure_beautifier() {
        let beautifier = |e: &StudentException| -> Result<String, BeautifyError> {
            Ok(format!("explained: {}", e.message))
        };
        assert_eq!(
            explain_or_standard(&beautifier, &located("x")),
            "explained: x"
        );
    }

    #[test]
    fn test_failing_beautifier_falls_back() {
        let beautifier = |_: &StudentException| -> Result<String, BeautifyError> {
            Err(BeautifyError::Failed("boom".into()))
        };
        assert_eq!(
            explain_or_standard(&beautifier, &located("bad")),
            "panicked at src/solution.rs:3:5:\nbad"
        );
    }

    #[test]
    fn test_panicking_beautifier_falls_back() {
        let beautifier = |_: &StudentException| -> Result<String, BeautifyError> {
            panic!("beautifier bug")
        };
        assert_eq!(
            explain_or_standard(&beautifier, &located("bad")),
            located("bad").standard_text()
        );
    }

    #[test]
    fn test_blank_beautifier_output_falls_back() {
        let beautifier =
            |_: &StudentException| -> Result<String, BeautifyError> { Ok("  ".to_string()) };
        assert_eq!(
            explain_or_standard(&beautifier, &located("bad")),
            located("bad").standard_text()
        );
    }
}
