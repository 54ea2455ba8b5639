use super::{hint_for, BeautifyError, Beautifier, ExceptionKind, StudentException};
use crate::config::types::{BlockStyle, Paragraphs};
use crate::report::{join_paragraphs, render_block_with};

/// Frames from these crates are runtime noise for a student
const INTERNAL_FRAME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "studentbox::",
    "<std::",
    "<core::",
    "<alloc::",
    "<studentbox::",
    "rust_begin_unwind",
    "__rust",
    "__pthread",
    "start_thread",
    "clone",
    "_start",
];

const MAX_FRAMES: usize = 10;

/// Default beautifier: a Markdown explanation with a header, the message,
/// a hint for well-known standard library panics, the location and a
/// backtrace trimmed down to the student's own frames.
#[derive(Debug, Clone, Default)]
pub struct MarkdownTraceback {
    style: BlockStyle,
}

impl MarkdownTraceback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_style(style: BlockStyle) -> Self {
        Self { style }
    }
}

impl Beautifier for MarkdownTraceback {
    fn explain(&self, exception: &StudentException) -> Result<String, BeautifyError> {
        let mut sections = Paragraphs::new();
        match exception.kind {
            ExceptionKind::ExitRequest { code } => {
                sections.push(format!("## Your code tried to exit (status {code})"));
                sections.push(exception.message.clone());
            }
            ExceptionKind::InputRequest => {
                sections.push("## Your code tried to read standard input".to_string());
                sections.push(exception.message.clone());
            }
            ExceptionKind::Panic => {
                if exception.message.trim().is_empty() && exception.location.is_none() {
                    return Err(BeautifyError::Empty);
                }
                sections.push("## Your code panicked".to_string());
                sections.push(render_block_with(&exception.message, "text", self.style));
                if let Some(hint) = hint_for(&exception.message) {
                    sections.push(hint.to_string());
                }
                if let Some(location) = &exception.location {
                    sections.push("### Where".to_string());
                    sections.push(format!("It happened at `{location}`."));
                }
                if let Some(frames) = exception.backtrace.as_deref().and_then(shorten_backtrace) {
                    sections.push("### Backtrace".to_string());
                    sections.push(render_block_with(frames, "text", self.style));
                }
            }
        }
        Ok(join_paragraphs(&sections, &[]))
    }
}

/// Keep only the frames that belong to the student's code
fn shorten_backtrace(backtrace: &str) -> Option<String> {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in backtrace.lines() {
        if is_frame_header(line) {
            frames.push(vec![line]);
        } else if let Some(frame) = frames.last_mut() {
            frame.push(line);
        }
    }

    let kept: Vec<String> = frames
        .into_iter()
        .filter(|frame| !is_internal(frame[0]))
        .take(MAX_FRAMES)
        .map(|frame| frame.join("\n"))
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("\n"))
    }
}

// Frame headers look like "  12: crate::module::function"
fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    match trimmed.split_once(": ") {
        Some((index, _)) => !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

fn is_internal(header: &str) -> bool {
    let symbol = header
        .trim_start()
        .split_once(": ")
        .map(|(_, symbol)| symbol.trim())
        .unwrap_or_default();
    INTERNAL_FRAME_PREFIXES
        .iter()
        .any(|prefix| symbol.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beautify::PanicLocation;

    const BACKTRACE: &str = "   0: std::panicking::begin_panic
             at /rustc/library/std/src/panicking.rs:652:12
   1: solution::fib
             at ./src/solution.rs:4:9
   2: solution::main
             at ./src/solution.rs:10:5
   3: core::ops::function::FnOnce::call_once
             at /rustc/library/core/src/ops/function.rs:250:5";

    #[test]
    fn test_panic_explanation_sections() {
        let exception = StudentException::panic("index out of bounds: the len is 3 but the index is 7")
            .with_location(PanicLocation {
                file: "src/solution.rs".to_string(),
                line: 4,
                column: 9,
            })
            .with_backtrace(BACKTRACE);
        let text = MarkdownTraceback::new().explain(&exception).unwrap();

        assert!(text.starts_with("## Your code panicked\n\n```text\nindex out of bounds"));
        assert!(text.contains("past the end"));
        assert!(text.contains("It happened at `src/solution.rs:4:9`."));
        assert!(text.contains("solution::fib"));
        assert!(!text.contains("std::panicking"));
        assert!(!text.contains("core::ops"));
    }

    #[test]
    fn test_exit_request() {
        let exception = StudentException::interception(
            ExceptionKind::ExitRequest { code: 3 },
            "Your program tried to exit.",
        );
        let text = MarkdownTraceback::new().explain(&exception).unwrap();
        assert_eq!(
            text,
            "## Your code tried to exit (status 3)\n\nYour program tried to exit."
        );
    }

    #[test]
    fn test_empty_panic_cannot_be_explained() {
        let result = MarkdownTraceback::new().explain(&StudentException::panic(""));
        assert_eq!(result, Err(BeautifyError::Empty));
    }

    #[test]
    fn test_shorten_backtrace_only_internal() {
        assert_eq!(
            shorten_backtrace("   0: std::rt::lang_start\n             at x.rs:1:1"),
            None
        );
    }

    #[test]
    fn test_indented_style() {
        let text = MarkdownTraceback::with_block_style(BlockStyle::Indented)
            .explain(&StudentException::panic("bad"))
            .unwrap();
        assert!(text.contains("    :::text\n    bad"));
    }
}
