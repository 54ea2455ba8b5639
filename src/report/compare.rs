//! Line-by-line comparison of an expected output with a student's output

use super::{code_or_inline, render_block};
use crate::config::types::Paragraphs;
use crate::verdict::failure::Failure;

const FULL_OUTPUT_HINT: &str = "Just in case it helps, here's your full output:";

/// Compare two multi-line outputs, failing on the first differing line.
///
/// Leading and trailing whitespace of the whole texts is ignored. The failure
/// message points at the first differing line, with a hint when the only
/// visible difference is a leading or trailing space.
pub fn compare(
    expected: &str,
    theirs: &str,
    preamble: impl Into<Paragraphs>,
) -> Result<(), Failure> {
    if expected.trim() == theirs.trim() {
        return Ok(());
    }
    let preamble = preamble.into();
    let expected_lines: Vec<&str> = expected.split('\n').collect();
    let their_lines: Vec<&str> = theirs.split('\n').collect();
    let count = expected_lines.len().max(their_lines.len());

    for index in 0..count {
        let line = index + 1;
        let expected_line = expected_lines.get(index).copied();
        let their_line = their_lines.get(index).copied();
        if expected_line == their_line {
            continue;
        }
        let body = match (expected_line, their_line) {
            (None, Some(their_line)) => Paragraphs::new()
                .with(format!(
                    "Unexpected line {line}, you gave:{}",
                    code_or_inline(their_line)
                ))
                .with(FULL_OUTPUT_HINT)
                .with(render_block(theirs, "text")),
            (Some(expected_line), None) => Paragraphs::new()
                .with(format!(
                    "Your output is too short, missing line {line}, I'm expecting:{}",
                    code_or_inline(expected_line)
                ))
                .with(FULL_OUTPUT_HINT)
                .with(render_block(theirs, "text")),
            (Some(expected_line), Some(their_line)) => {
                mismatch(line, expected_line, their_line, theirs)
            }
            (None, None) => continue,
        };
        return Err(Failure::grader(preamble.then(&body)));
    }

    Err(Failure::grader(preamble.then(
        &Paragraphs::new()
            .with("Looks like a wrong answer, expected:")
            .with(render_block(expected, "text"))
            .with("you gave:")
            .with(render_block(theirs, "text")),
    )))
}

fn mismatch(line: usize, expected_line: &str, their_line: &str, theirs: &str) -> Paragraphs {
    let mut body = Paragraphs::new().with(format!(
        "On line {line} I'm expecting:{}",
        code_or_inline(expected_line)
    ));
    if their_line.is_empty() {
        body.push("You gave nothing.");
    } else {
        body.push(format!("You gave:{}", code_or_inline(their_line)));
    }
    if let Some(hint) = space_hint(expected_line, their_line) {
        body.push(hint);
    }
    if their_line != theirs {
        body.push(FULL_OUTPUT_HINT);
        body.push(render_block(theirs, "text"));
    }
    body
}

fn space_hint(expected_line: &str, their_line: &str) -> Option<&'static str> {
    if expected_line.is_empty() || their_line.is_empty() {
        return None;
    }
    if their_line.ends_with(' ') && !expected_line.ends_with(' ') {
        return Some("(Notice your line ends with a space, not mine.)");
    }
    if their_line.starts_with(' ') && !expected_line.starts_with(' ') {
        return Some("(Notice your line starts with a space, not mine.)");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::failure::FailureKind;

    #[test]
    fn test_equal_outputs() {
        assert!(compare("a\nb", "a\nb\n", "").is_ok());
        assert!(compare("", "", "").is_ok());
    }

    #[test]
    fn test_differ() {
        let failure = compare("a", "b", "").unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Grader);
        assert!(failure.message().contains("On line 1 I'm expecting: `a`"));
        assert!(failure.message().contains("You gave: `b`"));
    }

    #[test]
    fn test_mine_longer() {
        let failure = compare("a\nb", "a", "").unwrap_err();
        assert!(failure.message().contains("missing line 2"));
        assert!(failure.message().contains("`b`"));
    }

    #[test]
    fn test_their_longer() {
        let failure = compare("a", "a\nb", "").unwrap_err();
        assert!(failure.message().contains("Unexpected line 2"));
        assert!(failure.message().contains(FULL_OUTPUT_HINT));
    }

    #[test]
    fn test_trailing_space_hint() {
        let failure = compare("a\nb\n", "a \nb \n", "").unwrap_err();
        assert!(failure.message().contains("your line ends with a space"));
    }

    #[test]
    fn test_leading_space_hint() {
        let failure = compare("x\ny", "x\n y", "").unwrap_err();
        assert!(failure.message().contains("your line starts with a space"));
    }

    #[test]
    fn test_gave_nothing() {
        let failure = compare("a\nb\nc", "a\n\nc", "").unwrap_err();
        assert!(failure.message().contains("You gave nothing."));
    }

    #[test]
    fn test_preamble_first() {
        let failure = compare("1", "2", "Calling `main` with `3`:").unwrap_err();
        assert!(failure.message().starts_with("Calling `main` with `3`:\n\n"));
    }
}
