//! Message and report builder
//!
//! Pure functions assembling the Markdown shown to students: paragraph
//! joining, code blocks that their content cannot break out of, admonitions
//! and truncation of huge outputs. Nothing here performs I/O, apart from
//! [`truncate`] reading its opt-out environment variable.

pub mod compare;
pub mod congrats;

use crate::config::types::{BlockStyle, Paragraphs};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// Disables [`truncate`] when set to any value
pub const ENV_NO_TRUNCATE: &str = "STUDENTBOX_NO_TRUNCATE";

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const MIN_FENCE: usize = 3;
const TRUNCATE_THRESHOLD: usize = 4096;
const TRUNCATE_KEEP: usize = 512;

/// Join a prefix and body parts into one Markdown string.
///
/// Paragraphs are separated by a blank line. Empty paragraphs are skipped so
/// that an empty prefix never produces a leading blank line.
pub fn join_paragraphs(prefix: &Paragraphs, body: &[&Paragraphs]) -> String {
    prefix
        .iter()
        .chain(body.iter().flat_map(|part| part.iter()))
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}

/// Render `content` as a fenced Markdown code block tagged with `language`.
pub fn render_block(content: impl fmt::Display, language: &str) -> String {
    render_block_with(content, language, BlockStyle::Fenced)
}

/// Render `content` as a code block in the given style.
///
/// Trailing newlines of the content are dropped. For fenced blocks the fence
/// is one backtick longer than the longest backtick run in the content, so
/// the content can never close it.
pub fn render_block_with(content: impl fmt::Display, language: &str, style: BlockStyle) -> String {
    let text = content.to_string();
    let text = text.trim_end_matches(['\n', '\r']);
    let language = sanitize_language(language);

    match style {
        BlockStyle::Fenced => {
            let fence = "`".repeat(fence_length(text));
            format!("{fence}{language}\n{text}\n{fence}")
        }
        BlockStyle::Indented => {
            format!("    :::{language}\n{}", indent(text, "    "))
        }
    }
}

/// Render a serializable value as a pretty-printed JSON block
pub fn render_value<T: Serialize + ?Sized>(value: &T) -> crate::config::types::Result<String> {
    let json = serde_json::to_string_pretty(value)?;
    Ok(render_block(json, "json"))
}

/// Render a value with its pretty `Debug` form
pub fn render_debug<T: fmt::Debug + ?Sized>(value: &T) -> String {
    render_block(format!("{value:#?}"), "rust")
}

/// Inline code for short single-line text, a block otherwise.
///
/// The result starts with its own separator (a space or a blank line) so it
/// can be appended directly to a sentence such as "I'm expecting:".
pub fn code_or_inline(text: &str) -> String {
    if text.chars().count() < 10 && !text.contains('`') && !text.contains('\n') {
        format!(" `{text}`")
    } else {
        format!("{PARAGRAPH_SEPARATOR}{}", render_block(text, "text"))
    }
}

/// Shorten very long texts, keeping their beginning and end.
///
/// Texts of 4096 characters or more keep their first and last 512
/// characters. Disabled when `STUDENTBOX_NO_TRUNCATE` is set.
pub fn truncate(text: &str) -> Cow<'_, str> {
    truncate_with(text, std::env::var_os(ENV_NO_TRUNCATE).is_none())
}

pub fn truncate_with(text: &str, enabled: bool) -> Cow<'_, str> {
    let length = text.chars().count();
    if !enabled || length < TRUNCATE_THRESHOLD {
        return Cow::Borrowed(text);
    }
    let head: String = text.chars().take(TRUNCATE_KEEP).collect();
    let tail: String = text.chars().skip(length - TRUNCATE_KEEP).collect();
    Cow::Owned(format!(
        "{head}\n…({} truncated chars)…\n{tail}",
        length - 2 * TRUNCATE_KEEP
    ))
}

/// Build a Markdown admonition block (`!!! kind "title"`)
pub fn admonition(kind: &str, title: &str, body: &Paragraphs) -> String {
    let mut out = format!("!!! {kind} \"{title}\"");
    for paragraph in body.iter().filter(|p| !p.is_empty()) {
        out.push_str(PARAGRAPH_SEPARATOR);
        out.push_str(&indent(paragraph, "    "));
    }
    out
}

/// Captured streams as report paragraphs: stderr block first, then stdout
pub fn output_blocks(stdout: &str, stderr: &str, style: BlockStyle) -> Paragraphs {
    let mut blocks = Paragraphs::new();
    for stream in [stderr, stdout] {
        let stream = stream.trim();
        if !stream.is_empty() {
            blocks.push(render_block_with(stream, "text", style));
        }
    }
    blocks
}

/// Prefix every non-empty line
pub fn indent(text: &str, prefix: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fence_length(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    (longest + 1).max(MIN_FENCE)
}

// Info strings may not contain backticks or whitespace
fn sanitize_language(language: &str) -> String {
    language
        .chars()
        .filter(|c| *c != '`' && !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paragraphs_blank_line_between() {
        let joined = join_paragraphs(
            &Paragraphs::from("When calling f(1):"),
            &[&Paragraphs::from("Your code printed:"), &Paragraphs::from("x")],
        );
        assert_eq!(joined, "When calling f(1):\n\nYour code printed:\n\nx");
    }

    #[test]
    fn test_join_paragraphs_empty_prefix() {
        let joined = join_paragraphs(&Paragraphs::new(), &[&Paragraphs::from("Output:")]);
        assert_eq!(joined, "Output:");
    }

    #[test]
    fn test_render_block_plain() {
        assert_eq!(render_block("42\n", "text"), "```text\n42\n```");
    }

    #[test]
    fn test_render_block_longer_fence() {
        let block = render_block("```rust\nfn main() {}\n```", "markdown");
        assert!(block.starts_with("````markdown\n"));
        assert!(block.ends_with("\n````"));
    }

    #[test]
    fn test_render_block_indented_style() {
        let block = render_block_with("Hello world", "text", BlockStyle::Indented);
        assert_eq!(block, "    :::text\n    Hello world");
    }

    #[test]
    fn test_render_block_sanitizes_language() {
        assert_eq!(render_block("x", "py thon`"), "```python\nx\n```");
    }

    #[test]
    fn test_render_value_json() {
        let block = render_value(&vec![1, 2]).unwrap();
        assert!(block.starts_with("```json\n"));
        assert!(block.contains("1,"));
    }

    #[test]
    fn test_render_debug() {
        let block = render_debug(&Some(3));
        assert!(block.contains("Some("));
        assert!(block.starts_with("```rust"));
    }

    #[test]
    fn test_code_or_inline() {
        assert_eq!(code_or_inline("42"), " `42`");
        assert!(code_or_inline("a much longer line of output").starts_with("\n\n```text"));
        assert!(code_or_inline("a`b").starts_with("\n\n"));
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_with("short", true), "short");
    }

    #[test]
    fn test_truncate_long_text() {
        let text = "a".repeat(5000);
        let truncated = truncate_with(&text, true);
        assert!(truncated.contains("(3976 truncated chars)"));
        assert!(truncated.len() < text.len());
        assert_eq!(truncate_with(&text, false).len(), 5000);
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let text = "é".repeat(4100);
        let truncated = truncate_with(&text, true);
        assert!(truncated.starts_with('é'));
    }

    #[test]
    fn test_admonition() {
        let out = admonition("failure", "", &Paragraphs::from(["Hello world.", "a\nb"]));
        assert_eq!(out, "!!! failure \"\"\n\n    Hello world.\n\n    a\n    b");
    }

    #[test]
    fn test_output_blocks_order_and_skip_empty() {
        let blocks = output_blocks("out\n", "err\n", BlockStyle::Fenced);
        let items: Vec<_> = blocks.iter().collect();
        assert_eq!(items, vec!["```text\nerr\n```", "```text\nout\n```"]);

        assert!(output_blocks("", "  \n", BlockStyle::Fenced).is_empty());
    }
}
