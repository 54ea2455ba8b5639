use proptest::prelude::*;
use studentbox::report::compare::compare;
use studentbox::report::{admonition, code_or_inline, render_block_with, truncate_with};
use studentbox::{join_paragraphs, render_block, BlockStyle, FailureKind, Paragraphs};

proptest! {
    #[test]
    fn render_block_is_deterministic(content in ".*", language in "[a-z]{0,8}") {
        prop_assert_eq!(render_block(&content, &language), render_block(&content, &language));
    }

    #[test]
    fn content_cannot_close_the_fence(content in "[a-z`\n]{0,40}") {
        let block = render_block(&content, "text");
        let fence: String = block.chars().take_while(|c| *c == '`').collect();
        prop_assert!(fence.len() >= 3);
        let closing = format!("\n{fence}");
        prop_assert!(block.ends_with(&closing));
        let body = &block[fence.len()..block.len() - fence.len()];
        prop_assert!(!body.contains(&fence));
    }

    #[test]
    fn joined_paragraphs_have_no_empty_entries(parts in prop::collection::vec("[a-z ]{0,6}", 0..6)) {
        let joined = join_paragraphs(&Paragraphs::new(), &[&Paragraphs::from(parts.clone())]);
        let non_empty: Vec<&String> = parts.iter().filter(|p| !p.is_empty()).collect();
        prop_assert_eq!(joined.split("\n\n").filter(|p| !p.is_empty()).count(), non_empty.len());
        prop_assert!(!joined.starts_with("\n\n"));
    }
}

#[test]
fn block_of_markdown_with_fences() {
    let block = render_block("```python\nprint(1)\n```", "markdown");
    assert_eq!(block, "````markdown\n```python\nprint(1)\n```\n````");
}

#[test]
fn indented_block_style() {
    assert_eq!(
        render_block_with("a\n\nb\n", "python", BlockStyle::Indented),
        "    :::python\n    a\n\n    b"
    );
}

#[test]
fn inline_or_block() {
    assert_eq!(code_or_inline("42"), " `42`");
    assert_eq!(code_or_inline("a much longer text"), "\n\n```text\na much longer text\n```");
    assert_eq!(code_or_inline("a`b"), "\n\n```text\na`b\n```");
}

#[test]
fn truncation_keeps_both_ends() {
    let text = format!("{}{}{}", "a".repeat(600), "m".repeat(4000), "z".repeat(600));
    let truncated = truncate_with(&text, true);
    assert!(truncated.starts_with(&"a".repeat(512)));
    assert!(truncated.ends_with(&"z".repeat(512)));
    assert!(truncated.contains("…(4176 truncated chars)…"));
    assert_eq!(truncate_with(&text, false), text.as_str());
    assert_eq!(truncate_with("short", true), "short");
}

#[test]
fn admonition_block() {
    assert_eq!(
        admonition("tip", "Hint", &Paragraphs::from(["Use a loop.", "Or recursion."])),
        "!!! tip \"Hint\"\n\n    Use a loop.\n\n    Or recursion."
    );
}

#[test]
fn compare_reports_first_difference() {
    assert!(compare("1\n2\n3\n", "1\n2\n3", "").is_ok());

    let failure = compare("1\n2\n3", "1\n4\n3", "With n = 3:").unwrap_err();
    assert_eq!(failure.kind(), FailureKind::Grader);
    assert!(failure.message().starts_with("With n = 3:\n\nOn line 2 I'm expecting:"));

    let failure = compare("1\n2\n3", "1\n2", "").unwrap_err();
    assert!(failure.message().contains("Your output is too short, missing line 3"));

    let failure = compare("1", "1\n2", "").unwrap_err();
    assert!(failure.message().contains("Unexpected line 2, you gave:"));
}
