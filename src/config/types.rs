/// Core types shared by the supervision scope, the verdict and the report builder
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ordered sequence of Markdown paragraphs.
///
/// Every prefix and message in the configuration is stored in this normalized
/// form. A single string converts into a one-paragraph sequence, and the serde
/// representation accepts either a string or a list of strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ParagraphsRepr", into = "Vec<String>")]
pub struct Paragraphs(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ParagraphsRepr {
    One(String),
    Many(Vec<String>),
}

impl From<ParagraphsRepr> for Paragraphs {
    fn from(repr: ParagraphsRepr) -> Self {
        match repr {
            ParagraphsRepr::One(text) => Paragraphs(vec![text]),
            ParagraphsRepr::Many(items) => Paragraphs(items),
        }
    }
}

impl From<Paragraphs> for Vec<String> {
    fn from(paragraphs: Paragraphs) -> Self {
        paragraphs.0
    }
}

impl Paragraphs {
    /// An empty sequence
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// True when there is no non-empty paragraph
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|p| p.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn push(&mut self, paragraph: impl Into<String>) {
        self.0.push(paragraph.into());
    }

    /// Builder-style append
    pub fn with(mut self, paragraph: impl Into<String>) -> Self {
        self.push(paragraph);
        self
    }

    /// `self` followed by `other`
    pub fn then(&self, other: &Paragraphs) -> Paragraphs {
        let mut joined = self.0.clone();
        joined.extend(other.0.iter().cloned());
        Paragraphs(joined)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Paragraphs {
    fn from(text: &str) -> Self {
        Paragraphs(vec![text.to_string()])
    }
}

impl From<String> for Paragraphs {
    fn from(text: String) -> Self {
        Paragraphs(vec![text])
    }
}

impl From<&String> for Paragraphs {
    fn from(text: &String) -> Self {
        Paragraphs(vec![text.clone()])
    }
}

impl From<Vec<String>> for Paragraphs {
    fn from(items: Vec<String>) -> Self {
        Paragraphs(items)
    }
}

impl From<Vec<&str>> for Paragraphs {
    fn from(items: Vec<&str>) -> Self {
        Paragraphs(items.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Paragraphs {
    fn from(items: [&str; N]) -> Self {
        Paragraphs(items.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[String; N]> for Paragraphs {
    fn from(items: [String; N]) -> Self {
        Paragraphs(items.into_iter().collect())
    }
}

impl FromIterator<String> for Paragraphs {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Paragraphs(iter.into_iter().collect())
    }
}

impl fmt::Display for Paragraphs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::report::join_paragraphs(&Paragraphs::new(), &[self]))
    }
}

/// What happens when supervised code writes to stdout or stderr.
///
/// Mirrors the `True` / `None` / `False` convention of grading scripts:
/// `Some(true)` is [`PrintPolicy::Shown`], `None` is [`PrintPolicy::Hidden`]
/// and `Some(false)` is [`PrintPolicy::Denied`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintPolicy {
    /// Allowed; the output is reported back as a notice
    #[default]
    Shown,
    /// Allowed and never echoed
    Hidden,
    /// Any output is a failure showing what was printed
    Denied,
}

impl From<Option<bool>> for PrintPolicy {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => PrintPolicy::Shown,
            None => PrintPolicy::Hidden,
            Some(false) => PrintPolicy::Denied,
        }
    }
}

impl fmt::Display for PrintPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintPolicy::Shown => write!(f, "shown"),
            PrintPolicy::Hidden => write!(f, "hidden"),
            PrintPolicy::Denied => write!(f, "denied"),
        }
    }
}

/// Markdown flavour used for code blocks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStyle {
    /// Backtick fence tagged with the language hint
    #[default]
    Fenced,
    /// Four-space indented block starting with `:::language` (codehilite)
    Indented,
}

/// Per-stream capture bounds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLimits {
    /// Stdout limit (bytes)
    pub stdout_limit: usize,
    /// Stderr limit (bytes)
    pub stderr_limit: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            stdout_limit: 1024 * 1024, // 1 MB stdout
            stderr_limit: 1024 * 1024, // 1 MB stderr
        }
    }
}

/// Whether a captured stream holds everything that was written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputIntegrity {
    #[serde(rename = "complete")]
    #[default]
    Complete,
    #[serde(rename = "truncated_by_limit")]
    TruncatedByLimit,
}

impl fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByLimit => write!(f, "truncated_by_limit"),
        }
    }
}

/// Infrastructure errors for studentbox.
///
/// These never describe student misbehavior, which is always reported as a
/// [`crate::Failure`].
#[derive(Error, Debug)]
pub enum StudentboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StudentboxError>;
