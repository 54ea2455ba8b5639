//! studentbox: a run-time supervisor for student code in grading scripts
//!
//! Grading code calls into a student's submission and must survive whatever
//! it does. studentbox runs each call in a supervised scope with a deadline,
//! captures what it prints, intercepts attempts to exit or read standard
//! input, recovers panics, and turns every way the call can misbehave into one
//! uniform [`Failure`] carrying a Markdown message for the student.
//!
//! ```no_run
//! use studentbox::{student_code, render_block, exit_on_failure, PrintPolicy};
//!
//! fn fib(n: u64) -> u64 { if n < 2 { n } else { fib(n - 1) + fib(n - 2) } }
//!
//! let supervised = exit_on_failure(
//!     student_code()
//!         .configure(|c| c.with_prefix("When calling `fib(10)`:").with_print_policy(PrintPolicy::Denied))
//!         .run(|_student| fib(10)),
//! );
//! if *supervised.value() != 55 {
//!     let gave = render_block(supervised.value(), "text");
//!     studentbox::fail(["`fib(10)` should be 55, you gave:", gave.as_str()]).exit();
//! }
//! ```
//!
//! # Architecture
//!
//! ## Execution Control ([`exec`])
//! - [`exec::scope`]: The supervised scope, the [`Student`] handle and [`Supervised`] results
//! - [`exec::capture`]: Bounded output capture and the `sprint!` macro family
//! - stdio: Redirection of descriptors 1 and 2 while a scope runs
//! - watchdog: Deadline race decided by a single compare-exchange
//! - unwind: Interruption payloads and the chained panic hook
//!
//! ## Exceptions ([`beautify`])
//! - [`beautify::StudentException`]: What a panicking or interrupted block left behind
//! - [`beautify::MarkdownTraceback`]: Default Markdown explanation with hints
//!
//! ## Verdict ([`verdict`])
//! - [`verdict::verdict`]: Pure classification of run evidence
//! - [`verdict::failure`]: The uniform failure signal
//!
//! ## Reports ([`report`])
//! - Paragraph joining, code blocks, admonitions, truncation
//! - [`report::compare`]: Line-by-line output comparison
//! - [`report::congrats`]: Congratulation sentences
//!
//! ## Child Programs ([`process`])
//! - [`process::Program`]: Deadline, memory limit and bounded output for executables
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured audit events
//!
//! ## Configuration ([`config`])
//! - [`config::supervision`]: Scope settings, JSON loading, environment overrides
//! - [`config::validator`]: Config validation
//! - [`config::types`]: Shared type definitions and closed enums
//!
//! # Limitations
//!
//! Rust threads cannot be preempted. A block that misses its deadline is
//! reported immediately, but keeps running detached until it reaches
//! [`checkpoint`] or writes captured output. Panics cannot be recovered when
//! the binary is built with `panic = "abort"`.
//!
//! Descriptors 1 and 2 are process-wide, so root scopes capturing them run one
//! at a time, and whatever any other thread prints meanwhile is captured too.
//! Output printed by an abandoned block after its scope returned is not
//! captured. Under the libtest harness `println!` never reaches fd 1; disable
//! descriptor capture with `with_descriptor_capture(false)` there and print
//! through `sprint!` or the [`Student`] writers.

// Execution Control
pub mod exec;

// Exceptions
pub mod beautify;

// Evidence & Verdict
pub mod verdict;

// Reports
pub mod report;

// Child programs
pub mod process;

// Observability
pub mod observability;

// Configuration
pub mod config;

// CLI entrypoint wiring for the studentbox binary.
pub mod cli;

pub use config::supervision::SupervisionConfig;
pub use config::types::{BlockStyle, OutputIntegrity, OutputLimits, Paragraphs, PrintPolicy};
pub use exec::capture::{CaptureWriter, RunResult};
pub use exec::scope::{student_code, Student, StudentCode, Supervised};
pub use exec::{checkpoint, exit, read_line};
pub use report::{join_paragraphs, render_block};
pub use verdict::failure::{exit_on_failure, fail, Failure, FailureKind};
