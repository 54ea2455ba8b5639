/// Verdict classification for supervised blocks
///
/// The scope gathers what happened into an [`Evidence`] bundle and the
/// classifier derives the verdict from it alone. Precedence: timeout, then a
/// grader failure raised inside the block, then an exception, then the
/// printed-output policy.
use crate::beautify::{explain_or_standard, Beautifier, StudentException};
use crate::config::supervision::SupervisionConfig;
use crate::config::types::{Paragraphs, PrintPolicy};
use crate::exec::capture::RunResult;
use crate::report::{join_paragraphs, output_blocks, render_block_with};
use crate::verdict::failure::{Failure, FailureKind};

/// Everything observed about one supervised run
#[derive(Clone, Debug, Default)]
pub struct Evidence {
    pub timed_out: bool,
    /// Message of a grader failure raised from inside the block
    pub grader_failure: Option<Paragraphs>,
    pub exception: Option<StudentException>,
    /// The harness lost track of the block
    pub internal_error: Option<String>,
    pub run: RunResult,
}

impl Evidence {
    pub fn completed(run: RunResult) -> Self {
        Self {
            run,
            ..Self::default()
        }
    }

    pub fn timed_out(run: RunResult) -> Self {
        Self {
            timed_out: true,
            run,
            ..Self::default()
        }
    }

    pub fn exception(exception: StudentException, run: RunResult) -> Self {
        Self {
            exception: Some(exception),
            run,
            ..Self::default()
        }
    }

    pub fn grader_failure(message: Paragraphs, run: RunResult) -> Self {
        Self {
            grader_failure: Some(message),
            run,
            ..Self::default()
        }
    }

    pub fn internal(reason: impl Into<String>, run: RunResult) -> Self {
        Self {
            internal_error: Some(reason.into()),
            run,
            ..Self::default()
        }
    }
}

/// Outcome of a supervised run
#[derive(Clone, Debug)]
pub enum Verdict {
    /// The block's value can be used; `notice` is the report of shown output
    Completed { notice: Option<String> },
    Failed(Failure),
}

impl Verdict {
    pub fn is_failed(&self) -> bool {
        matches!(self, Verdict::Failed(_))
    }

    /// Failure kind, `None` for completed runs
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Verdict::Completed { .. } => None,
            Verdict::Failed(failure) => Some(failure.kind()),
        }
    }
}

/// Verdict classifier - pure function over evidence
pub struct VerdictClassifier;

impl VerdictClassifier {
    pub fn classify(
        evidence: &Evidence,
        config: &SupervisionConfig,
        beautifier: &dyn Beautifier,
    ) -> Verdict {
        if evidence.timed_out {
            return Self::fail(FailureKind::Timeout, config, &[&config.too_slow_message]);
        }

        if let Some(reason) = &evidence.internal_error {
            return Self::fail(FailureKind::Internal, config, &[&Paragraphs::from(reason)]);
        }

        if let Some(message) = &evidence.grader_failure {
            return Self::fail(FailureKind::Grader, config, &[message]);
        }

        if let Some(exception) = &evidence.exception {
            return Self::classify_exception(exception, config, beautifier);
        }

        Self::classify_output(&evidence.run, config)
    }

    fn classify_exception(
        exception: &StudentException,
        config: &SupervisionConfig,
        beautifier: &dyn Beautifier,
    ) -> Verdict {
        let text = if config.friendly {
            explain_or_standard(beautifier, exception)
        } else if exception.is_panic() {
            render_block_with(exception.standard_text(), "text", config.block_style)
        } else {
            exception.standard_text()
        };
        Self::fail(
            FailureKind::Exception,
            config,
            &[&config.exception_prefix, &Paragraphs::from(text)],
        )
    }

    fn classify_output(run: &RunResult, config: &SupervisionConfig) -> Verdict {
        if !run.has_output() {
            return Verdict::Completed { notice: None };
        }

        if let Some(expected) = &config.print_expect {
            if run.out() == expected.trim() {
                let printed = Paragraphs::from(render_block_with(
                    run.out(),
                    "text",
                    config.block_style,
                ));
                return Self::fail(
                    FailureKind::Output,
                    config,
                    &[&config.printed_instead_message, &printed],
                );
            }
        }

        let blocks = output_blocks(run.stdout(), run.stderr(), config.block_style);
        match config.print_policy {
            PrintPolicy::Denied => {
                Self::fail(FailureKind::Output, config, &[&config.print_prefix, &blocks])
            }
            PrintPolicy::Hidden => Verdict::Completed { notice: None },
            PrintPolicy::Shown => Verdict::Completed {
                notice: Some(join_paragraphs(
                    &config.prefix,
                    &[&config.print_prefix, &blocks],
                )),
            },
        }
    }

    fn fail(kind: FailureKind, config: &SupervisionConfig, body: &[&Paragraphs]) -> Verdict {
        Verdict::Failed(Failure::new(kind, join_paragraphs(&config.prefix, body)))
    }
}
