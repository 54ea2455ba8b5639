/// The supervised scope
///
/// `StudentCode::run` executes a block of student code on a dedicated worker
/// thread and waits for it on the calling thread until the deadline. The
/// block sees a [`Student`] handle through which it prints, exits, reads
/// input or fails; all of these are captured or intercepted. Whatever
/// happens is turned into evidence, classified, and returned as either the
/// block's value or one [`Failure`].
///
/// A block still running at the deadline is abandoned: its thread is left
/// detached and unwinds at its next checkpoint or captured write. Its later
/// outcome is discarded, and what it prints after the scope returned goes to
/// the restored process streams.
///
/// With `capture_descriptors` on (the default), root scopes take turns on the
/// process descriptors; a scope started while another root scope runs waits
/// for it before its own deadline starts.
use crate::beautify::{Beautifier, ExceptionKind, MarkdownTraceback, StudentException};
use crate::config::supervision::SupervisionConfig;
use crate::config::types::Paragraphs;
use crate::config::validator::validate_config;
use crate::exec::capture::{self, Capture, CaptureWriter, RunResult, Stream};
use crate::exec::stdio;
use crate::exec::unwind::{self, Interrupt, SupervisedThread, Unwound};
use crate::exec::watchdog::{self, Deadline, Wake};
use crate::observability::audit::events;
use crate::report::join_paragraphs;
use crate::verdict::failure::{Failure, FailureKind};
use crate::verdict::verdict::{Evidence, Verdict, VerdictClassifier};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Start configuring a supervised scope with default settings
pub fn student_code() -> StudentCode {
    StudentCode::new(SupervisionConfig::default())
}

/// A configured, not yet started, supervised scope
#[derive(Clone)]
pub struct StudentCode {
    config: SupervisionConfig,
    beautifier: Arc<dyn Beautifier>,
}

impl std::fmt::Debug for StudentCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudentCode")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StudentCode {
    pub fn new(config: SupervisionConfig) -> Self {
        let beautifier = Arc::new(MarkdownTraceback::with_block_style(config.block_style));
        Self { config, beautifier }
    }

    /// Replace the default exception beautifier
    pub fn with_beautifier(mut self, beautifier: Arc<dyn Beautifier>) -> Self {
        self.beautifier = beautifier;
        self
    }

    /// Adjust the configuration in place, builder style
    pub fn configure(mut self, f: impl FnOnce(SupervisionConfig) -> SupervisionConfig) -> Self {
        self.config = f(self.config);
        self
    }

    pub fn config(&self) -> &SupervisionConfig {
        &self.config
    }

    /// Run `block` under supervision.
    ///
    /// Returns the block's value with what it printed, or the failure that
    /// should be shown to the student.
    pub fn run<T, F>(self, block: F) -> Result<Supervised<T>, Failure>
    where
        F: FnOnce(&Student) -> T + Send + 'static,
        T: Send + 'static,
    {
        unwind::install_panic_hook();

        let run_id = Uuid::new_v4();
        let report = validate_config(&self.config);
        if !report.is_valid() {
            return Err(Failure::new(
                FailureKind::Internal,
                format!(
                    "Invalid supervision configuration: {}",
                    report.errors.join("; ")
                ),
            ));
        }
        // Audit events are logged to stderr, keep them out of the redirected window
        events::scope_entered(run_id, self.config.timeout());

        let tree = capture::current().map(|c| c.tree()).unwrap_or(run_id);
        let redirect = if self.config.capture_descriptors {
            match stdio::redirect(tree) {
                Ok(redirect) => Some(redirect),
                Err(e) => {
                    events::scope_exited(run_id, Some(FailureKind::Internal), Duration::ZERO);
                    return Err(Failure::new(
                        FailureKind::Internal,
                        format!("Failed to capture the standard streams: {}", e),
                    ));
                }
            }
        } else {
            None
        };

        let deadline = Deadline::arm(self.config.timeout());
        let mut capture = Capture::new(&self.config.output_limits, deadline.clone()).in_tree(tree);
        if let Some((_, spool)) = &redirect {
            capture = capture.with_spool(Arc::clone(spool));
        }
        let thread_name = format!("studentbox-{}", &run_id.simple().to_string()[..8]);

        let (tx, rx) = crossbeam_channel::bounded(1);
        let student = Student {
            capture: capture.clone(),
            run_id,
        };
        let worker_capture = capture.clone();

        let spawned = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let outcome = {
                    let _supervised = SupervisedThread::enter();
                    let _capture = capture::install(worker_capture.clone());
                    panic::catch_unwind(AssertUnwindSafe(|| block(&student)))
                        .map_err(unwind::classify_payload)
                };
                if worker_capture.deadline().finish() {
                    let _ = tx.send(outcome);
                } else {
                    log::debug!("discarding outcome of abandoned block {}", run_id);
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                drop(redirect);
                let failure = Failure::new(
                    FailureKind::Internal,
                    format!("Failed to start the supervised block: {}", e),
                );
                events::scope_exited(run_id, Some(FailureKind::Internal), deadline.elapsed());
                return Err(failure);
            }
        };

        let wake = watchdog::wait(&rx, &deadline);
        // Restore the descriptors first: the final drain reads the spools to
        // their end, and the abandoned worker's later writes go elsewhere
        drop(redirect);
        let run = capture.freeze();
        if run.truncated() {
            events::output_truncated(
                run_id,
                self.config.output_limits.stdout_limit,
                self.config.output_limits.stderr_limit,
            );
        }

        let (value, evidence) = match wake {
            Wake::Finished(outcome) => {
                // The worker sent its outcome as its last action
                let _ = handle.join();
                self.collect(outcome, run.clone())
            }
            Wake::Expired => {
                events::deadline_expired(run_id, deadline.timeout());
                events::worker_abandoned(run_id, &thread_name);
                (None, Evidence::timed_out(run.clone()))
            }
            Wake::Vanished => {
                events::worker_vanished(run_id);
                (
                    None,
                    Evidence::internal("The supervised block stopped unexpectedly.", run.clone()),
                )
            }
        };

        let verdict = VerdictClassifier::classify(&evidence, &self.config, self.beautifier.as_ref());
        events::scope_exited(run_id, verdict.failure_kind(), run.elapsed());

        match (verdict, value) {
            (Verdict::Completed { notice }, Some(value)) => Ok(Supervised { value, run, notice }),
            (Verdict::Failed(failure), _) => Err(failure.with_run(run)),
            (Verdict::Completed { .. }, None) => Err(Failure::new(
                FailureKind::Internal,
                "The supervised block completed without a value.",
            )
            .with_run(run)),
        }
    }

    fn collect<T>(&self, outcome: Result<T, Unwound>, run: RunResult) -> (Option<T>, Evidence) {
        match outcome {
            Ok(value) => (Some(value), Evidence::completed(run)),
            Err(Unwound::Panic(exception)) => (None, Evidence::exception(exception, run)),
            Err(Unwound::Interrupt(Interrupt::Exit(code))) => {
                let exception = StudentException::interception(
                    ExceptionKind::ExitRequest { code },
                    join_paragraphs(&self.config.exit_message, &[]),
                );
                (None, Evidence::exception(exception, run))
            }
            Err(Unwound::Interrupt(Interrupt::Input)) => {
                let exception = StudentException::interception(
                    ExceptionKind::InputRequest,
                    join_paragraphs(&self.config.input_message, &[]),
                );
                (None, Evidence::exception(exception, run))
            }
            Err(Unwound::Interrupt(Interrupt::Fail(message))) => {
                (None, Evidence::grader_failure(message, run))
            }
            // Cancellation only happens once the deadline expired, and then
            // the outcome is never sent
            Err(Unwound::Interrupt(Interrupt::Cancelled)) => (None, Evidence::timed_out(run)),
        }
    }
}

/// A block that completed under supervision
#[derive(Clone, Debug)]
pub struct Supervised<T> {
    value: T,
    run: RunResult,
    notice: Option<String>,
}

impl<T> Supervised<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// What the block wrote
    pub fn run(&self) -> &RunResult {
        &self.run
    }

    /// Report of the output the block printed, when the policy shows it
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Print the notice, if any, on stdout
    pub fn print_notice(&self) {
        if let Some(notice) = &self.notice {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", notice);
        }
    }

    pub fn into_parts(self) -> (T, RunResult, Option<String>) {
        (self.value, self.run, self.notice)
    }
}

/// Handle given to a supervised block.
///
/// Everything student code does to the outside world through this handle is
/// captured or intercepted by the scope.
#[derive(Debug)]
pub struct Student {
    capture: Capture,
    run_id: Uuid,
}

impl Student {
    /// Captured standard output
    pub fn stdout(&self) -> CaptureWriter {
        self.capture.writer(Stream::Stdout)
    }

    /// Captured standard error
    pub fn stderr(&self) -> CaptureWriter {
        self.capture.writer(Stream::Stderr)
    }

    /// Request process termination; the scope intercepts it
    pub fn exit(&self, code: i32) -> ! {
        unwind::raise(Interrupt::Exit(code))
    }

    /// Read a line of standard input; the scope intercepts it
    pub fn read_line(&self) -> ! {
        unwind::raise(Interrupt::Input)
    }

    /// Abort the block with a grader failure
    pub fn fail(&self, parts: impl Into<Paragraphs>) -> ! {
        unwind::raise(Interrupt::Fail(parts.into()))
    }

    /// Unwind if the deadline expired.
    ///
    /// Long computations should call this regularly so that an abandoned
    /// block stops consuming CPU.
    pub fn checkpoint(&self) {
        self.capture.deadline().checkpoint();
    }

    pub fn is_cancelled(&self) -> bool {
        self.capture.deadline().is_expired()
    }

    pub fn elapsed(&self) -> Duration {
        self.capture.deadline().elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.capture.deadline().remaining()
    }

    /// What the block wrote so far
    pub fn output(&self) -> RunResult {
        self.capture.freeze()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::PrintPolicy;

    // The test harness shares fd 1 with every test thread
    fn harnessed() -> StudentCode {
        student_code().configure(|c| c.with_descriptor_capture(false))
    }

    #[test]
    fn test_value_and_output() {
        let supervised = harnessed()
            .configure(|c| c.with_print_policy(PrintPolicy::Hidden))
            .run(|student| {
                writeln!(student.stdout(), "working").unwrap();
                crate::sprintln!("{}", 6 * 7);
                42
            })
            .unwrap();
        assert_eq!(*supervised.value(), 42);
        assert_eq!(supervised.run().stdout(), "working\n42\n");
        assert_eq!(supervised.notice(), None);
    }

    #[test]
    fn test_fail_inside_block() {
        let failure = harnessed()
            .run(|student| -> u8 { student.fail(["Wrong answer", "Try again"]) })
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Grader);
        assert_eq!(failure.message(), "Wrong answer\n\nTry again");
    }

    #[test]
    fn test_exit_is_intercepted() {
        let failure = harnessed()
            .configure(|c| c.with_friendly(false).with_exit_message("No exit please."))
            .run(|student| -> u8 { student.exit(2) })
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Exception);
        assert_eq!(failure.message(), "I got an exception:\n\nNo exit please.");
    }

    #[test]
    fn test_timeout_abandons_block() {
        let failure = harnessed()
            .configure(|c| c.with_timeout_secs(0.1).with_too_slow_message("Too slow."))
            .run(|student| loop {
                student.checkpoint();
                thread::sleep(Duration::from_millis(5));
            })
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Timeout);
        assert_eq!(failure.message(), "Too slow.");
        assert!(failure.run().is_some());
    }

    #[test]
    fn test_checkpoint_is_noop_in_time() {
        let supervised = harnessed()
            .run(|student| {
                student.checkpoint();
                student.is_cancelled()
            })
            .unwrap();
        assert!(!supervised.into_value());
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let failure = harnessed()
            .configure(|c| c.with_timeout_secs(0.0))
            .run(|_| 1)
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Internal);
        assert!(failure.message().starts_with("Invalid supervision configuration"));
        assert!(failure.run().is_none());
    }
}
