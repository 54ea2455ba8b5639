//! Running a student program as a child process
//!
//! [`Program`] starts an executable with a wall-clock deadline, an optional
//! address-space limit, no standard input and bounded output collection, and
//! reports every way it can go wrong as a [`Failure`] with a student-facing
//! message.

pub mod output;

use crate::config::types::{OutputLimits, Paragraphs, Result, StudentboxError};
use crate::observability::audit::events;
use crate::report::{join_paragraphs, render_block, truncate};
use crate::verdict::failure::{Failure, FailureKind};
use output::{join_collector, spawn_collector, Collected};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Default wall-clock deadline of a child program
pub const DEFAULT_PROGRAM_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a child program ended
#[derive(Clone, Debug)]
pub struct ProgramOutput {
    pub status: Option<ExitStatus>,
    /// Killed because the deadline elapsed
    pub timed_out: bool,
    pub stdout: Collected,
    pub stderr: Collected,
    pub elapsed: Duration,
}

impl ProgramOutput {
    pub fn success(&self) -> bool {
        self.status.map(|s| s.success()).unwrap_or(false)
    }

    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    /// Terminating signal, on unix
    pub fn signal(&self) -> Option<i32> {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            self.status.and_then(|s| s.signal())
        }
        #[cfg(not(unix))]
        {
            None
        }
    }

    /// Killed by us or by the system
    pub fn killed(&self) -> bool {
        self.timed_out || self.signal() == Some(libc::SIGKILL)
    }
}

/// A program to run, builder style
#[derive(Clone, Debug)]
pub struct Program {
    program: OsString,
    args: Vec<String>,
    timeout: Duration,
    memory_limit: Option<u64>,
    output_limits: OutputLimits,
    current_dir: Option<PathBuf>,
}

impl Program {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_PROGRAM_TIMEOUT,
            memory_limit: None,
            output_limits: OutputLimits::default(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Address-space limit in bytes
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn output_limits(mut self, limits: OutputLimits) -> Self {
        self.output_limits = limits;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The command line as a shell would need it typed
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|arg| shell_quote(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the program and return its stdout without trailing whitespace.
    ///
    /// A non-zero exit, a kill, or anything written on stderr is a failure.
    pub fn run(&self) -> std::result::Result<String, Failure> {
        let output = self
            .output()
            .map_err(|e| Failure::new(FailureKind::Internal, e.to_string()))?;

        if output.success() {
            // Whitespace on stderr is not worth failing over
            if output.stderr.text().trim().is_empty() {
                return Ok(output.stdout.text().trim_end().to_string());
            }
            let stderr = found_on_stderr(&output.stderr);
            return Err(Failure::new(
                FailureKind::Output,
                join_paragraphs(&stderr, &[]),
            ));
        }

        let mut message = Paragraphs::new();
        if self.out_of_memory(&output) {
            message.push("Your program is eating up all the memory! Check for infinite loops maybe?");
        } else if output.killed() {
            message.push("I had to halt your program, sorry...");
            message.push("It were either too slow, or consuming too much resources.");
            message.push("Check for an infinite loop maybe?");
        } else {
            let code = output
                .code()
                .or_else(|| output.signal().map(|signal| -signal))
                .unwrap_or(-1);
            message.push(format!("Your program exited with the error code: {}.", code));
        }

        let kind = if output.timed_out {
            FailureKind::Timeout
        } else {
            FailureKind::Exception
        };
        Err(Failure::new(
            kind,
            join_paragraphs(
                &message,
                &[
                    &self.start_hint(),
                    &printed(&output.stdout),
                    &found_on_stderr(&output.stderr),
                ],
            ),
        ))
    }

    /// Run the program and collect how it ended
    pub fn output(&self) -> Result<ProgramOutput> {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        let mut child = self.spawn()?;
        events::program_started(run_id, &self.command_line());

        let stdout = child
            .stdout
            .take()
            .map(|s| spawn_collector(s, self.output_limits.stdout_limit));
        let stderr = child
            .stderr
            .take()
            .map(|s| spawn_collector(s, self.output_limits.stderr_limit));

        let (status, timed_out) = self.wait_with_timeout(&mut child, start)?;
        let output = ProgramOutput {
            status: Some(status),
            timed_out,
            stdout: join_collector(stdout),
            stderr: join_collector(stderr),
            elapsed: start.elapsed(),
        };

        if output.killed() {
            let reason = if timed_out { "deadline elapsed" } else { "SIGKILL" };
            events::program_killed(run_id, reason, output.elapsed);
        } else {
            events::program_exited(run_id, &status.to_string(), output.elapsed);
        }
        Ok(output)
    }

    fn spawn(&self) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if let Some(limit) = self.memory_limit {
                unsafe {
                    cmd.pre_exec(move || {
                        use nix::sys::resource::{setrlimit, Resource};
                        setrlimit(Resource::RLIMIT_AS, limit, limit).map_err(|e| {
                            std::io::Error::new(
                                std::io::ErrorKind::Other,
                                format!("setrlimit failed: {}", e),
                            )
                        })
                    });
                }
            }
        }

        cmd.spawn().map_err(|e| {
            StudentboxError::Process(format!(
                "Failed to start {}: {}",
                self.program.to_string_lossy(),
                e
            ))
        })
    }

    fn wait_with_timeout(&self, child: &mut Child, start: Instant) -> Result<(ExitStatus, bool)> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok((status, false));
            }
            if start.elapsed() >= self.timeout {
                log::info!(
                    "killing {} after {:?}",
                    self.program.to_string_lossy(),
                    self.timeout
                );
                // Already exited between the poll and the kill
                if let Err(e) = child.kill() {
                    log::debug!("kill failed: {}", e);
                }
                let status = child.wait()?;
                return Ok((status, true));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    // Rust's allocator reports failures on stderr before aborting
    fn out_of_memory(&self, output: &ProgramOutput) -> bool {
        self.memory_limit.is_some()
            && !output.timed_out
            && output.stderr.text().contains("memory allocation of")
    }

    fn start_hint(&self) -> Paragraphs {
        if self.args.is_empty() {
            return Paragraphs::new();
        }
        Paragraphs::from(["I started it as:".to_string(), render_block(self.command_line(), "text")])
    }
}

fn printed(stdout: &Collected) -> Paragraphs {
    section("Your code printed:", stdout)
}

fn found_on_stderr(stderr: &Collected) -> Paragraphs {
    section("Found this on stderr:", stderr)
}

fn section(title: &str, stream: &Collected) -> Paragraphs {
    let text = stream.text();
    if text.trim().is_empty() {
        return Paragraphs::new();
    }
    Paragraphs::from([title.to_string(), render_block(truncate(&text), "text")])
}

/// Quote `arg` for a POSIX shell when it needs it
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\"'\"'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain-arg_1.txt"), "plain-arg_1.txt");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("it's"), "'it'\"'\"'s'");
    }

    #[test]
    fn test_command_line() {
        let program = Program::new("./solution").args(["10", "a b"]);
        assert_eq!(program.command_line(), "./solution 10 'a b'");
    }

    #[test]
    fn test_no_start_hint_without_args() {
        assert!(Program::new("./solution").start_hint().is_empty());
    }

    #[test]
    fn test_missing_program_is_internal() {
        let failure = Program::new("/nonexistent/studentbox-test-program")
            .run()
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Internal);
        assert!(failure.message().contains("Failed to start"));
    }
}
