/// Output capture for supervised code
///
/// Each scope owns one bounded buffer per stream, fed from two sources:
///
/// - the process descriptors: while a scope runs, fds 1 and 2 are redirected
///   to spool files (see `exec::stdio`), so `println!`, `eprintln!` and
///   anything else writing to them is captured;
/// - the `sprint!` family of macros and [`CaptureWriter`], which write to the
///   capture installed in the worker thread's thread-local stack and fall back
///   to the real process streams outside any scope.
///
/// Before each direct write the spools are drained into the buffers, so the
/// two sources keep their order within one thread. Buffers hold raw bytes
/// and are decoded when frozen; writes past the per-stream limit are dropped
/// and the stream is marked truncated.
///
/// Not captured: descriptor writes when descriptor capture is disabled, and
/// `println!` under the libtest harness, which swaps the print macros' sink
/// for its own buffer before they reach fd 1. Use `sprint!` or the
/// [`Student`](crate::Student) writers in unit tests.
use crate::config::types::{OutputIntegrity, OutputLimits};
use crate::exec::stdio::Spool;
use crate::exec::watchdog::Deadline;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

thread_local! {
    static ACTIVE: RefCell<Vec<Capture>> = const { RefCell::new(Vec::new()) };
}

/// Target stream of a captured write
#[doc(hidden)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// What a supervised block wrote, and how long it ran
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    stdout: String,
    stderr: String,
    stdout_integrity: OutputIntegrity,
    stderr_integrity: OutputIntegrity,
    elapsed: Duration,
}

impl RunResult {
    /// Everything written to stdout, untouched
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Stdout without surrounding whitespace
    pub fn out(&self) -> &str {
        self.stdout.trim()
    }

    /// Stderr without surrounding whitespace
    pub fn err(&self) -> &str {
        self.stderr.trim()
    }

    /// True when either stream holds more than whitespace
    pub fn has_output(&self) -> bool {
        !self.out().is_empty() || !self.err().is_empty()
    }

    pub fn stdout_integrity(&self) -> OutputIntegrity {
        self.stdout_integrity
    }

    pub fn stderr_integrity(&self) -> OutputIntegrity {
        self.stderr_integrity
    }

    /// True when a stream hit its capture limit
    pub fn truncated(&self) -> bool {
        self.stdout_integrity == OutputIntegrity::TruncatedByLimit
            || self.stderr_integrity == OutputIntegrity::TruncatedByLimit
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[derive(Debug)]
struct Bounded {
    bytes: Vec<u8>,
    limit: usize,
    integrity: OutputIntegrity,
}

impl Bounded {
    fn push(&mut self, chunk: &[u8]) {
        if self.integrity == OutputIntegrity::TruncatedByLimit {
            return;
        }
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() <= room {
            self.bytes.extend_from_slice(chunk);
            return;
        }
        self.bytes.extend_from_slice(&chunk[..room]);
        self.integrity = OutputIntegrity::TruncatedByLimit;
    }

    fn text(&self) -> String {
        decode(&self.bytes, self.integrity == OutputIntegrity::TruncatedByLimit)
    }
}

/// Decode captured bytes. A character cut by the limit is dropped rather
/// than replaced.
fn decode(bytes: &[u8], truncated: bool) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) if truncated && e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// One bounded stream buffer, shared between the worker and the watchdog
#[derive(Clone, Debug)]
pub(crate) struct CaptureBuffer {
    inner: Arc<Mutex<Bounded>>,
}

impl CaptureBuffer {
    fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Bounded {
                bytes: Vec::new(),
                limit,
                integrity: OutputIntegrity::Complete,
            })),
        }
    }

    // A poisoned buffer still holds valid bytes
    fn lock(&self) -> MutexGuard<'_, Bounded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn push(&self, chunk: impl AsRef<[u8]>) {
        self.lock().push(chunk.as_ref());
    }

    fn snapshot(&self) -> (String, OutputIntegrity) {
        let bounded = self.lock();
        (bounded.text(), bounded.integrity)
    }
}

/// Capture state of one scope invocation
#[derive(Clone, Debug)]
pub(crate) struct Capture {
    stdout: CaptureBuffer,
    stderr: CaptureBuffer,
    deadline: Deadline,
    tree: Uuid,
    spool: Option<Arc<Spool>>,
}

impl Capture {
    pub(crate) fn new(limits: &OutputLimits, deadline: Deadline) -> Self {
        Self {
            stdout: CaptureBuffer::new(limits.stdout_limit),
            stderr: CaptureBuffer::new(limits.stderr_limit),
            deadline,
            tree: Uuid::nil(),
            spool: None,
        }
    }

    /// Root scope this capture belongs to
    pub(crate) fn in_tree(mut self, tree: Uuid) -> Self {
        self.tree = tree;
        self
    }

    pub(crate) fn with_spool(mut self, spool: Arc<Spool>) -> Self {
        self.spool = Some(spool);
        self
    }

    pub(crate) fn tree(&self) -> Uuid {
        self.tree
    }

    /// Move what reached the redirected descriptors into the buffers
    pub(crate) fn sync(&self) {
        if let Some(spool) = &self.spool {
            let _ = io::stdout().flush();
            spool.drain(0, |bytes| self.stdout.push(bytes));
            spool.drain(1, |bytes| self.stderr.push(bytes));
        }
    }

    pub(crate) fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub(crate) fn buffer(&self, stream: Stream) -> &CaptureBuffer {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    pub(crate) fn writer(&self, stream: Stream) -> CaptureWriter {
        CaptureWriter {
            capture: self.clone(),
            stream,
        }
    }

    /// Write `chunk` after whatever the descriptors already received
    fn write(&self, stream: Stream, chunk: &[u8]) {
        self.deadline.checkpoint();
        self.sync();
        self.buffer(stream).push(chunk);
    }

    /// Copy of everything captured so far
    pub(crate) fn freeze(&self) -> RunResult {
        self.sync();
        let (stdout, stdout_integrity) = self.stdout.snapshot();
        let (stderr, stderr_integrity) = self.stderr.snapshot();
        RunResult {
            stdout,
            stderr,
            stdout_integrity,
            stderr_integrity,
            elapsed: self.deadline.elapsed(),
        }
    }
}

/// Restores the previous capture of this thread when dropped
pub(crate) struct CaptureGuard {
    _not_send: PhantomData<*const ()>,
}

/// Redirect the current thread's captured writes to `capture`
pub(crate) fn install(capture: Capture) -> CaptureGuard {
    ACTIVE.with(|active| active.borrow_mut().push(capture));
    CaptureGuard {
        _not_send: PhantomData,
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

/// The innermost capture of this thread, if any
pub(crate) fn current() -> Option<Capture> {
    ACTIVE.with(|active| active.borrow().last().cloned())
}

/// Backend of the `sprint!` macro family
#[doc(hidden)]
pub fn _print(stream: Stream, args: fmt::Arguments<'_>) {
    match current() {
        Some(capture) => capture.write(stream, args.to_string().as_bytes()),
        None => match stream {
            Stream::Stdout => print!("{args}"),
            Stream::Stderr => eprint!("{args}"),
        },
    }
}

/// `io::Write`/`fmt::Write` handle onto a captured stream.
///
/// Writing after the scope's deadline expired unwinds the abandoned block.
#[derive(Clone, Debug)]
pub struct CaptureWriter {
    capture: Capture,
    stream: Stream,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.capture.write(self.stream, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for CaptureWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.capture.write(self.stream, s.as_bytes());
        Ok(())
    }
}

/// Print to the captured stdout of the enclosing scope, or the real stdout
#[macro_export]
macro_rules! sprint {
    ($($arg:tt)*) => {
        $crate::exec::capture::_print(
            $crate::exec::capture::Stream::Stdout,
            format_args!($($arg)*),
        )
    };
}

/// Like [`sprint!`], with a newline
#[macro_export]
macro_rules! sprintln {
    () => {
        $crate::sprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::exec::capture::_print(
            $crate::exec::capture::Stream::Stdout,
            format_args!("{}\n", format_args!($($arg)*)),
        )
    };
}

/// Print to the captured stderr of the enclosing scope, or the real stderr
#[macro_export]
macro_rules! seprint {
    ($($arg:tt)*) => {
        $crate::exec::capture::_print(
            $crate::exec::capture::Stream::Stderr,
            format_args!($($arg)*),
        )
    };
}

/// Like [`seprint!`], with a newline
#[macro_export]
macro_rules! seprintln {
    () => {
        $crate::seprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::exec::capture::_print(
            $crate::exec::capture::Stream::Stderr,
            format_args!("{}\n", format_args!($($arg)*)),
        )
    };
}
