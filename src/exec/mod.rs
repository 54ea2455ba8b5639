//! Execution control
//!
//! Runs student code under a supervised scope: a worker thread with a
//! deadline, captured output and intercepted process-level requests.

pub mod capture;
pub mod scope;
pub(crate) mod stdio;
pub(crate) mod unwind;
pub(crate) mod watchdog;

use std::io::{self, BufRead};

/// Terminate the process, or the enclosing supervised block.
///
/// Inside a supervised block this is intercepted and reported as an
/// exception; anywhere else it exits the process with `code`.
pub fn exit(code: i32) -> ! {
    if capture::current().is_some() {
        unwind::raise(unwind::Interrupt::Exit(code))
    }
    std::process::exit(code)
}

/// Unwind the enclosing supervised block if its deadline expired.
///
/// A no-op outside supervised blocks.
pub fn checkpoint() {
    if let Some(capture) = capture::current() {
        capture.deadline().checkpoint();
    }
}

/// Read one line from standard input.
///
/// Inside a supervised block the attempt is intercepted and reported as an
/// exception, since student code must not wait for input.
pub fn read_line() -> io::Result<String> {
    if capture::current().is_some() {
        unwind::raise(unwind::Interrupt::Input)
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_outside_scope_is_noop() {
        checkpoint();
    }
}
