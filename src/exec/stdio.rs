/// Descriptor-level redirection of the process stdout and stderr.
///
/// While a scope runs, fds 1 and 2 point at anonymous temporary files, so
/// plain `println!`/`eprintln!` and anything else writing to the descriptors
/// land in the scope's capture. The descriptors are process-wide: only one
/// scope tree (a root scope and the scopes nested inside its blocks) may own
/// them at a time, other roots wait for it to finish.
///
/// Frames form a stack. Restoring a frame that is not on top splices it out,
/// so an outer scope that times out before its inner one still leaves the
/// original descriptors in place once both are gone.
use crate::config::types::{Result, StudentboxError};
use nix::unistd::{close, dup, dup2};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::FileExt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use uuid::Uuid;

const TARGETS: [RawFd; 2] = [libc::STDOUT_FILENO, libc::STDERR_FILENO];
const CHUNK: usize = 64 * 1024;

struct Frame {
    id: u64,
    saved: [RawFd; 2],
}

struct Descriptors {
    owner: Option<Uuid>,
    depth: usize,
    frames: Vec<Frame>,
    next_id: u64,
}

static DESCRIPTORS: Mutex<Descriptors> = Mutex::new(Descriptors {
    owner: None,
    depth: 0,
    frames: Vec::new(),
    next_id: 0,
});
static RELEASED: Condvar = Condvar::new();

fn lock() -> MutexGuard<'static, Descriptors> {
    DESCRIPTORS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_error(op: &str, e: nix::Error) -> StudentboxError {
    StudentboxError::Process(format!("{op} of the standard streams failed: {e}"))
}

/// Files standing in for stdout and stderr, read back incrementally
#[derive(Debug)]
pub(crate) struct Spool {
    files: [File; 2],
    read: Mutex<[u64; 2]>,
}

impl Spool {
    /// Hand everything written to stream `index` since the last call to `sink`
    pub(crate) fn drain(&self, index: usize, mut sink: impl FnMut(&[u8])) {
        let mut read = self
            .read
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut chunk = vec![0u8; CHUNK];
        loop {
            // Positional reads leave the offset shared with fd 1/2 alone
            match self.files[index].read_at(&mut chunk, read[index]) {
                Ok(0) => break,
                Ok(n) => {
                    sink(&chunk[..n]);
                    read[index] += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("reading redirected stream failed: {}", e);
                    break;
                }
            }
        }
    }
}

/// Puts the previous descriptors back when dropped
pub(crate) struct Redirect {
    id: u64,
}

/// Point fds 1 and 2 at fresh spool files for a scope of tree `tree`
pub(crate) fn redirect(tree: Uuid) -> Result<(Redirect, Arc<Spool>)> {
    let mut state = lock();
    while matches!(state.owner, Some(owner) if owner != tree) {
        state = RELEASED
            .wait(state)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }

    let id = state.next_id;
    // Logged before the swap, the logger writes to fd 2 too
    log::trace!("installing stdio frame {} for tree {}", id, tree);
    let _ = io::stdout().flush();
    let (saved, files) = install()?;

    state.owner = Some(tree);
    state.depth += 1;
    state.next_id += 1;
    state.frames.push(Frame { id, saved });

    Ok((
        Redirect { id },
        Arc::new(Spool {
            files,
            read: Mutex::new([0, 0]),
        }),
    ))
}

fn install() -> Result<([RawFd; 2], [File; 2])> {
    let files = [tempfile::tempfile()?, tempfile::tempfile()?];
    let mut saved: Vec<RawFd> = Vec::with_capacity(2);
    for target in TARGETS {
        match dup(target) {
            Ok(fd) => saved.push(fd),
            Err(e) => {
                saved.iter().for_each(|fd| {
                    let _ = close(*fd);
                });
                return Err(to_error("dup", e));
            }
        }
    }
    let saved = [saved[0], saved[1]];

    for (index, target) in TARGETS.into_iter().enumerate() {
        if let Err(e) = dup2(files[index].as_raw_fd(), target) {
            // Undo whatever already moved
            for (done, target) in TARGETS.into_iter().enumerate().take(index) {
                let _ = dup2(saved[done], target);
            }
            saved.iter().for_each(|fd| {
                let _ = close(*fd);
            });
            return Err(to_error("dup2", e));
        }
    }
    Ok((saved, files))
}

impl Drop for Redirect {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        let mut state = lock();
        let Some(pos) = state.frames.iter().position(|f| f.id == self.id) else {
            return;
        };
        let frame = state.frames.remove(pos);

        if pos == state.frames.len() {
            for (index, target) in TARGETS.into_iter().enumerate() {
                if let Err(e) = dup2(frame.saved[index], target) {
                    log::warn!("restoring fd {} failed: {}", target, e);
                }
                let _ = close(frame.saved[index]);
            }
        } else {
            // The frame above saved our spool files; hand it what we saved
            let above = &mut state.frames[pos];
            for index in 0..2 {
                let _ = close(above.saved[index]);
                above.saved[index] = frame.saved[index];
            }
        }
        log::trace!("stdio frame {} restored", self.id);

        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            RELEASED.notify_all();
        }
    }
}
