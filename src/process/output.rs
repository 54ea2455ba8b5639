/// Bounded output collection for child processes
///
/// Each stream is drained on its own thread so a chatty child never blocks
/// on a full pipe. Bytes beyond the limit are read and discarded, and the
/// stream is marked truncated.
use crate::config::types::OutputIntegrity;
use std::io::{BufReader, Read};
use std::thread::{self, JoinHandle};

const CHUNK_SIZE: usize = 4096;

/// Bytes read from one stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Collected {
    pub bytes: Vec<u8>,
    pub integrity: OutputIntegrity,
}

impl Collected {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Start draining `stream` in the background
pub fn spawn_collector<R: Read + Send + 'static>(stream: R, limit: usize) -> JoinHandle<Collected> {
    thread::spawn(move || collect_stream(stream, limit))
}

/// Join a collector, tolerating a missing stream or a dead collector thread
pub fn join_collector(handle: Option<JoinHandle<Collected>>) -> Collected {
    match handle {
        Some(handle) => handle.join().unwrap_or_else(|_| {
            log::warn!("output collector thread panicked");
            Collected::default()
        }),
        None => Collected::default(),
    }
}

/// Read a stream to its end, keeping at most `limit` bytes
pub fn collect_stream<R: Read>(stream: R, limit: usize) -> Collected {
    let mut reader = BufReader::new(stream);
    let mut collected = Collected::default();
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(collected.bytes.len());
                if n > room {
                    collected.bytes.extend_from_slice(&chunk[..room]);
                    collected.integrity = OutputIntegrity::TruncatedByLimit;
                } else {
                    collected.bytes.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("stopped reading child output: {}", e);
                break;
            }
        }
    }
    collected
}
