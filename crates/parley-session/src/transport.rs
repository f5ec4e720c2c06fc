//! Engine transport: the pipe to a running external solver.
//!
//! [`PipeTransport`] owns a spawned solver subprocess. A background
//! thread reads stdout lines into a bounded channel so that a solver
//! flooding its output buffer can never deadlock against a writer
//! blocked on stdin; the session consumes frames from that channel
//! synchronously, optionally under a deadline. Process exit or stream
//! closure during a read is a [`TransportError::Disconnected`], distinct
//! from an orderly `exit`-driven shutdown.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

use parley_wire::{FrameBuffer, ResponseShape};

use crate::error::TransportError;

/// Cap on buffered stdout lines. A full queue backpressures the reader
/// thread, which in turn backpressures the solver through the pipe.
const LINE_QUEUE_CAP: usize = 256;

/// How long an orderly shutdown waits for the engine to exit on its own
/// before killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Bidirectional, framed connection to a running solver engine.
///
/// Implementations deliver exactly one framed response per `recv` call.
/// The protocol has no request identifiers, so arrival order is the only
/// correlation between commands and responses — which is why the session
/// keeps at most one command in flight.
pub trait Transport: Send {
    /// Write one command line to the engine.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Read the next complete response frame, waiting at most `deadline`
    /// when one is given.
    fn recv(
        &mut self,
        shape: ResponseShape,
        deadline: Option<Duration>,
    ) -> Result<String, TransportError>;

    /// Best-effort kill of the engine. Used when its state is no longer
    /// trusted (timeout, desynchronization).
    fn interrupt(&mut self);

    /// Orderly shutdown after the termination command has been sent.
    fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// Capability for starting an engine connection. Which binary to run,
/// and with which flags, stays with the caller.
pub trait EngineLauncher {
    fn launch(&mut self) -> Result<Box<dyn Transport>, TransportError>;
}

/// The common case: launch the solver as a subprocess from a prepared
/// `std::process::Command`.
impl EngineLauncher for Command {
    fn launch(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(PipeTransport::spawn(self)?))
    }
}

/// Subprocess transport over stdin/stdout pipes, with stderr captured
/// for disconnect diagnostics.
pub struct PipeTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    stderr_tail: Arc<Mutex<String>>,
}

impl PipeTransport {
    pub fn spawn(command: &mut Command) -> Result<Self, TransportError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(TransportError::Spawn)?;

        let stdin = child.stdin.take().ok_or_else(|| pipe_missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| pipe_missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| pipe_missing("stderr"))?;

        let (line_tx, line_rx) = bounded(LINE_QUEUE_CAP);
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                        if line_tx.send(trimmed).is_err() {
                            break;
                        }
                    }
                }
            }
            // Dropping the sender disconnects the channel, which the
            // consumer reports as a lost solver.
        });

        let stderr_tail = Arc::new(Mutex::new(String::new()));
        let tail = Arc::clone(&stderr_tail);
        thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if let Ok(mut tail) = tail.lock() {
                    // Keep only a bounded tail for diagnostics.
                    if tail.len() > 8 * 1024 {
                        tail.clear();
                    }
                    tail.push_str(&line);
                    tail.push('\n');
                }
            }
        });

        tracing::debug!(pid = child.id(), "solver engine started");

        Ok(Self {
            child,
            stdin: Some(stdin),
            lines: line_rx,
            stderr_tail,
        })
    }

    fn disconnect_detail(&self) -> String {
        let tail = self
            .stderr_tail
            .lock()
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if tail.is_empty() {
            "solver process closed its output stream".to_string()
        } else {
            format!("solver process closed its output stream; stderr: {tail}")
        }
    }
}

fn pipe_missing(which: &str) -> TransportError {
    TransportError::Disconnected {
        detail: format!("failed to capture solver {which}"),
    }
}

impl Transport for PipeTransport {
    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let written = match self.stdin.as_mut() {
            Some(stdin) => writeln!(stdin, "{text}").and_then(|()| stdin.flush()),
            None => {
                return Err(TransportError::Disconnected {
                    detail: "solver stdin already closed".to_string(),
                })
            }
        };
        written.map_err(|_| TransportError::Disconnected {
            detail: self.disconnect_detail(),
        })
    }

    fn recv(
        &mut self,
        _shape: ResponseShape,
        deadline: Option<Duration>,
    ) -> Result<String, TransportError> {
        let limit = deadline.map(|d| Instant::now() + d);
        let mut frame = FrameBuffer::new();
        loop {
            let line = match limit {
                Some(at) => self.lines.recv_deadline(at).map_err(|err| match err {
                    RecvTimeoutError::Timeout => TransportError::Timeout,
                    RecvTimeoutError::Disconnected => TransportError::Disconnected {
                        detail: self.disconnect_detail(),
                    },
                })?,
                None => self
                    .lines
                    .recv()
                    .map_err(|_| TransportError::Disconnected {
                        detail: self.disconnect_detail(),
                    })?,
            };
            if let Some(done) = frame.push_line(&line) {
                return Ok(done);
            }
        }
    }

    fn interrupt(&mut self) {
        self.stdin = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        // Closing stdin lets a solver that already received `(exit)`
        // terminate on its own; kill only after the grace period.
        self.stdin = None;
        let waited = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return Ok(()),
                Ok(None) => {
                    if waited.elapsed() > SHUTDOWN_GRACE {
                        let _ = self.child.kill();
                        let _ = self.child.wait();
                        return Ok(());
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl Drop for PipeTransport {
    fn drop(&mut self) {
        // Reap unconditionally; killing an already-exited child is a no-op.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
