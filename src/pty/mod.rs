//! Pseudo-terminal transport
//!
//! The OS-facing side of a session: allocate a pseudo console, spawn the
//! shell attached to it, and expose the byte streams. The concrete
//! mechanism (Windows ConPTY, POSIX openpty/fork) sits behind the
//! [`PtyTransport`] trait so the parser and screen stay platform-free.

use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::spawn_shell;

#[cfg(windows)]
mod conpty;
#[cfg(windows)]
pub use conpty::spawn_shell;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to allocate pseudo-terminal transport: {0}")]
    Transport(#[source] io::Error),

    #[error("failed to spawn shell process: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to resize pseudo-terminal: {0}")]
    Resize(#[source] io::Error),

    #[error("failed to write to pseudo-terminal: {0}")]
    Write(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// Grid dimensions of the pseudo console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PtySize {
    pub cols: u16,
    pub rows: u16,
}

impl PtySize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
        }
    }
}

impl Default for PtySize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Owner-side handle to a spawned pseudo console.
///
/// The read half of the pair returned by [`spawn_shell`] lives on the
/// reader thread; this trait covers everything else. Teardown methods
/// are idempotent and run in a fixed order from `Session::stop`:
/// `close_input`, `close_output` (which unblocks a pending read), then
/// `terminate_child` and `release`.
pub trait PtyTransport: Send {
    /// Forward keystroke bytes to the shell's input.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Propagate a new grid size to the pseudo console.
    fn resize(&mut self, size: PtySize) -> Result<()>;

    /// Close the shell's input stream.
    fn close_input(&mut self);

    /// Close the output stream, causing the reader thread's blocking
    /// read to observe end-of-stream.
    fn close_output(&mut self);

    /// Whether the child process is still alive.
    fn child_running(&mut self) -> bool;

    /// Forcibly terminate the child if it is still alive.
    fn terminate_child(&mut self);

    /// Close any remaining OS handles. Safe to call more than once.
    fn release(&mut self);
}

/// Spawn the platform shell attached to a fresh pseudo console.
///
/// `shell` overrides the platform default (`cmd.exe` / `$SHELL`);
/// `working_dir` is used when it names an existing directory and falls
/// back to the platform default otherwise. Returns the owner-side
/// transport and the output stream for the reader thread. On failure
/// every already-acquired handle is released before the error is
/// returned.
pub fn spawn(
    shell: Option<&str>,
    working_dir: Option<&Path>,
    size: PtySize,
) -> Result<(Box<dyn PtyTransport>, Box<dyn Read + Send>)> {
    let working_dir = working_dir.filter(|dir| dir.is_dir());
    spawn_shell(shell, working_dir, size)
}
