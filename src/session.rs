//! Session lifecycle
//!
//! A session owns exactly one screen buffer, one parser, and one shell
//! process behind a [`PtyTransport`]. A dedicated reader thread blocks
//! on the transport's output stream and hands raw chunks to the owning
//! context over a channel; only [`Session::pump`], called from the owner,
//! decodes the bytes and drives the parser. That single-writer handoff is
//! the whole concurrency model: the reader thread never touches the
//! screen.
//!
//! Shutdown is race-free and idempotent: closing the output stream is the
//! only cancellation signal the reader thread sees, and `stop` closes the
//! streams before joining the thread (with a bounded timeout) so the join
//! cannot hang.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::pty::{self, PtyError, PtySize, PtyTransport};
use crate::resize::ViewportMetrics;
use crate::term::{Parser, ScreenBuffer, Snapshot};

/// How long `stop` waits for the reader thread before abandoning it.
const JOIN_TIMEOUT: Duration = Duration::from_millis(500);
const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session was already started")]
    AlreadyStarted,

    #[error(transparent)]
    Pty(#[from] PtyError),
}

/// One-way lifecycle; a stopped session is never restarted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Running,
    Stopped,
}

/// Callback invoked from the reader thread after new output is queued,
/// so a UI can schedule a repaint of the owner context.
pub type WakeFn = Arc<dyn Fn() + Send + Sync>;

/// A shell session: screen, parser, transport and reader thread.
pub struct Session {
    config: Config,
    state: SessionState,
    screen: ScreenBuffer,
    parser: Parser,
    size: PtySize,
    transport: Option<Box<dyn PtyTransport>>,
    reader_thread: Option<JoinHandle<()>>,
    chunks: Option<Receiver<Vec<u8>>>,
    /// Incomplete UTF-8 tail carried between chunks.
    pending_utf8: Vec<u8>,
    wake: Option<WakeFn>,
}

impl Session {
    /// Create a session with its screen and parser; no process is
    /// spawned until [`start`](Self::start).
    pub fn new(config: Config) -> Self {
        let size = PtySize::default();
        let screen = ScreenBuffer::new(size.rows as usize, size.cols as usize, config.scrollback_limit);
        Self {
            config,
            state: SessionState::NotStarted,
            screen,
            parser: Parser::new(),
            size,
            transport: None,
            reader_thread: None,
            chunks: None,
            pending_utf8: Vec::new(),
            wake: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    pub fn size(&self) -> PtySize {
        self.size
    }

    /// Register the repaint wake-up called from the reader thread.
    /// Must be set before `start` to take effect.
    pub fn set_wake(&mut self, wake: WakeFn) {
        self.wake = Some(wake);
    }

    /// Spawn the shell on a fresh pseudo console of `size` and start the
    /// reader thread. Fails without leaking anything half-initialized.
    pub fn start(&mut self, size: PtySize) -> std::result::Result<(), SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        let (transport, reader) = pty::spawn(
            self.config.shell.as_deref(),
            self.config.working_dir.as_deref(),
            size,
        )?;
        self.attach(transport, reader, size);
        info!(cols = size.cols, rows = size.rows, "session started");
        Ok(())
    }

    /// Attach an already-spawned transport instead of the platform one.
    /// This is the seam tests and embedders use to supply their own
    /// stream pair.
    pub fn start_with_transport(
        &mut self,
        transport: Box<dyn PtyTransport>,
        reader: Box<dyn Read + Send>,
        size: PtySize,
    ) -> std::result::Result<(), SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        self.attach(transport, reader, size);
        Ok(())
    }

    fn attach(
        &mut self,
        transport: Box<dyn PtyTransport>,
        reader: Box<dyn Read + Send>,
        size: PtySize,
    ) {
        self.screen.resize(size.rows as usize, size.cols as usize);
        self.size = size;
        self.transport = Some(transport);

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        self.chunks = Some(rx);
        let wake = self.wake.clone();
        self.reader_thread = Some(thread::spawn(move || read_loop(reader, tx, wake)));
        self.state = SessionState::Running;
    }

    /// Drain queued output chunks and apply them to the screen. Returns
    /// true if anything was processed. This is the only place parser and
    /// screen mutation happens for PTY output.
    pub fn pump(&mut self) -> bool {
        let Some(rx) = &self.chunks else {
            return false;
        };

        let mut chunks: Vec<Vec<u8>> = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(chunk) => chunks.push(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Reader thread is gone; whatever it sent is drained.
                    break;
                }
            }
        }

        let processed = !chunks.is_empty();
        for chunk in chunks {
            self.apply_bytes(&chunk);
        }
        processed
    }

    /// Decode a raw chunk as UTF-8 and feed the parser one character at
    /// a time. Incomplete trailing sequences are held for the next
    /// chunk; invalid bytes become U+FFFD.
    fn apply_bytes(&mut self, chunk: &[u8]) {
        self.pending_utf8.extend_from_slice(chunk);
        let mut rest = std::mem::take(&mut self.pending_utf8);
        loop {
            match std::str::from_utf8(&rest) {
                Ok(s) => {
                    self.parser.feed_str(s, &mut self.screen);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    let s = std::str::from_utf8(&rest[..valid]).unwrap_or_default();
                    self.parser.feed_str(s, &mut self.screen);
                    match e.error_len() {
                        Some(bad) => {
                            self.parser.feed('\u{fffd}', &mut self.screen);
                            rest.drain(..valid + bad);
                        }
                        None => {
                            // Sequence cut at the chunk boundary.
                            self.pending_utf8 = rest.split_off(valid);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Forward keystroke bytes to the shell. A no-op (not an error) when
    /// the session is not running; mid-session write failures are silent,
    /// the session simply ends.
    pub fn write(&mut self, data: &[u8]) {
        if self.state != SessionState::Running {
            return;
        }
        if let Some(transport) = &mut self.transport {
            if let Err(e) = transport.write(data) {
                debug!(error = %e, "pty write failed");
            }
        }
    }

    /// Resize the screen and the pseudo console. A no-op unless running.
    pub fn resize(&mut self, size: PtySize) -> std::result::Result<(), SessionError> {
        if self.state != SessionState::Running || size == self.size {
            return Ok(());
        }
        self.screen.resize(size.rows as usize, size.cols as usize);
        self.size = size;
        if let Some(transport) = &mut self.transport {
            transport.resize(size)?;
        }
        Ok(())
    }

    /// Recompute the grid from viewport metrics and resize only if the
    /// dimensions actually changed.
    pub fn resize_to_fit(
        &mut self,
        metrics: &ViewportMetrics,
    ) -> std::result::Result<(), SessionError> {
        self.resize(metrics.grid_size())
    }

    /// Tear the session down. Idempotent, safe to call from a different
    /// context than `start`, and never hangs: streams are closed before
    /// the reader thread is joined, and the join is bounded.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        let was_running = self.state == SessionState::Running;
        self.state = SessionState::Stopped;

        if let Some(mut transport) = self.transport.take() {
            transport.close_input();
            transport.close_output();

            if let Some(handle) = self.reader_thread.take() {
                let deadline = Instant::now() + JOIN_TIMEOUT;
                while !handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(JOIN_POLL);
                }
                if handle.is_finished() {
                    let _ = handle.join();
                } else {
                    // Best effort: abandon the thread, keep tearing down.
                    debug!("reader thread did not exit in time");
                }
            }

            transport.terminate_child();
            transport.release();
        }
        self.chunks = None;
        if was_running {
            info!("session stopped");
        }
    }

    /// Coherent read-only copy of the displayed grid for rendering.
    pub fn snapshot(&self) -> Snapshot {
        self.screen.snapshot()
    }

    pub fn scroll_view_up(&mut self, n: usize) {
        self.screen.scroll_view_up(n);
    }

    pub fn scroll_view_down(&mut self, n: usize) {
        self.screen.scroll_view_down(n);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reader-loop body: block on the stream, forward chunks, exit quietly
/// on end-of-stream or error. Pipe errors are a normal end-of-session
/// signal, not a failure.
fn read_loop(mut reader: Box<dyn Read + Send>, tx: Sender<Vec<u8>>, wake: Option<WakeFn>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                trace!(bytes = n, "pty output");
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
                if let Some(wake) = &wake {
                    wake();
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "pty read ended");
                break;
            }
        }
    }
    trace!("reader loop exited");
}
