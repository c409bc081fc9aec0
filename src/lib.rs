//! ptyterm - embedded terminal emulator core
//!
//! Spawns a shell attached to an OS pseudo terminal, interprets its
//! output stream as VT100/ANSI/xterm control sequences, and maintains a
//! live character grid a renderer can read at any time. Keystrokes flow
//! back to the shell as raw bytes.
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── PtyTransport (ConPTY on Windows, openpty/fork elsewhere)
//! │   └── reader thread ──chunks──▶ owner context
//! ├── Parser (escape-sequence state machine)
//! └── ScreenBuffer (cell grid, cursor, scroll region, scrollback)
//! ```
//!
//! The reader thread only moves bytes; all screen mutation happens on
//! the owning context via [`Session::pump`]. Renderers read a coherent
//! [`Snapshot`] instead of the live grid.
//!
//! # Quick start
//!
//! ```no_run
//! use ptyterm::{Config, PtySize, Session};
//!
//! let mut session = Session::new(Config::default());
//! session.start(PtySize::new(80, 24))?;
//! session.write(b"ls\r");
//! // ... on the owner context, whenever woken:
//! session.pump();
//! let snapshot = session.snapshot();
//! session.stop();
//! # Ok::<(), ptyterm::SessionError>(())
//! ```

pub mod config;
pub mod pty;
pub mod resize;
pub mod session;
pub mod term;

pub use config::{Config, ConfigError};
pub use pty::{PtyError, PtySize, PtyTransport};
pub use resize::ViewportMetrics;
pub use session::{Session, SessionError, SessionState, WakeFn};
pub use term::{Attr, AttrFlags, Cell, Palette, Parser, Rgb, ScreenBuffer, Snapshot};
