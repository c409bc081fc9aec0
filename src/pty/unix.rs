//! POSIX pseudo-terminal transport
//!
//! openpty + fork: the child becomes the session leader, wires the slave
//! end to its standard descriptors and execs the shell; the parent keeps
//! the master end as a duplex byte stream.

use std::io::{self, Read};
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;
use std::sync::Arc;

use nix::libc;
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, setsid, ForkResult, Pid};

use super::{PtyError, PtySize, PtyTransport, Result};

fn winsize(size: PtySize) -> Winsize {
    Winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}

/// Owner-side state: the master fd (shared with the reader thread via
/// `Arc`) and the child pid.
pub struct UnixPtyTransport {
    master: Option<Arc<OwnedFd>>,
    child: Pid,
    reaped: bool,
}

/// Blocking read half for the reader thread. EOF and EIO (slave side
/// gone after the child exited) both end the stream.
struct MasterReader {
    master: Arc<OwnedFd>,
}

impl Read for MasterReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match nix::unistd::read(self.master.as_raw_fd(), buf) {
            Ok(n) => Ok(n),
            Err(nix::errno::Errno::EIO) => Ok(0),
            Err(nix::errno::Errno::EINTR) => Err(io::ErrorKind::Interrupted.into()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fork a shell attached to a fresh PTY pair of the given size.
pub fn spawn_shell(
    shell: Option<&str>,
    working_dir: Option<&Path>,
    size: PtySize,
) -> Result<(Box<dyn PtyTransport>, Box<dyn Read + Send>)> {
    let pty = openpty(Some(&winsize(size)), None)
        .map_err(|e| PtyError::Transport(e.into()))?;

    let shell = shell
        .map(str::to_owned)
        .or_else(|| std::env::var("SHELL").ok())
        .unwrap_or_else(|| "/bin/sh".to_string());

    match unsafe { fork() }.map_err(|e| PtyError::Spawn(e.into()))? {
        ForkResult::Parent { child } => {
            drop(pty.slave);
            let master = Arc::new(pty.master);
            let transport = UnixPtyTransport {
                master: Some(Arc::clone(&master)),
                child,
                reaped: false,
            };
            let reader = MasterReader { master };
            Ok((Box::new(transport), Box::new(reader)))
        }
        ForkResult::Child => {
            // Only async-signal-safe work between fork and exec.
            drop(pty.master);
            let slave_fd = pty.slave.as_raw_fd();

            let _ = setsid();
            unsafe {
                libc::ioctl(slave_fd, libc::TIOCSCTTY, 0);
            }
            let _ = nix::unistd::dup2(slave_fd, 0);
            let _ = nix::unistd::dup2(slave_fd, 1);
            let _ = nix::unistd::dup2(slave_fd, 2);
            drop(pty.slave);

            if let Some(dir) = working_dir {
                let _ = nix::unistd::chdir(dir);
            }

            if let Ok(prog) = std::ffi::CString::new(shell) {
                let _ = execvp(&prog, std::slice::from_ref(&prog));
            }
            unsafe { libc::_exit(1) }
        }
    }
}

impl UnixPtyTransport {
    fn wait_child(&mut self, flag: Option<WaitPidFlag>) {
        if self.reaped {
            return;
        }
        match waitpid(self.child, flag) {
            Ok(WaitStatus::StillAlive) => {}
            Ok(_) | Err(_) => self.reaped = true,
        }
    }
}

impl PtyTransport for UnixPtyTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let Some(master) = &self.master else {
            return Ok(0);
        };
        nix::unistd::write(master.as_ref(), data)
            .map_err(|e| PtyError::Write(e.into()))
    }

    fn resize(&mut self, size: PtySize) -> Result<()> {
        let Some(master) = &self.master else {
            return Ok(());
        };
        let ws = winsize(size);
        let rc = unsafe { libc::ioctl(master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if rc == -1 {
            return Err(PtyError::Resize(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn close_input(&mut self) {
        // The master fd is duplex; it is closed with the output side.
    }

    fn close_output(&mut self) {
        // Closing our Arc alone cannot unblock the reader's read(2), so
        // hang up the line: the child's exit closes the slave side and
        // the blocked read observes EOF.
        if self.master.take().is_some() && !self.reaped {
            let _ = kill(self.child, Signal::SIGHUP);
        }
    }

    fn child_running(&mut self) -> bool {
        self.wait_child(Some(WaitPidFlag::WNOHANG));
        !self.reaped
    }

    fn terminate_child(&mut self) {
        if self.child_running() {
            let _ = kill(self.child, Signal::SIGKILL);
            self.wait_child(None);
        }
    }

    fn release(&mut self) {
        self.master = None;
        self.wait_child(Some(WaitPidFlag::WNOHANG));
    }
}

impl Drop for UnixPtyTransport {
    fn drop(&mut self) {
        self.close_output();
        self.terminate_child();
        self.release();
    }
}
