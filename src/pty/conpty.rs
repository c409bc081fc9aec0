//! ConPTY transport for Windows
//!
//! Wraps the Windows pseudo console: a pipe pair, `CreatePseudoConsole`,
//! and a shell process bound to the console through a proc-thread
//! attribute list.

use std::io::{self, Read};
use std::path::Path;

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, ERROR_BROKEN_PIPE, ERROR_OPERATION_ABORTED, HANDLE,
};
use windows::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows::Win32::System::Console::{
    ClosePseudoConsole, CreatePseudoConsole, ResizePseudoConsole, COORD, HPCON,
};
use windows::Win32::System::Pipes::CreatePipe;
use windows::Win32::System::Threading::{
    CreateProcessW, DeleteProcThreadAttributeList, InitializeProcThreadAttributeList,
    TerminateProcess, UpdateProcThreadAttribute, WaitForSingleObject,
    EXTENDED_STARTUPINFO_PRESENT, LPPROC_THREAD_ATTRIBUTE_LIST, PROCESS_INFORMATION,
    STARTUPINFOEXW,
};
use windows::Win32::System::IO::CancelIoEx;

use super::{PtyError, PtySize, PtyTransport, Result};

const DEFAULT_SHELL: &str = "cmd.exe";
const PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE: usize = 0x00020016;

fn win_err(e: windows::core::Error) -> io::Error {
    io::Error::from_raw_os_error(e.code().0)
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn coord(size: PtySize) -> COORD {
    COORD {
        X: size.cols as i16,
        Y: size.rows as i16,
    }
}

/// Owner-side ConPTY handles. The output read handle is shared with the
/// reader thread; this side keeps it only to cancel and close it.
pub struct ConPtyTransport {
    hpc: Option<HPCON>,
    input_write: Option<HANDLE>,
    output_read: Option<HANDLE>,
    process: PROCESS_INFORMATION,
    process_open: bool,
}

// Safety: the raw handles are only used behind &mut self, and the reader
// thread touches nothing but the output handle it was given.
unsafe impl Send for ConPtyTransport {}

/// Blocking read half handed to the reader thread. Does not own the
/// handle; the transport closes it during shutdown.
struct ConPtyReader {
    handle: HANDLE,
}

unsafe impl Send for ConPtyReader {}

impl Read for ConPtyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read: u32 = 0;
        unsafe {
            match ReadFile(self.handle, Some(buf), Some(&mut read), None) {
                Ok(()) => Ok(read as usize),
                Err(e)
                    if e.code() == ERROR_BROKEN_PIPE.to_hresult()
                        || e.code() == ERROR_OPERATION_ABORTED.to_hresult() =>
                {
                    // Console closed or read cancelled: end of stream.
                    Ok(0)
                }
                Err(e) => Err(win_err(e)),
            }
        }
    }
}

/// Allocate a pseudo console at `size` and spawn the shell attached to
/// it. Every handle acquired before a failure is closed again before the
/// error is returned.
pub fn spawn_shell(
    shell: Option<&str>,
    working_dir: Option<&Path>,
    size: PtySize,
) -> Result<(Box<dyn PtyTransport>, Box<dyn Read + Send>)> {
    unsafe {
        let mut pty_input_read = HANDLE::default();
        let mut pty_input_write = HANDLE::default();
        let mut pty_output_read = HANDLE::default();
        let mut pty_output_write = HANDLE::default();

        // Input pipe (we write, the console reads).
        CreatePipe(&mut pty_input_read, &mut pty_input_write, None, 0)
            .map_err(|e| PtyError::Transport(win_err(e)))?;

        // Output pipe (the console writes, we read).
        if let Err(e) = CreatePipe(&mut pty_output_read, &mut pty_output_write, None, 0) {
            let _ = CloseHandle(pty_input_read);
            let _ = CloseHandle(pty_input_write);
            return Err(PtyError::Transport(win_err(e)));
        }

        let hpc = match CreatePseudoConsole(coord(size), pty_input_read, pty_output_write, 0) {
            Ok(hpc) => hpc,
            Err(e) => {
                let _ = CloseHandle(pty_input_read);
                let _ = CloseHandle(pty_input_write);
                let _ = CloseHandle(pty_output_read);
                let _ = CloseHandle(pty_output_write);
                return Err(PtyError::Transport(win_err(e)));
            }
        };

        // The console now owns its ends of the pipes.
        let _ = CloseHandle(pty_input_read);
        let _ = CloseHandle(pty_output_write);

        let rollback = |hpc: HPCON| {
            ClosePseudoConsole(hpc);
            let _ = CloseHandle(pty_input_write);
            let _ = CloseHandle(pty_output_read);
        };

        // Bind the console to the child through the attribute list.
        let mut attr_list_size: usize = 0;
        let _ = InitializeProcThreadAttributeList(
            LPPROC_THREAD_ATTRIBUTE_LIST::default(),
            1,
            0,
            &mut attr_list_size,
        );

        let mut attr_list_buffer = vec![0u8; attr_list_size];
        let attr_list = LPPROC_THREAD_ATTRIBUTE_LIST(attr_list_buffer.as_mut_ptr() as *mut _);

        if let Err(e) = InitializeProcThreadAttributeList(attr_list, 1, 0, &mut attr_list_size) {
            rollback(hpc);
            return Err(PtyError::Spawn(win_err(e)));
        }

        if let Err(e) = UpdateProcThreadAttribute(
            attr_list,
            0,
            PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE,
            Some(hpc.0 as *const _),
            std::mem::size_of::<HPCON>(),
            None,
            None,
        ) {
            DeleteProcThreadAttributeList(attr_list);
            rollback(hpc);
            return Err(PtyError::Spawn(win_err(e)));
        }

        let mut startup_info = STARTUPINFOEXW {
            StartupInfo: std::mem::zeroed(),
            lpAttributeList: attr_list,
        };
        startup_info.StartupInfo.cb = std::mem::size_of::<STARTUPINFOEXW>() as u32;

        let mut cmd_wide = wide(shell.unwrap_or(DEFAULT_SHELL));
        let cwd_wide = working_dir.map(|dir| wide(&dir.to_string_lossy()));
        let cwd_ptr = cwd_wide
            .as_ref()
            .map(|w| PCWSTR(w.as_ptr()))
            .unwrap_or(PCWSTR::null());

        let mut process_info = PROCESS_INFORMATION::default();

        let spawned = CreateProcessW(
            PCWSTR::null(),
            PWSTR(cmd_wide.as_mut_ptr()),
            None,
            None,
            false,
            EXTENDED_STARTUPINFO_PRESENT,
            None,
            cwd_ptr,
            &startup_info.StartupInfo,
            &mut process_info,
        );

        DeleteProcThreadAttributeList(attr_list);

        if let Err(e) = spawned {
            rollback(hpc);
            return Err(PtyError::Spawn(win_err(e)));
        }

        let transport = ConPtyTransport {
            hpc: Some(hpc),
            input_write: Some(pty_input_write),
            output_read: Some(pty_output_read),
            process: process_info,
            process_open: true,
        };
        let reader = ConPtyReader {
            handle: pty_output_read,
        };

        Ok((Box::new(transport), Box::new(reader)))
    }
}

impl PtyTransport for ConPtyTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let Some(handle) = self.input_write else {
            return Ok(0);
        };
        let mut written: u32 = 0;
        unsafe {
            WriteFile(handle, Some(data), Some(&mut written), None)
                .map_err(|e| PtyError::Write(win_err(e)))?;
        }
        Ok(written as usize)
    }

    fn resize(&mut self, size: PtySize) -> Result<()> {
        let Some(hpc) = self.hpc else {
            return Ok(());
        };
        unsafe {
            ResizePseudoConsole(hpc, coord(size)).map_err(|e| PtyError::Resize(win_err(e)))?;
        }
        Ok(())
    }

    fn close_input(&mut self) {
        if let Some(handle) = self.input_write.take() {
            unsafe {
                let _ = CloseHandle(handle);
            }
        }
    }

    fn close_output(&mut self) {
        if let Some(handle) = self.output_read.take() {
            unsafe {
                // Unblock a ReadFile in progress before closing.
                let _ = CancelIoEx(handle, None);
                let _ = CloseHandle(handle);
            }
        }
    }

    fn child_running(&mut self) -> bool {
        if !self.process_open {
            return false;
        }
        unsafe { WaitForSingleObject(self.process.hProcess, 0).0 != 0 }
    }

    fn terminate_child(&mut self) {
        if self.child_running() {
            unsafe {
                let _ = TerminateProcess(self.process.hProcess, 1);
            }
        }
    }

    fn release(&mut self) {
        self.close_input();
        self.close_output();
        if let Some(hpc) = self.hpc.take() {
            unsafe {
                ClosePseudoConsole(hpc);
            }
        }
        if self.process_open {
            self.process_open = false;
            unsafe {
                let _ = CloseHandle(self.process.hProcess);
                let _ = CloseHandle(self.process.hThread);
            }
        }
    }
}

impl Drop for ConPtyTransport {
    fn drop(&mut self) {
        self.release();
    }
}
