//! # I/O System Call Handlers
//!
//! ## File Descriptors
//!
//! | FD | Stream | Implementation  |
//! |----|--------|-----------------|
//! | 0  | stdin  | Keyboard buffer |
//! | 1  | stdout | Console         |
//! | 2  | stderr | Console         |
//!
//! There is no file system, so `open` and `close` always fail with
//! `NotImplemented`.

use crate::arch::Platform;
use crate::kernel::Kernel;
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

const STDIN: usize = 0;
const STDOUT: usize = 1;
const STDERR: usize = 2;

/// Reads keyboard input into `buf`, stopping after a newline.
pub fn sys_read<P: Platform>(
    kernel: &Kernel<P>,
    fd: usize,
    buf: *mut u8,
    count: usize,
) -> SyscallResult {
    if fd != STDIN {
        return Err(SyscallError::BadFileDescriptor);
    }
    if buf.is_null() {
        return Err(SyscallError::InvalidArgument);
    }

    // SAFETY: the caller hands over `count` writable bytes at `buf` in the
    // shared identity-mapped address space.
    let buf = unsafe { core::slice::from_raw_parts_mut(buf, count) };
    for (i, slot) in buf.iter_mut().enumerate() {
        *slot = kernel.read_char();
        if *slot == b'\n' {
            return Ok(i + 1);
        }
    }
    Ok(count)
}

/// Write to file descriptor
pub fn sys_write<P: Platform>(
    kernel: &Kernel<P>,
    fd: usize,
    buf: *const u8,
    count: usize,
) -> SyscallResult {
    if fd != STDOUT && fd != STDERR {
        return Err(SyscallError::BadFileDescriptor);
    }
    if buf.is_null() {
        return Err(SyscallError::InvalidArgument);
    }

    // SAFETY: the caller hands over `count` readable bytes at `buf`.
    let bytes = unsafe { core::slice::from_raw_parts(buf, count) };
    kernel.console_write(bytes);
    Ok(count)
}

/// Open a file
pub fn sys_open(path: *const u8, _flags: usize, _mode: usize) -> SyscallResult {
    if path.is_null() {
        return Err(SyscallError::InvalidArgument);
    }
    Err(SyscallError::NotImplemented)
}

/// Close a file descriptor
pub fn sys_close(_fd: usize) -> SyscallResult {
    Err(SyscallError::NotImplemented)
}
