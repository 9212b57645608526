//! Heap access for callers of `malloc`/`free`. Blocks come from the kernel
//! heap and are addressed directly, since every process shares the kernel
//! address space.

use core::ptr::NonNull;

use crate::arch::Platform;
use crate::kernel::Kernel;
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

pub fn sys_malloc<P: Platform>(kernel: &Kernel<P>, size: usize) -> SyscallResult {
    if size == 0 {
        return Err(SyscallError::InvalidArgument);
    }
    kernel
        .allocate(size)
        .map(|ptr| ptr.as_ptr() as usize)
        .ok_or(SyscallError::NoMemory)
}

/// Freeing null is a no-op.
pub fn sys_free<P: Platform>(kernel: &Kernel<P>, ptr: *mut u8) -> SyscallResult {
    let Some(ptr) = NonNull::new(ptr) else {
        return Ok(0);
    };
    kernel
        .release(ptr)
        .map_err(|_| SyscallError::InvalidArgument)?;
    Ok(0)
}
