//! # Time System Call Handlers
//!
//! - `sys_sleep`: idle for at least the given milliseconds
//! - `sys_uptime`: milliseconds since the timer was armed
//!
//! Resolution is one tick, 10 ms at the default 100 Hz. Requests longer
//! than [`MAX_SLEEP_MS`] are rejected with `InvalidArgument`.

use crate::arch::Platform;
use crate::kernel::Kernel;
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

/// One day.
pub const MAX_SLEEP_MS: u64 = 24 * 60 * 60 * 1000;

/// Sleep for specified milliseconds
pub fn sys_sleep<P: Platform>(kernel: &Kernel<P>, milliseconds: u64) -> SyscallResult {
    if milliseconds > MAX_SLEEP_MS {
        return Err(SyscallError::InvalidArgument);
    }
    kernel.sleep(milliseconds);
    Ok(0)
}

pub fn sys_uptime<P: Platform>(kernel: &Kernel<P>) -> SyscallResult {
    Ok(kernel.uptime_ms() as usize)
}
