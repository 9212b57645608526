use crate::arch::Platform;
use crate::kernel::Kernel;
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

/// Exit current process
pub fn sys_exit<P: Platform>(kernel: &Kernel<P>, status: i32) -> SyscallResult {
    let pid = kernel.current_pid().ok_or(SyscallError::NoProcess)?;
    log::info!("process {} exiting with status {}", pid, status);
    kernel.destroy_process(pid)?;
    kernel.reschedule();
    Ok(0)
}

/// Get current process ID
pub fn sys_getpid<P: Platform>(kernel: &Kernel<P>) -> SyscallResult {
    kernel
        .current_pid()
        .map(|pid| pid as usize)
        .ok_or(SyscallError::NoProcess)
}

pub fn sys_yield<P: Platform>(kernel: &Kernel<P>) -> SyscallResult {
    kernel.yield_now();
    Ok(0)
}

/// Fork current process
pub fn sys_fork() -> SyscallResult {
    // Needs per-process address spaces; every process shares the kernel's.
    Err(SyscallError::NotImplemented)
}

/// Execute a program
pub fn sys_exec(path: *const u8) -> SyscallResult {
    if path.is_null() {
        return Err(SyscallError::InvalidArgument);
    }
    Err(SyscallError::NotImplemented)
}
