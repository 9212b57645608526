use core::fmt;

use crate::arch::Platform;
use crate::kernel::Kernel;
use crate::syscalls::handlers;
use crate::syscalls::numbers::SyscallNumber;
use crate::KernelError;

/// System call result type
pub type SyscallResult = Result<usize, SyscallError>;

/// System call errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidCall,
    NotFound,
    NoProcess,
    BadFileDescriptor,
    WouldBlock,
    NoMemory,
    InvalidArgument,
    NotImplemented,
}

impl SyscallError {
    pub fn as_errno(self) -> isize {
        match self {
            Self::InvalidCall => -1,
            Self::NotFound => -2,          // ENOENT
            Self::NoProcess => -3,         // ESRCH
            Self::BadFileDescriptor => -9, // EBADF
            Self::WouldBlock => -11,       // EAGAIN
            Self::NoMemory => -12,         // ENOMEM
            Self::InvalidArgument => -22,  // EINVAL
            Self::NotImplemented => -38,   // ENOSYS
        }
    }
}

impl From<KernelError> for SyscallError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::OutOfMemory | KernelError::ProcessTableFull => Self::NoMemory,
            KernelError::NotFound => Self::NotFound,
            KernelError::NoCurrentProcess => Self::NoProcess,
            KernelError::MailboxFull => Self::WouldBlock,
            KernelError::InvalidArgument | KernelError::InvalidAddress => Self::InvalidArgument,
        }
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.as_errno())
    }
}

/// System call context - the registers saved by the `int 0x80` stub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallContext {
    pub syscall_num: usize,
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
    pub arg4: usize,
}

impl SyscallContext {
    /// `int 0x80` convention:
    ///   rax = syscall number
    ///   rbx = arg0
    ///   rcx = arg1
    ///   rdx = arg2
    ///   rsi = arg3
    ///   rdi = arg4
    pub fn from_registers(
        rax: usize,
        rbx: usize,
        rcx: usize,
        rdx: usize,
        rsi: usize,
        rdi: usize,
    ) -> Self {
        Self {
            syscall_num: rax,
            arg0: rbx,
            arg1: rcx,
            arg2: rdx,
            arg3: rsi,
            arg4: rdi,
        }
    }

    pub fn new(call: SyscallNumber, args: [usize; 5]) -> Self {
        let [arg0, arg1, arg2, arg3, arg4] = args;
        Self {
            syscall_num: call.as_usize(),
            arg0,
            arg1,
            arg2,
            arg3,
            arg4,
        }
    }
}

/// Main syscall dispatcher
pub fn dispatch_syscall<P: Platform>(kernel: &Kernel<P>, ctx: SyscallContext) -> SyscallResult {
    let syscall = SyscallNumber::try_from(ctx.syscall_num)?;

    log::trace!(
        "SYSCALL: {:?}({:#x}, {:#x}, {:#x}, {:#x}, {:#x})",
        syscall,
        ctx.arg0,
        ctx.arg1,
        ctx.arg2,
        ctx.arg3,
        ctx.arg4
    );

    match syscall {
        // I/O Operations
        SyscallNumber::Write => {
            handlers::io::sys_write(kernel, ctx.arg0, ctx.arg1 as *const u8, ctx.arg2)
        }
        SyscallNumber::Read => {
            handlers::io::sys_read(kernel, ctx.arg0, ctx.arg1 as *mut u8, ctx.arg2)
        }
        SyscallNumber::Open => handlers::io::sys_open(ctx.arg0 as *const u8, ctx.arg1, ctx.arg2),
        SyscallNumber::Close => handlers::io::sys_close(ctx.arg0),

        // Process Management
        SyscallNumber::Exit => handlers::process::sys_exit(kernel, ctx.arg0 as i32),
        SyscallNumber::GetPid => handlers::process::sys_getpid(kernel),
        SyscallNumber::Fork => handlers::process::sys_fork(),
        SyscallNumber::Exec => handlers::process::sys_exec(ctx.arg0 as *const u8),
        SyscallNumber::Yield => handlers::process::sys_yield(kernel),

        // Memory Management
        SyscallNumber::Malloc => handlers::memory::sys_malloc(kernel, ctx.arg0),
        SyscallNumber::Free => handlers::memory::sys_free(kernel, ctx.arg0 as *mut u8),

        // Time
        SyscallNumber::Sleep => handlers::time::sys_sleep(kernel, ctx.arg0 as u64),
        SyscallNumber::Uptime => handlers::time::sys_uptime(kernel),

        // Messaging
        SyscallNumber::Send => handlers::ipc::sys_send(
            kernel,
            ctx.arg0 as u32,
            ctx.arg1 as u32,
            ctx.arg2 as *const u8,
            ctx.arg3,
        ),
        SyscallNumber::Receive => handlers::ipc::sys_receive(
            kernel,
            ctx.arg0 as *mut u8,
            ctx.arg1,
            ctx.arg2 as *mut u32,
            ctx.arg3 as *mut u32,
        ),
    }
}

impl<P: Platform> Kernel<P> {
    /// Runs one system call and folds the outcome into the value returned
    /// in `rax`: a non-negative result or a negative errno.
    pub fn syscall(&self, ctx: SyscallContext) -> isize {
        match dispatch_syscall(self, ctx) {
            Ok(value) => value as isize,
            Err(err) => {
                log::debug!("syscall {} failed: {}", ctx.syscall_num, err);
                err.as_errno()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(SyscallError::InvalidCall.as_errno(), -1);
        assert_eq!(SyscallError::BadFileDescriptor.as_errno(), -9);
        assert_eq!(SyscallError::NotImplemented.as_errno(), -38);
    }

    #[test]
    fn test_kernel_error_conversion() {
        assert_eq!(
            SyscallError::from(KernelError::MailboxFull),
            SyscallError::WouldBlock
        );
        assert_eq!(
            SyscallError::from(KernelError::NoCurrentProcess),
            SyscallError::NoProcess
        );
        assert_eq!(
            SyscallError::from(KernelError::ProcessTableFull),
            SyscallError::NoMemory
        );
    }

    #[test]
    fn test_allocator_errors_reach_errnos() {
        use crate::memory::allocators::core::AllocError;

        let errno = |e: AllocError| SyscallError::from(KernelError::from(e)).as_errno();
        assert_eq!(errno(AllocError::InvalidAddress), -22);
        assert_eq!(errno(AllocError::InvalidSize), -22);
        assert_eq!(errno(AllocError::Overflow), -22);
        assert_eq!(SyscallError::from(KernelError::OutOfMemory).as_errno(), -12);
    }

    #[test]
    fn test_register_convention() {
        let ctx = SyscallContext::from_registers(1, 2, 3, 4, 5, 6);
        assert_eq!(ctx, SyscallContext::new(SyscallNumber::Write, [2, 3, 4, 5, 6]));
    }
}
