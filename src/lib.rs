//! # MyOS Kernel Core
//!
//! Single-CPU monolithic kernel core: trap dispatch, physical and virtual
//! memory management, a free-list kernel heap, round-robin process
//! scheduling, message passing and the system-call table.
//!
//! ## Layout
//!
//! | Module       | Responsibility                                          |
//! |--------------|---------------------------------------------------------|
//! | `arch`       | `Platform` seam, interrupt masking, simulated + x86     |
//! | `config`     | `KernelConfig` boot parameters                          |
//! | `interrupts` | IDT gates, 8259 PIC, PIT timer, trap dispatch           |
//! | `drivers`    | PS/2 keyboard scancode translation and line buffer      |
//! | `memory`     | Frame bitmap, two-level paging, heap, bootstrap bump    |
//! | `process`    | Process/thread control blocks, round-robin scheduler    |
//! | `ipc`        | Shared message queue                                    |
//! | `syscalls`   | Call numbers, dispatcher, handlers                      |
//! | `kernel`     | `Kernel` context object, boot sequence, status table    |
//!
//! All hardware access goes through [`arch::Platform`], so the whole core
//! runs unchanged against [`arch::sim::SimulatedPlatform`] on a host.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use core::fmt;

pub mod arch;
pub mod config;
pub mod drivers;
pub mod interrupts;
pub mod ipc;
pub mod kernel;
pub mod memory;
pub mod process;
pub mod syscalls;

pub use arch::Platform;
pub use config::KernelConfig;
pub use kernel::Kernel;

use memory::allocators::core::AllocError;

/// Errors surfaced by kernel entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    OutOfMemory,
    ProcessTableFull,
    NotFound,
    NoCurrentProcess,
    MailboxFull,
    InvalidArgument,
    InvalidAddress,
}

pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::OutOfMemory => write!(f, "out of memory"),
            KernelError::ProcessTableFull => write!(f, "process table full"),
            KernelError::NotFound => write!(f, "not found"),
            KernelError::NoCurrentProcess => write!(f, "no current process"),
            KernelError::MailboxFull => write!(f, "receiver mailbox full"),
            KernelError::InvalidArgument => write!(f, "invalid argument"),
            KernelError::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

impl From<AllocError> for KernelError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::InvalidAddress => KernelError::InvalidAddress,
            AllocError::InvalidSize | AllocError::Overflow => KernelError::InvalidArgument,
        }
    }
}
