//! # System Call Handlers
//!
//! ## Modules
//!
//! - `io`: console read/write, open/close stubs
//! - `process`: exit, getpid, yield, fork/exec stubs
//! - `memory`: malloc, free
//! - `time`: sleep, uptime
//! - `ipc`: send, receive
//!
//! ## Handler Signature
//!
//! Each handler takes the kernel plus typed register arguments:
//! ```ignore
//! fn sys_write<P: Platform>(kernel: &Kernel<P>, fd: usize, buf: *const u8, count: usize) -> SyscallResult
//! ```

pub mod io;
pub mod ipc;
pub mod memory;
pub mod process;
pub mod time;
