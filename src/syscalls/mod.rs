//! # System Calls
//!
//! User code enters through `int 0x80` with the call number in `rax` and up
//! to five arguments in `rbx, rcx, rdx, rsi, rdi`. The result comes back in
//! `rax`: non-negative on success, a negative errno otherwise.
//!
//! | #  | Call    | Arguments                          | Returns           |
//! |----|---------|------------------------------------|-------------------|
//! | 0  | exit    | status                             | 0                 |
//! | 1  | write   | fd, buf, count                     | bytes written     |
//! | 2  | read    | fd, buf, count                     | bytes read        |
//! | 3  | open    | path, flags, mode                  | ENOSYS            |
//! | 4  | close   | fd                                 | ENOSYS            |
//! | 5  | fork    |                                    | ENOSYS            |
//! | 6  | exec    | path                               | ENOSYS            |
//! | 7  | getpid  |                                    | pid               |
//! | 8  | sleep   | ms                                 | 0                 |
//! | 9  | malloc  | size                               | address           |
//! | 10 | free    | address                            | 0                 |
//! | 11 | yield   |                                    | 0                 |
//! | 12 | send    | dest, type, data, length           | 0                 |
//! | 13 | receive | buf, capacity, &sender, &type      | bytes copied      |
//! | 14 | uptime  |                                    | ms since boot     |

pub mod dispatcher;
pub mod handlers;
pub mod numbers;

pub use dispatcher::{dispatch_syscall, SyscallContext, SyscallError, SyscallResult};
pub use numbers::SyscallNumber;
