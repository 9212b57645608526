//! Process and thread control blocks
//!
//! # Lifecycle
//! 1. `create` stamps a fresh id and puts the process at the head of the
//!    list as `Ready`
//! 2. `reschedule` moves one process at a time to `Running`
//! 3. `block`/`unblock` park a process outside the rotation
//! 4. `destroy` unlinks it; ids are never reused
//!
//! Threads live in their own table and are not scheduled.

use core::fmt;

use crate::memory::PhysAddr;

pub mod scheduler;
pub mod thread;

pub use scheduler::Scheduler;
pub use thread::{Thread, ThreadTable};

pub type Pid = u32;
pub type Tid = u32;

pub const NAME_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// General-purpose registers plus instruction pointer and flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub esp: u32,
    pub ebp: u32,
    pub eip: u32,
    pub eflags: u32,
}

/// Bounded process name, truncated on a character boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProcessName {
    bytes: [u8; NAME_LEN],
    len: usize,
}

impl ProcessName {
    pub fn new(name: &str) -> Self {
        let mut len = name.len().min(NAME_LEN - 1);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut bytes = [0u8; NAME_LEN];
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self { bytes, len }
    }

    pub fn as_str(&self) -> &str {
        // Built from a `&str` cut on a char boundary.
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

impl fmt::Debug for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Process {
    pub pid: Pid,
    pub name: ProcessName,
    pub state: ProcessState,
    pub registers: Registers,
    pub entry_point: usize,
    /// Page directory this process runs under.
    pub address_space: PhysAddr,
}

impl Process {
    pub fn new(pid: Pid, name: &str, entry_point: usize, address_space: PhysAddr) -> Self {
        Self {
            pid,
            name: ProcessName::new(name),
            state: ProcessState::Ready,
            registers: Registers::default(),
            entry_point,
            address_space,
        }
    }
}

/// What the platform needs to move the CPU from one process to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextSwitch {
    pub from: Option<Pid>,
    pub to: Pid,
    /// Register snapshot held for the outgoing process.
    pub saved: Registers,
    pub restore: Registers,
    pub address_space: PhysAddr,
}
