//! Thread control blocks.
//!
//! Threads are tracked but never scheduled. Each one names its owning
//! process by id only; the process table stays the owner of processes.

use alloc::vec::Vec;

use crate::process::{Pid, ProcessState, Registers, Tid};
use crate::{KernelError, KernelResult};

#[derive(Clone, Debug)]
pub struct Thread {
    pub tid: Tid,
    pub owner: Pid,
    pub state: ProcessState,
    pub registers: Registers,
    pub entry_point: usize,
}

pub struct ThreadTable {
    /// Newest first.
    threads: Vec<Thread>,
    next_tid: Tid,
    capacity: usize,
}

impl ThreadTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            threads: Vec::new(),
            next_tid: 1,
            capacity,
        }
    }

    pub fn create(&mut self, owner: Pid, entry_point: usize) -> KernelResult<Tid> {
        if self.threads.len() >= self.capacity {
            log::warn!("thread table full ({} threads)", self.capacity);
            return Err(KernelError::OutOfMemory);
        }
        let tid = self.next_tid;
        self.next_tid += 1;
        self.threads.insert(
            0,
            Thread {
                tid,
                owner,
                state: ProcessState::Ready,
                registers: Registers {
                    eip: entry_point as u32,
                    ..Registers::default()
                },
                entry_point,
            },
        );
        log::debug!("thread {} created for pid {}", tid, owner);
        Ok(tid)
    }

    pub fn destroy(&mut self, tid: Tid) -> KernelResult<Thread> {
        let index = self
            .threads
            .iter()
            .position(|t| t.tid == tid)
            .ok_or(KernelError::NotFound)?;
        let mut thread = self.threads.remove(index);
        thread.state = ProcessState::Terminated;
        Ok(thread)
    }

    /// Drops every thread owned by `owner`, returning how many went.
    pub fn destroy_owned_by(&mut self, owner: Pid) -> usize {
        let before = self.threads.len();
        self.threads.retain(|t| t.owner != owner);
        before - self.threads.len()
    }

    pub fn get(&self, tid: Tid) -> Option<&Thread> {
        self.threads.iter().find(|t| t.tid == tid)
    }

    pub fn owned_by(&self, owner: Pid) -> impl Iterator<Item = &Thread> + '_ {
        self.threads.iter().filter(move |t| t.owner == owner)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
