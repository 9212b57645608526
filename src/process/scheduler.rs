//! Round-robin process scheduler.
//!
//! Processes live in a fixed-capacity slot table. The process list is a
//! singly-linked chain of slot indices starting at `head`; new processes
//! are pushed at the head, so the list runs newest to oldest. `current`
//! is the slot of the running process, if any.

use alloc::vec::Vec;

use crate::memory::PhysAddr;
use crate::process::{ContextSwitch, Pid, Process, ProcessState};
use crate::{KernelError, KernelResult};

struct Slot {
    process: Process,
    next: Option<usize>,
}

pub struct Scheduler {
    slots: Vec<Option<Slot>>,
    head: Option<usize>,
    current: Option<usize>,
    next_pid: Pid,
}

impl Scheduler {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: None,
            current: None,
            next_pid: 1,
        }
    }

    /// Creates the kernel's own process and makes it the running one.
    pub fn init(&mut self, address_space: PhysAddr) -> KernelResult<Pid> {
        let pid = self.create("kernel", 0, address_space)?;
        let index = self.index_of(pid).ok_or(KernelError::NotFound)?;
        self.process_at_mut(index).state = ProcessState::Running;
        self.current = Some(index);
        Ok(pid)
    }

    pub fn create(&mut self, name: &str, entry_point: usize, address_space: PhysAddr) -> KernelResult<Pid> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(KernelError::ProcessTableFull)?;
        let pid = self.next_pid;
        self.next_pid += 1;
        self.slots[index] = Some(Slot {
            process: Process::new(pid, name, entry_point, address_space),
            next: self.head,
        });
        self.head = Some(index);
        log::debug!("created process {} ({})", pid, name);
        Ok(pid)
    }

    /// Unlinks and frees the process. Destroying the running process
    /// leaves no current process until the next reschedule.
    pub fn destroy(&mut self, pid: Pid) -> KernelResult<Process> {
        let index = self.index_of(pid).ok_or(KernelError::NotFound)?;
        let next = self.slot(index).next;

        if self.head == Some(index) {
            self.head = next;
        } else {
            let mut cursor = self.head;
            while let Some(i) = cursor {
                if self.slot(i).next == Some(index) {
                    self.slot_mut(i).next = next;
                    break;
                }
                cursor = self.slot(i).next;
            }
        }
        if self.current == Some(index) {
            self.current = None;
        }

        let mut slot = self.slots[index].take().ok_or(KernelError::NotFound)?;
        slot.process.state = ProcessState::Terminated;
        log::debug!("destroyed process {}", pid);
        Ok(slot.process)
    }

    /// Picks the next `Ready` process after the current one, wrapping to the
    /// head of the list. Returns `None` when the current process keeps
    /// the CPU.
    pub fn reschedule(&mut self) -> Option<ContextSwitch> {
        let current = self.current;
        let mut cursor = match current {
            Some(index) => self.slot(index).next.or(self.head),
            None => self.head,
        };

        let mut chosen = None;
        for _ in 0..self.len() {
            let Some(index) = cursor else { break };
            if Some(index) == current {
                break;
            }
            if self.slot(index).process.state == ProcessState::Ready {
                chosen = Some(index);
                break;
            }
            cursor = self.slot(index).next.or(self.head);
        }
        let next = chosen?;

        let (from, saved) = match current {
            Some(index) => {
                let outgoing = self.process_at_mut(index);
                if outgoing.state == ProcessState::Running {
                    outgoing.state = ProcessState::Ready;
                }
                (Some(outgoing.pid), outgoing.registers)
            }
            None => (None, Default::default()),
        };

        let incoming = self.process_at_mut(next);
        incoming.state = ProcessState::Running;
        let switch = ContextSwitch {
            from,
            to: incoming.pid,
            saved,
            restore: incoming.registers,
            address_space: incoming.address_space,
        };
        self.current = Some(next);
        log::trace!("switch {:?} -> {}", switch.from, switch.to);
        Some(switch)
    }

    /// Takes a process out of the rotation.
    pub fn block(&mut self, pid: Pid) -> KernelResult<()> {
        let index = self.index_of(pid).ok_or(KernelError::NotFound)?;
        self.process_at_mut(index).state = ProcessState::Blocked;
        Ok(())
    }

    pub fn unblock(&mut self, pid: Pid) -> KernelResult<()> {
        let index = self.index_of(pid).ok_or(KernelError::NotFound)?;
        let process = self.process_at_mut(index);
        if process.state != ProcessState::Blocked {
            return Err(KernelError::InvalidArgument);
        }
        process.state = ProcessState::Ready;
        Ok(())
    }

    pub fn current(&self) -> Option<&Process> {
        self.current.map(|index| &self.slot(index).process)
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.current().map(|p| p.pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.index_of(pid).map(|index| &self.slot(index).process)
    }

    /// Processes in list order, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Process> + '_ {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let index = cursor?;
            let slot = self.slot(index);
            cursor = slot.next;
            Some(&slot.process)
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index_of(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|slot| slot.process.pid == pid))
    }

    // Linked indices always refer to occupied slots.
    fn slot(&self, index: usize) -> &Slot {
        match &self.slots[index] {
            Some(slot) => slot,
            None => unreachable!("process list links an empty slot"),
        }
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot {
        match &mut self.slots[index] {
            Some(slot) => slot,
            None => unreachable!("process list links an empty slot"),
        }
    }

    fn process_at_mut(&mut self, index: usize) -> &mut Process {
        &mut self.slot_mut(index).process
    }
}
