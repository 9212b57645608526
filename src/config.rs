//! # Boot Configuration
//!
//! Every tunable the boot sequence reads lives in [`KernelConfig`]. The
//! defaults describe the reference machine: 128 MiB of RAM, the first
//! megabyte reserved, a 16 MiB heap and a 100 Hz tick.
//!
//! | Field                 | Default     | Used by                      |
//! |-----------------------|-------------|------------------------------|
//! | `memory_size`         | 128 MiB     | frame bitmap size            |
//! | `reserved_frames`     | 256         | frames pre-marked used       |
//! | `identity_map_size`   | 4 MiB       | boot-time identity mapping   |
//! | `early_alloc_base`    | 0x300000    | bootstrap bump allocator     |
//! | `early_alloc_size`    | 1 MiB       | bootstrap bump allocator     |
//! | `heap_start`          | 0x100000    | kernel heap arena            |
//! | `heap_size`           | 16 MiB      | kernel heap arena            |
//! | `timer_hz`            | 100         | PIT divisor, sleep, uptime   |
//! | `reschedule_interval` | 10 ticks    | timer-driven reschedule      |
//! | `max_processes`       | 64          | process table capacity       |
//! | `max_threads`         | 256         | thread table capacity        |
//! | `ipc_mailbox_limit`   | `Some(64)`  | per-receiver queue depth     |
//! | `activate_paging`     | `true`      | load CR3 and set CR0.PG      |

use crate::interrupts::timer::PIT_FREQUENCY;
use crate::memory::allocators::free_list::HEADER_SIZE;
use crate::memory::{PhysAddr, VirtAddr, PAGE_SIZE};
use crate::{KernelError, KernelResult};

const MIB: usize = 1024 * 1024;

/// Lowest rate the PIT can be programmed to while keeping a 16-bit divisor.
const MIN_TIMER_HZ: u32 = 19;
/// Rate-generator mode needs a divisor of at least 2.
const MAX_TIMER_HZ: u32 = PIT_FREQUENCY / 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    pub memory_size: usize,
    pub reserved_frames: usize,
    pub identity_map_size: usize,
    pub early_alloc_base: PhysAddr,
    pub early_alloc_size: usize,
    pub heap_start: VirtAddr,
    pub heap_size: usize,
    pub timer_hz: u32,
    pub reschedule_interval: u64,
    pub max_processes: usize,
    pub max_threads: usize,
    /// `None` lets unreceived messages pile up without bound.
    pub ipc_mailbox_limit: Option<usize>,
    pub activate_paging: bool,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            memory_size: 128 * MIB,
            reserved_frames: 256,
            identity_map_size: 4 * MIB,
            early_alloc_base: 0x0030_0000,
            early_alloc_size: MIB,
            heap_start: 0x0010_0000,
            heap_size: 16 * MIB,
            timer_hz: 100,
            reschedule_interval: 10,
            max_processes: 64,
            max_threads: 256,
            ipc_mailbox_limit: Some(64),
            activate_paging: true,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.memory_size / PAGE_SIZE
    }

    pub fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }

    pub fn with_heap_size(mut self, bytes: usize) -> Self {
        self.heap_size = bytes;
        self
    }

    pub fn with_max_processes(mut self, count: usize) -> Self {
        self.max_processes = count;
        self
    }

    pub fn with_mailbox_limit(mut self, limit: Option<usize>) -> Self {
        self.ipc_mailbox_limit = limit;
        self
    }

    pub fn with_paging(mut self, activate: bool) -> Self {
        self.activate_paging = activate;
        self
    }

    /// Rejects combinations the subsystems cannot represent.
    pub fn validate(&self) -> KernelResult<()> {
        let page_aligned = |n: usize| n % PAGE_SIZE == 0;

        if self.memory_size == 0
            || !page_aligned(self.memory_size)
            || self.memory_size as u64 > 1 << 32
        {
            return Err(KernelError::InvalidArgument);
        }
        if self.reserved_frames > self.total_frames() {
            return Err(KernelError::InvalidArgument);
        }
        if !page_aligned(self.identity_map_size)
            || self.identity_map_size as u64 > 1 << 32
            || !page_aligned(self.early_alloc_base as usize)
        {
            return Err(KernelError::InvalidArgument);
        }
        if self.heap_size <= HEADER_SIZE || self.heap_size > u32::MAX as usize {
            return Err(KernelError::InvalidArgument);
        }
        if !(MIN_TIMER_HZ..=MAX_TIMER_HZ).contains(&self.timer_hz)
            || self.reschedule_interval == 0
        {
            return Err(KernelError::InvalidArgument);
        }
        if self.max_processes == 0 || self.max_threads == 0 {
            return Err(KernelError::InvalidArgument);
        }
        if self.ipc_mailbox_limit == Some(0) {
            return Err(KernelError::InvalidArgument);
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
