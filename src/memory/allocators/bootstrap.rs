//! Bootstrap bump allocator.
//!
//! Hands out sequential addresses from a fixed physical base before the
//! frame bitmap and heap exist. Nothing is ever freed.

use crate::memory::allocators::core::{align_up, validate_region, AllocError};
use crate::memory::paging::FrameSource;
use crate::memory::{PhysAddr, PAGE_SIZE};

pub const EARLY_ALIGNMENT: usize = 4;

#[derive(Debug)]
pub struct BootstrapAllocator {
    base: usize,
    next: usize,
    end: usize,
}

impl BootstrapAllocator {
    pub fn new(base: PhysAddr, size: usize) -> Result<Self, AllocError> {
        let base = base as usize;
        validate_region(base, size)?;
        let end = base + size;
        if end as u64 > 1 << 32 {
            return Err(AllocError::Overflow);
        }
        Ok(Self {
            base,
            next: base,
            end,
        })
    }

    /// Returns the next 4-byte aligned address and advances past `size`.
    pub fn allocate(&mut self, size: usize) -> Option<PhysAddr> {
        self.allocate_aligned(size, EARLY_ALIGNMENT)
    }

    pub fn allocate_aligned(&mut self, size: usize, align: usize) -> Option<PhysAddr> {
        let start = align_up(self.next, align);
        let end = start.checked_add(size)?;
        if end > self.end {
            log::error!("bootstrap allocator exhausted ({} bytes requested)", size);
            return None;
        }
        self.next = end;
        Some(start as PhysAddr)
    }

    pub fn used(&self) -> usize {
        self.next - self.base
    }

    pub fn remaining(&self) -> usize {
        self.end - self.next
    }
}

impl FrameSource for BootstrapAllocator {
    fn allocate_frame(&mut self) -> Option<PhysAddr> {
        self.allocate_aligned(PAGE_SIZE, PAGE_SIZE)
    }
}
