//! # Physical Page Allocator
//!
//! One bit per 4 KiB frame, 32 frames per bitmap word. A set bit means the
//! frame is in use. Allocation is a linear scan for the lowest clear bit,
//! so it is deterministic: the same sequence of calls always yields the
//! same frames.

use alloc::vec;
use alloc::vec::Vec;

use crate::memory::allocators::core::{align_down, align_up, AllocError};
use crate::memory::paging::FrameSource;
use crate::memory::{PhysAddr, PAGE_SIZE};

const BITS_PER_WORD: usize = 32;

#[derive(Debug)]
pub struct PhysicalPageAllocator {
    bitmap: Vec<u32>,
    total_pages: usize,
    used_pages: usize,
}

impl PhysicalPageAllocator {
    /// Builds the bitmap and claims the first `reserved` frames, which
    /// cover low memory the kernel never hands out.
    pub fn new(total_pages: usize, reserved: usize) -> Self {
        let words = total_pages.div_ceil(BITS_PER_WORD);
        let mut allocator = Self {
            bitmap: vec![0; words],
            total_pages,
            used_pages: 0,
        };
        for _ in 0..reserved.min(total_pages) {
            let _ = allocator.allocate();
        }
        allocator
    }

    fn is_set(&self, index: usize) -> bool {
        self.bitmap[index / BITS_PER_WORD] & (1 << (index % BITS_PER_WORD)) != 0
    }

    fn set(&mut self, index: usize) {
        self.bitmap[index / BITS_PER_WORD] |= 1 << (index % BITS_PER_WORD);
    }

    fn clear(&mut self, index: usize) {
        self.bitmap[index / BITS_PER_WORD] &= !(1 << (index % BITS_PER_WORD));
    }

    /// Claims the lowest free frame. `None` is the out-of-frames signal.
    pub fn allocate(&mut self) -> Option<PhysAddr> {
        let index = self
            .bitmap
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u32::MAX)
            .map(|(word_index, word)| word_index * BITS_PER_WORD + word.trailing_ones() as usize)
            .filter(|index| *index < self.total_pages);

        match index {
            Some(index) => {
                self.set(index);
                self.used_pages += 1;
                Some((index * PAGE_SIZE) as PhysAddr)
            }
            None => {
                log::warn!("physical frames exhausted");
                None
            }
        }
    }

    /// Returns a frame to the pool.
    pub fn release(&mut self, addr: PhysAddr) -> Result<(), AllocError> {
        let index = addr as usize / PAGE_SIZE;
        if index >= self.total_pages {
            return Err(AllocError::InvalidAddress);
        }
        if !self.is_set(index) {
            log::warn!("release of free frame {:#x} ignored", addr);
            return Err(AllocError::InvalidAddress);
        }
        self.clear(index);
        self.used_pages -= 1;
        Ok(())
    }

    /// Marks every frame overlapping `[start, end)` as used. Frames already
    /// in use are left alone. Returns how many frames were newly claimed.
    pub fn reserve_range(&mut self, start: u64, end: u64) -> usize {
        let first = align_down(start as usize, PAGE_SIZE) / PAGE_SIZE;
        let last = (align_up(end as usize, PAGE_SIZE) / PAGE_SIZE).min(self.total_pages);
        let mut claimed = 0;
        for index in first..last {
            if !self.is_set(index) {
                self.set(index);
                self.used_pages += 1;
                claimed += 1;
            }
        }
        claimed
    }

    pub fn is_allocated(&self, addr: PhysAddr) -> bool {
        let index = addr as usize / PAGE_SIZE;
        index < self.total_pages && self.is_set(index)
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn used_pages(&self) -> usize {
        self.used_pages
    }

    pub fn free_pages(&self) -> usize {
        self.total_pages - self.used_pages
    }

    pub fn total_memory(&self) -> usize {
        self.total_pages * PAGE_SIZE
    }

    pub fn free_memory(&self) -> usize {
        self.free_pages() * PAGE_SIZE
    }

    pub fn used_memory(&self) -> usize {
        self.used_pages * PAGE_SIZE
    }
}

impl FrameSource for PhysicalPageAllocator {
    fn allocate_frame(&mut self) -> Option<PhysAddr> {
        self.allocate()
    }
}
