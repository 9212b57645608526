//! # Two-Level Paging
//!
//! A page directory of 1024 entries, each pointing at a page table of
//! 1024 entries, each mapping one 4 KiB page:
//!
//! ```text
//!  31          22 21          12 11           0
//! ┌──────────────┬──────────────┬──────────────┐
//! │ directory ix │   table ix   │    offset    │
//! └──────────────┴──────────────┴──────────────┘
//! ```
//!
//! Entries hold a frame address in the top 20 bits and [`PageFlags`] in the
//! low 12. Table frames come from a [`FrameSource`] and are reached through
//! [`Platform::page_table`]; the manager owns every frame it installs.

use alloc::vec;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::arch::Platform;
use crate::memory::allocators::core::is_aligned;
use crate::memory::{PhysAddr, VirtAddr, PAGE_SIZE};
use crate::{KernelError, KernelResult};

pub const ENTRY_COUNT: usize = 1024;
pub const ADDRESS_MASK: u32 = 0xFFFF_F000;
pub const FLAGS_MASK: u32 = 0x0000_0FFF;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        const HUGE = 1 << 7;
        const GLOBAL = 1 << 8;
    }
}

/// Flags written into directory entries that point at a page table.
pub const TABLE_FLAGS: PageFlags = PageFlags::PRESENT.union(PageFlags::WRITABLE);

/// Supplier of zero-initialisable 4 KiB frames for page tables.
pub trait FrameSource {
    fn allocate_frame(&mut self) -> Option<PhysAddr>;
}

/// A page directory or page table: the same 4 KiB array of entries.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [u32; ENTRY_COUNT],
}

impl PageTable {
    pub const fn new() -> Self {
        Self {
            entries: [0; ENTRY_COUNT],
        }
    }

    pub fn zero(&mut self) {
        self.entries.fill(0);
    }

    pub fn entry(&self, index: usize) -> u32 {
        self.entries[index]
    }

    pub fn set_entry(&mut self, index: usize, value: u32) {
        self.entries[index] = value;
    }

    pub fn present_entries(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| **e & PageFlags::PRESENT.bits() != 0)
            .count()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
pub const fn directory_index(virt: VirtAddr) -> usize {
    (virt >> 22) as usize
}

#[inline]
pub const fn table_index(virt: VirtAddr) -> usize {
    ((virt >> 12) & 0x3FF) as usize
}

fn table<'p, P: Platform + ?Sized>(platform: &'p P, frame: PhysAddr) -> &'p mut PageTable {
    // SAFETY: `frame` was handed to this manager by a FrameSource and is
    // used for nothing but this table. Callers hold the memory lock, so no
    // other reference to the same table exists while this one is alive.
    unsafe { &mut *platform.page_table(frame).as_ptr() }
}

pub struct VirtualMemoryManager {
    directory: PhysAddr,
    /// Frame of the page table behind each directory slot, if any.
    tables: Vec<Option<PhysAddr>>,
}

impl VirtualMemoryManager {
    /// Allocates and clears an empty page directory.
    pub fn new<P, F>(platform: &P, frames: &mut F) -> KernelResult<Self>
    where
        P: Platform + ?Sized,
        F: FrameSource + ?Sized,
    {
        let directory = frames.allocate_frame().ok_or(KernelError::OutOfMemory)?;
        table(platform, directory).zero();
        log::debug!("page directory at {:#x}", directory);
        Ok(Self {
            directory,
            tables: vec![None; ENTRY_COUNT],
        })
    }

    pub fn directory(&self) -> PhysAddr {
        self.directory
    }

    pub fn table_count(&self) -> usize {
        self.tables.iter().filter(|t| t.is_some()).count()
    }

    /// Installs `virt -> phys` with `flags`, creating the page table for the
    /// directory slot on first use. Remapping an already mapped page
    /// overwrites the old entry.
    pub fn map_page<P, F>(
        &mut self,
        platform: &P,
        frames: &mut F,
        virt: VirtAddr,
        phys: PhysAddr,
        flags: PageFlags,
    ) -> KernelResult<()>
    where
        P: Platform + ?Sized,
        F: FrameSource + ?Sized,
    {
        let dir_index = directory_index(virt);
        let table_frame = match self.tables[dir_index] {
            Some(frame) => frame,
            None => {
                let frame = frames.allocate_frame().ok_or(KernelError::OutOfMemory)?;
                table(platform, frame).zero();
                table(platform, self.directory)
                    .set_entry(dir_index, (frame & ADDRESS_MASK) | TABLE_FLAGS.bits());
                self.tables[dir_index] = Some(frame);
                log::trace!("page table {} at {:#x}", dir_index, frame);
                frame
            }
        };
        let entry = (phys & ADDRESS_MASK) | (flags.bits() & FLAGS_MASK);
        table(platform, table_frame).set_entry(table_index(virt), entry);
        Ok(())
    }

    /// Clears the leaf entry for `virt` and flushes it from the TLB. Pages
    /// without a page table are left untouched.
    pub fn unmap_page<P: Platform + ?Sized>(&mut self, platform: &P, virt: VirtAddr) {
        if let Some(frame) = self.tables[directory_index(virt)] {
            table(platform, frame).set_entry(table_index(virt), 0);
            platform.invalidate_page(virt & ADDRESS_MASK);
        }
    }

    /// Raw leaf entry for `virt`, if its page table exists.
    pub fn entry<P: Platform + ?Sized>(&self, platform: &P, virt: VirtAddr) -> Option<u32> {
        let frame = self.tables[directory_index(virt)]?;
        Some(table(platform, frame).entry(table_index(virt)))
    }

    /// Physical address `virt` resolves to, or `None` when unmapped.
    pub fn translate<P: Platform + ?Sized>(&self, platform: &P, virt: VirtAddr) -> Option<PhysAddr> {
        let entry = self.entry(platform, virt)?;
        if entry & PageFlags::PRESENT.bits() == 0 {
            return None;
        }
        Some((entry & ADDRESS_MASK) | (virt & FLAGS_MASK))
    }

    /// Maps `[start, end)` onto itself, page by page.
    pub fn identity_map<P, F>(
        &mut self,
        platform: &P,
        frames: &mut F,
        start: PhysAddr,
        end: u64,
        flags: PageFlags,
    ) -> KernelResult<()>
    where
        P: Platform + ?Sized,
        F: FrameSource + ?Sized,
    {
        if !is_aligned(start as usize, PAGE_SIZE) {
            return Err(KernelError::InvalidAddress);
        }
        let mut page = start as u64;
        while page < end {
            self.map_page(platform, frames, page as u32, page as u32, flags)?;
            page += PAGE_SIZE as u64;
        }
        Ok(())
    }

    /// Loads the directory into CR3 and turns paging on.
    pub fn activate<P: Platform + ?Sized>(&self, platform: &P) {
        platform.load_page_directory(self.directory);
        platform.enable_paging();
    }
}
