//! # Memory Management
//!
//! | Layer                  | Type                      | Granularity   |
//! |------------------------|---------------------------|---------------|
//! | Physical frames        | `PhysicalPageAllocator`   | 4 KiB frame   |
//! | Virtual address space  | `VirtualMemoryManager`    | 4 KiB page    |
//! | Boot-time scratch      | `BootstrapAllocator`      | 4 bytes       |
//! | Kernel heap            | `Heap`                    | 4 bytes       |
//!
//! [`MemoryManager`] bundles the first three behind one lock; the heap
//! has its own. [`LockedHeap`] puts the same free-list algorithm behind
//! `GlobalAlloc` so `alloc` collections work on bare metal.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

pub mod allocators;
pub mod paging;
pub mod physical;

use allocators::core::{align_up, AllocError};
use allocators::{BootstrapAllocator, Heap};
use paging::{PageFlags, VirtualMemoryManager};
use physical::PhysicalPageAllocator;

use crate::arch::Platform;
use crate::config::KernelConfig;
use crate::KernelResult;

pub const PAGE_SIZE: usize = 4096;

pub type PhysAddr = u32;
pub type VirtAddr = u32;

/// Frame bitmap, boot-time bump allocator and kernel page directory.
pub struct MemoryManager {
    pub physical: PhysicalPageAllocator,
    pub paging: VirtualMemoryManager,
    pub early: BootstrapAllocator,
}

impl MemoryManager {
    pub fn init<P: Platform + ?Sized>(platform: &P, config: &KernelConfig) -> KernelResult<Self> {
        Self::with_physical(platform, config, Self::init_physical(config))
    }

    pub fn init_physical(config: &KernelConfig) -> PhysicalPageAllocator {
        let physical = PhysicalPageAllocator::new(config.total_frames(), config.reserved_frames);
        log::info!(
            "physical memory: {} frames, {} reserved",
            physical.total_pages(),
            physical.used_pages()
        );
        physical
    }

    /// Identity maps low memory on top of an existing frame bitmap. The
    /// tables come from the bootstrap allocator, so the frame counters
    /// still only reflect the reserved region afterwards.
    pub fn with_physical<P: Platform + ?Sized>(
        platform: &P,
        config: &KernelConfig,
        physical: PhysicalPageAllocator,
    ) -> KernelResult<Self> {
        let mut early = BootstrapAllocator::new(config.early_alloc_base, config.early_alloc_size)?;
        let mut paging = VirtualMemoryManager::new(platform, &mut early)?;
        paging.identity_map(
            platform,
            &mut early,
            0,
            config.identity_map_size as u64,
            PageFlags::PRESENT | PageFlags::WRITABLE,
        )?;
        log::info!(
            "identity mapped {} KiB using {} page tables",
            config.identity_map_size / 1024,
            paging.table_count()
        );

        Ok(Self {
            physical,
            paging,
            early,
        })
    }

    /// Maps one page, drawing any new page table from the frame bitmap.
    pub fn map_page<P: Platform + ?Sized>(
        &mut self,
        platform: &P,
        virt: VirtAddr,
        phys: PhysAddr,
        flags: PageFlags,
    ) -> KernelResult<()> {
        self.paging
            .map_page(platform, &mut self.physical, virt, phys, flags)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub total: usize,
    pub free: usize,
    pub used: usize,
    pub heap_used: usize,
    pub heap_total: usize,
}

// ============================================================================
// GLOBAL ALLOCATOR
// ============================================================================

#[cfg(target_os = "none")]
#[global_allocator]
static KERNEL_ALLOCATOR: LockedHeap = LockedHeap::empty();

#[cfg(target_os = "none")]
const KERNEL_HEAP_SIZE: usize = 4 * 1024 * 1024;

#[cfg(target_os = "none")]
#[repr(align(4096))]
struct HeapBuffer([u8; KERNEL_HEAP_SIZE]);

#[cfg(target_os = "none")]
static mut KERNEL_HEAP_BUFFER: HeapBuffer = HeapBuffer([0; KERNEL_HEAP_SIZE]);

/// Hands the static buffer to the global allocator. Call once, first thing.
#[cfg(target_os = "none")]
pub fn init_global_heap() -> Result<(), AllocError> {
    // SAFETY: the buffer is only ever borrowed here, and `LockedHeap::init`
    // refuses a second arena, so the `'static` borrow stays unique.
    let arena: &'static mut [u8] = unsafe { &mut (*ptr::addr_of_mut!(KERNEL_HEAP_BUFFER)).0 };
    KERNEL_ALLOCATOR.init(arena)
}

/// Bytes stashed in front of every `GlobalAlloc` pointer to find the block.
const ALLOC_TAG: usize = core::mem::size_of::<u32>();

pub struct LockedHeap {
    inner: spin::Mutex<Option<Heap<'static>>>,
}

impl LockedHeap {
    pub const fn empty() -> Self {
        Self {
            inner: spin::Mutex::new(None),
        }
    }

    pub fn init(&self, arena: &'static mut [u8]) -> Result<(), AllocError> {
        let mut guard = self.inner.lock();
        if guard.is_some() {
            return Err(AllocError::InvalidAddress);
        }
        *guard = Some(Heap::new(arena)?);
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, |heap| heap.used_size())
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let mut guard = self.inner.lock();
        let Some(heap) = guard.as_mut() else {
            return ptr::null_mut();
        };
        let align = layout.align().max(ALLOC_TAG);
        let Some(request) = layout.size().checked_add(align + ALLOC_TAG) else {
            return ptr::null_mut();
        };
        let Some(raw) = heap.allocate(request.max(1)) else {
            return ptr::null_mut();
        };
        let raw_addr = raw.as_ptr() as usize;
        let aligned = align_up(raw_addr + ALLOC_TAG, align);
        let shift = (aligned - raw_addr) as u32;
        let user = raw.as_ptr().add(aligned - raw_addr);
        // SAFETY: `aligned - ALLOC_TAG >= raw_addr` and the block holds
        // `align + ALLOC_TAG + size` bytes, so both writes stay inside it.
        user.sub(ALLOC_TAG).cast::<u32>().write_unaligned(shift);
        user
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let mut guard = self.inner.lock();
        let Some(heap) = guard.as_mut() else {
            return;
        };
        // SAFETY: `ptr` came from `alloc`, which stored the shift just below it.
        let shift = ptr.sub(ALLOC_TAG).cast::<u32>().read_unaligned() as usize;
        if let Some(raw) = NonNull::new(ptr.sub(shift)) {
            if heap.release(raw).is_err() {
                log::error!("dealloc of unknown pointer {:p}", ptr);
            }
        }
    }
}
