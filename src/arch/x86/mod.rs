//! x86_64 hardware behind [`Platform`].
//!
//! The bootloader leaves the CPU in long mode with its own four-level page
//! tables live and all of physical memory mapped at a fixed offset. Kernel
//! page tables are reached through that window. The two-level directory
//! cannot be loaded into CR3 in long mode, so the kernel boots with
//! `activate_paging` off here.

use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Once;
use x86_64::instructions::port::Port;
use x86_64::instructions::tables::lidt;
use x86_64::instructions::{hlt, interrupts, tlb};
use x86_64::structures::DescriptorTablePointer;
use x86_64::VirtAddr as X86VirtAddr;

use crate::arch::Platform;
use crate::kernel::Kernel;
use crate::memory::paging::PageTable;
use crate::memory::{PhysAddr, VirtAddr};
use crate::process::ContextSwitch;

pub mod gdt;
pub mod serial;
pub mod stubs;

/// The running kernel, reachable from the trap trampolines.
pub static KERNEL: Once<Kernel<X86Platform>> = Once::new();

pub const HEAP_ARENA_SIZE: usize = 4 * 1024 * 1024;

#[repr(align(4096))]
struct HeapArena([u8; HEAP_ARENA_SIZE]);

static mut HEAP_ARENA: HeapArena = HeapArena([0; HEAP_ARENA_SIZE]);
static HEAP_ARENA_TAKEN: AtomicBool = AtomicBool::new(false);

pub struct X86Platform {
    physical_memory_offset: u64,
}

impl X86Platform {
    pub fn new(physical_memory_offset: u64) -> Self {
        Self {
            physical_memory_offset,
        }
    }

    /// Port I/O and console only; for traps that arrive before boot.
    pub(crate) fn early() -> Self {
        Self::new(0)
    }
}

impl Platform for X86Platform {
    fn inb(&self, port: u16) -> u8 {
        unsafe { Port::<u8>::new(port).read() }
    }

    fn outb(&self, port: u16, value: u8) {
        unsafe { Port::<u8>::new(port).write(value) }
    }

    fn interrupts_enabled(&self) -> bool {
        interrupts::are_enabled()
    }

    fn enable_interrupts(&self) {
        interrupts::enable();
    }

    fn disable_interrupts(&self) {
        interrupts::disable();
    }

    /// Interrupts arrive through the trampolines, so nothing is returned.
    /// Waiting from inside a trap gate briefly reopens interrupts.
    fn wait_for_interrupt(&self) -> Option<u8> {
        if interrupts::are_enabled() {
            hlt();
        } else {
            interrupts::enable_and_hlt();
            interrupts::disable();
        }
        None
    }

    fn halt(&self) -> ! {
        interrupts::disable();
        loop {
            hlt();
        }
    }

    fn trap_entry(&self, vector: u8) -> usize {
        stubs::entry(vector)
    }

    fn load_idt(&self, base: usize, limit: u16) {
        let pointer = DescriptorTablePointer {
            limit,
            base: X86VirtAddr::new(base as u64),
        };
        // SAFETY: the table lives in the boxed IDT owned by the kernel, which
        // is never dropped once `KERNEL` holds it.
        unsafe { lidt(&pointer) };
    }

    fn load_page_directory(&self, directory: PhysAddr) {
        log::warn!(
            "two-level directory {:#x} not loaded: CPU is in long mode",
            directory
        );
    }

    fn enable_paging(&self) {}

    fn invalidate_page(&self, virt: VirtAddr) {
        tlb::flush(X86VirtAddr::new(virt as u64));
    }

    fn page_table(&self, frame: PhysAddr) -> NonNull<PageTable> {
        let virt = self.physical_memory_offset + frame as u64;
        match NonNull::new(virt as *mut PageTable) {
            Some(table) => table,
            None => panic!("page table frame {:#x} maps to null", frame),
        }
    }

    fn heap_arena(&self, base: VirtAddr, size: usize) -> Option<&'static mut [u8]> {
        if size > HEAP_ARENA_SIZE || HEAP_ARENA_TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        log::debug!("heap arena for {:#x} placed in .bss", base);
        // SAFETY: the flag above hands the arena out at most once.
        let arena = unsafe { &mut (*ptr::addr_of_mut!(HEAP_ARENA)).0 };
        Some(&mut arena[..size])
    }

    fn console_write(&self, bytes: &[u8]) {
        serial::write_bytes(bytes);
    }

    /// Every process shares the kernel stack and address space, so there is
    /// no register state to swap yet.
    fn switch_context(&self, switch: &ContextSwitch) {
        log::trace!("now running pid {}", switch.to);
    }
}
