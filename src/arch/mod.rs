//! # Hardware Abstraction
//!
//! The kernel core never touches hardware directly. Everything it needs
//! from the CPU and the board goes through [`Platform`]:
//!
//! | Concern              | Methods                                             |
//! |----------------------|-----------------------------------------------------|
//! | Port I/O             | `inb`, `outb`                                       |
//! | Interrupt flag       | `interrupts_enabled`, `enable_/disable_interrupts`  |
//! | Idle / fatal         | `wait_for_interrupt`, `halt`                        |
//! | Descriptor tables    | `trap_entry`, `load_idt`                            |
//! | Paging registers     | `load_page_directory`, `enable_paging`, `invalidate_page` |
//! | Memory windows       | `page_table`, `heap_arena`                          |
//! | Console              | `console_write`                                     |
//! | Scheduling           | `switch_context`                                    |
//!
//! [`sim::SimulatedPlatform`] records every effect for tests and the hosted
//! binary; `x86::X86Platform` drives real hardware.

use core::ptr::NonNull;

use crate::memory::paging::PageTable;
use crate::memory::{PhysAddr, VirtAddr};
use crate::process::ContextSwitch;

pub mod sim;
#[cfg(target_os = "none")]
pub mod x86;

pub trait Platform {
    fn inb(&self, port: u16) -> u8;
    fn outb(&self, port: u16, value: u8);

    fn interrupts_enabled(&self) -> bool;
    fn enable_interrupts(&self);
    fn disable_interrupts(&self);

    /// Idles until an interrupt arrives. Platforms whose interrupts reach the
    /// kernel through trap trampolines return `None`; a platform without real
    /// interrupt delivery returns the IRQ line the caller must dispatch.
    fn wait_for_interrupt(&self) -> Option<u8>;

    /// Stops the CPU for good.
    fn halt(&self) -> !;

    /// Address of the low-level entry stub for `vector`.
    fn trap_entry(&self, vector: u8) -> usize;
    fn load_idt(&self, base: usize, limit: u16);

    fn load_page_directory(&self, directory: PhysAddr);
    fn enable_paging(&self);
    fn invalidate_page(&self, virt: VirtAddr);

    /// Pointer to the 4 KiB page-table frame at physical address `frame`.
    fn page_table(&self, frame: PhysAddr) -> NonNull<PageTable>;

    /// Backing memory for the kernel heap, `size` bytes at `base`.
    fn heap_arena(&self, base: VirtAddr, size: usize) -> Option<&'static mut [u8]>;

    fn console_write(&self, bytes: &[u8]);

    /// Called after the scheduler has picked a new running process.
    fn switch_context(&self, switch: &ContextSwitch);
}

/// Masks interrupts for its lifetime and restores the previous state on
/// drop, so nested guards are harmless.
pub struct InterruptGuard<'a, P: Platform + ?Sized> {
    platform: &'a P,
    restore: bool,
}

impl<'a, P: Platform + ?Sized> InterruptGuard<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        let restore = platform.interrupts_enabled();
        if restore {
            platform.disable_interrupts();
        }
        Self { platform, restore }
    }
}

impl<P: Platform + ?Sized> Drop for InterruptGuard<'_, P> {
    fn drop(&mut self) {
        if self.restore {
            self.platform.enable_interrupts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim::SimulatedPlatform;

    #[test]
    fn test_guard_restores_enabled_state() {
        let platform = SimulatedPlatform::new();
        platform.enable_interrupts();
        {
            let _outer = InterruptGuard::new(&platform);
            assert!(!platform.interrupts_enabled());
            {
                let _inner = InterruptGuard::new(&platform);
                assert!(!platform.interrupts_enabled());
            }
            assert!(!platform.interrupts_enabled());
        }
        assert!(platform.interrupts_enabled());
    }

    #[test]
    fn test_guard_leaves_disabled_state() {
        let platform = SimulatedPlatform::new();
        {
            let _guard = InterruptGuard::new(&platform);
        }
        assert!(!platform.interrupts_enabled());
    }
}
