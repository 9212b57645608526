//! Simulated platform.
//!
//! Stands in for the board on a development host. Port writes, descriptor
//! loads, CR3/CR0 writes, TLB flushes and console bytes are recorded;
//! port reads and interrupts are scripted. Page-table frames are backed by
//! heap allocations keyed on their physical address.
//!
//! `wait_for_interrupt` delivers the oldest scripted IRQ, or a timer tick
//! (IRQ 0) when nothing is queued, so blocking kernel calls always make
//! progress.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spin::Mutex;

use crate::arch::Platform;
use crate::memory::paging::PageTable;
use crate::memory::{PhysAddr, VirtAddr};
use crate::process::ContextSwitch;

/// Fake code address of the entry stub for vector 0.
pub const TRAP_STUB_BASE: usize = 0x0010_8000;
const TRAP_STUB_STRIDE: usize = 0x10;

const KEYBOARD_IRQ: u8 = 1;
const KEYBOARD_DATA_PORT: u16 = 0x60;

pub struct SimulatedPlatform {
    interrupts: AtomicBool,
    paging: AtomicBool,
    waits: AtomicUsize,
    port_writes: Mutex<Vec<(u16, u8)>>,
    port_input: Mutex<BTreeMap<u16, VecDeque<u8>>>,
    pending_irqs: Mutex<VecDeque<u8>>,
    console: Mutex<Vec<u8>>,
    frames: Mutex<BTreeMap<PhysAddr, Box<PageTable>>>,
    idt: Mutex<Option<(usize, u16)>>,
    page_directory: Mutex<Option<PhysAddr>>,
    invalidated: Mutex<Vec<VirtAddr>>,
    switches: Mutex<Vec<ContextSwitch>>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self {
            interrupts: AtomicBool::new(false),
            paging: AtomicBool::new(false),
            waits: AtomicUsize::new(0),
            port_writes: Mutex::new(Vec::new()),
            port_input: Mutex::new(BTreeMap::new()),
            pending_irqs: Mutex::new(VecDeque::new()),
            console: Mutex::new(Vec::new()),
            frames: Mutex::new(BTreeMap::new()),
            idt: Mutex::new(None),
            page_directory: Mutex::new(None),
            invalidated: Mutex::new(Vec::new()),
            switches: Mutex::new(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    pub fn queue_port_input(&self, port: u16, bytes: &[u8]) {
        self.port_input
            .lock()
            .entry(port)
            .or_default()
            .extend(bytes.iter().copied());
    }

    /// Queues an IRQ for the next `wait_for_interrupt`.
    pub fn raise_irq(&self, irq: u8) {
        self.pending_irqs.lock().push_back(irq);
    }

    /// A key press: the scancode on the data port plus IRQ 1.
    pub fn press_key(&self, scancode: u8) {
        self.queue_port_input(KEYBOARD_DATA_PORT, &[scancode]);
        self.raise_irq(KEYBOARD_IRQ);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn port_writes(&self) -> Vec<(u16, u8)> {
        self.port_writes.lock().clone()
    }

    pub fn clear_port_writes(&self) {
        self.port_writes.lock().clear();
    }

    pub fn console_output(&self) -> String {
        String::from_utf8_lossy(&self.console.lock()).into_owned()
    }

    pub fn clear_console(&self) {
        self.console.lock().clear();
    }

    pub fn loaded_idt(&self) -> Option<(usize, u16)> {
        *self.idt.lock()
    }

    pub fn page_directory(&self) -> Option<PhysAddr> {
        *self.page_directory.lock()
    }

    pub fn paging_enabled(&self) -> bool {
        self.paging.load(Ordering::SeqCst)
    }

    pub fn invalidated_pages(&self) -> Vec<VirtAddr> {
        self.invalidated.lock().clone()
    }

    pub fn context_switches(&self) -> Vec<ContextSwitch> {
        self.switches.lock().clone()
    }

    pub fn wait_count(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// Page-table frames touched so far.
    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimulatedPlatform {
    fn inb(&self, port: u16) -> u8 {
        self.port_input
            .lock()
            .get_mut(&port)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(0)
    }

    fn outb(&self, port: u16, value: u8) {
        self.port_writes.lock().push((port, value));
    }

    fn interrupts_enabled(&self) -> bool {
        self.interrupts.load(Ordering::SeqCst)
    }

    fn enable_interrupts(&self) {
        self.interrupts.store(true, Ordering::SeqCst);
    }

    fn disable_interrupts(&self) {
        self.interrupts.store(false, Ordering::SeqCst);
    }

    fn wait_for_interrupt(&self) -> Option<u8> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        Some(self.pending_irqs.lock().pop_front().unwrap_or(0))
    }

    fn halt(&self) -> ! {
        panic!("System Halted");
    }

    fn trap_entry(&self, vector: u8) -> usize {
        TRAP_STUB_BASE + vector as usize * TRAP_STUB_STRIDE
    }

    fn load_idt(&self, base: usize, limit: u16) {
        *self.idt.lock() = Some((base, limit));
    }

    fn load_page_directory(&self, directory: PhysAddr) {
        *self.page_directory.lock() = Some(directory);
    }

    fn enable_paging(&self) {
        self.paging.store(true, Ordering::SeqCst);
    }

    fn invalidate_page(&self, virt: VirtAddr) {
        self.invalidated.lock().push(virt);
    }

    fn page_table(&self, frame: PhysAddr) -> NonNull<PageTable> {
        let mut frames = self.frames.lock();
        let table = frames
            .entry(frame)
            .or_insert_with(|| Box::new(PageTable::new()));
        // Boxed tables never move, so the pointer outlives the lock.
        NonNull::from(&mut **table)
    }

    fn heap_arena(&self, _base: VirtAddr, size: usize) -> Option<&'static mut [u8]> {
        Some(Box::leak(vec![0u8; size].into_boxed_slice()))
    }

    fn console_write(&self, bytes: &[u8]) {
        self.console.lock().extend_from_slice(bytes);
    }

    fn switch_context(&self, switch: &ContextSwitch) {
        self.switches.lock().push(switch.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_port_input() {
        let platform = SimulatedPlatform::new();
        platform.queue_port_input(0x60, &[0x1E, 0x30]);
        assert_eq!(platform.inb(0x60), 0x1E);
        assert_eq!(platform.inb(0x60), 0x30);
        assert_eq!(platform.inb(0x60), 0);
    }

    #[test]
    fn test_wait_delivers_queued_irq_then_ticks() {
        let platform = SimulatedPlatform::new();
        platform.press_key(0x1E);
        assert_eq!(platform.wait_for_interrupt(), Some(1));
        assert_eq!(platform.wait_for_interrupt(), Some(0));
        assert_eq!(platform.wait_count(), 2);
    }

    #[test]
    fn test_page_table_frames_persist() {
        let platform = SimulatedPlatform::new();
        let first = platform.page_table(0x5000);
        unsafe { (*first.as_ptr()).set_entry(3, 0x1234) };
        let again = platform.page_table(0x5000);
        assert_eq!(first, again);
        assert_eq!(unsafe { again.as_ref() }.entry(3), 0x1234);
        assert_eq!(platform.frame_count(), 1);
    }

    #[test]
    #[should_panic(expected = "System Halted")]
    fn test_halt_panics() {
        SimulatedPlatform::new().halt();
    }
}
