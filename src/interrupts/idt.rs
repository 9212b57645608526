//! Interrupt Descriptor Table.
//!
//! 256 gates in the long-mode 16-byte layout:
//!
//! ```text
//! ┌────────────┬──────────┬─────┬───────────┬────────────┬─────────────┬──────────┐
//! │ offset 0-15│ selector │ ist │ type_attr │ offset16-31│ offset 32-63│ reserved │
//! │   u16      │   u16    │ u8  │    u8     │    u16     │     u32     │   u32    │
//! └────────────┴──────────┴─────┴───────────┴────────────┴─────────────┴──────────┘
//! ```
//!
//! `type_attr` 0x8E = present, ring 0, interrupt gate.

use core::mem::size_of;

use crate::arch::Platform;

pub const IDT_ENTRIES: usize = 256;
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

const GATE_PRESENT: u8 = 0x80;
const GATE_TYPE_INTERRUPT: u8 = 0x0E;
pub const INTERRUPT_GATE: u8 = GATE_PRESENT | GATE_TYPE_INTERRUPT;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct GateDescriptor {
    offset_low: u16,
    selector: u16,
    ist: u8,
    type_attr: u8,
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

impl GateDescriptor {
    pub const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        ist: 0,
        type_attr: 0,
        offset_mid: 0,
        offset_high: 0,
        reserved: 0,
    };

    pub fn interrupt_gate(handler: usize) -> Self {
        let handler = handler as u64;
        Self {
            offset_low: handler as u16,
            selector: KERNEL_CODE_SELECTOR,
            ist: 0,
            type_attr: INTERRUPT_GATE,
            offset_mid: (handler >> 16) as u16,
            offset_high: (handler >> 32) as u32,
            reserved: 0,
        }
    }

    pub fn handler_address(&self) -> usize {
        (self.offset_low as u64 | (self.offset_mid as u64) << 16 | (self.offset_high as u64) << 32)
            as usize
    }

    pub fn is_present(&self) -> bool {
        self.type_attr & GATE_PRESENT != 0
    }

    pub fn selector(&self) -> u16 {
        self.selector
    }

    pub fn type_attr(&self) -> u8 {
        self.type_attr
    }

    /// Descriptor privilege level.
    pub fn dpl(&self) -> u8 {
        (self.type_attr >> 5) & 0x3
    }
}

#[repr(C, align(16))]
pub struct InterruptDescriptorTable {
    entries: [GateDescriptor; IDT_ENTRIES],
}

impl InterruptDescriptorTable {
    pub const fn new() -> Self {
        Self {
            entries: [GateDescriptor::MISSING; IDT_ENTRIES],
        }
    }

    pub fn clear(&mut self) {
        self.entries.fill(GateDescriptor::MISSING);
    }

    /// Installs a present, ring-0 interrupt gate for `vector`.
    pub fn set_gate(&mut self, vector: u8, handler: usize) {
        self.entries[vector as usize] = GateDescriptor::interrupt_gate(handler);
    }

    pub fn gate(&self, vector: u8) -> &GateDescriptor {
        &self.entries[vector as usize]
    }

    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|g| g.is_present()).count()
    }

    /// Base address and limit for `lidt`.
    pub fn pointer(&self) -> (usize, u16) {
        (self as *const Self as usize, (size_of::<Self>() - 1) as u16)
    }

    pub fn load<P: Platform + ?Sized>(&self, platform: &P) {
        let (base, limit) = self.pointer();
        platform.load_idt(base, limit);
    }
}

impl Default for InterruptDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// EXCEPTION NAMES
// ============================================================================

pub const EXCEPTION_MESSAGES: [&str; 19] = [
    "Divide by Zero",
    "Debug",
    "Non Maskable Interrupt",
    "Breakpoint",
    "Into Detected Overflow",
    "Out of Bounds",
    "Invalid Opcode",
    "No Coprocessor",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Bad TSS",
    "Segment Not Present",
    "Stack Fault",
    "General Protection Fault",
    "Page Fault",
    "Unknown Interrupt",
    "Coprocessor Fault",
    "Alignment Check",
    "Machine Check",
];

pub fn exception_message(vector: u8) -> &'static str {
    EXCEPTION_MESSAGES
        .get(vector as usize)
        .copied()
        .unwrap_or("Reserved Exception")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_layout_is_sixteen_bytes() {
        assert_eq!(size_of::<GateDescriptor>(), 16);
        assert_eq!(size_of::<InterruptDescriptorTable>(), 4096);
    }

    #[test]
    fn test_gate_encodes_handler_and_attributes() {
        let gate = GateDescriptor::interrupt_gate(0xFFFF_8000_1234_5678);
        assert_eq!(gate.handler_address(), 0xFFFF_8000_1234_5678);
        assert_eq!(gate.selector(), 0x08);
        assert_eq!(gate.type_attr(), 0x8E);
        assert_eq!(gate.dpl(), 0);
        assert!(gate.is_present());
    }

    #[test]
    fn test_set_gate_and_clear() {
        let mut idt = InterruptDescriptorTable::new();
        assert_eq!(idt.present_count(), 0);
        idt.set_gate(0x80, 0x1000);
        assert!(idt.gate(0x80).is_present());
        assert!(!idt.gate(0x81).is_present());
        idt.clear();
        assert_eq!(idt.present_count(), 0);
    }

    #[test]
    fn test_pointer_limit() {
        let idt = InterruptDescriptorTable::new();
        assert_eq!(idt.pointer().1, 4095);
    }

    #[test]
    fn test_exception_messages() {
        assert_eq!(exception_message(0), "Divide by Zero");
        assert_eq!(exception_message(14), "Page Fault");
        assert_eq!(exception_message(18), "Machine Check");
        assert_eq!(exception_message(19), "Reserved Exception");
        assert_eq!(exception_message(31), "Reserved Exception");
    }
}
