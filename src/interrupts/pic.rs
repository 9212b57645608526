//! # Programmable Interrupt Controller (8259 PIC)
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │◀────│  (Slave)    │
//! │ IRQ 0-7     │     │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! ## Vector Remapping
//!
//! By default IRQ 0-15 overlap the CPU exception vectors. They are moved:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! | Word | Master | Slave | Meaning                          |
//! |------|--------|-------|----------------------------------|
//! | ICW1 | 0x11   | 0x11  | start init, ICW4 follows         |
//! | ICW2 | 0x20   | 0x28  | vector offset                    |
//! | ICW3 | 0x04   | 0x02  | slave on IRQ2 / cascade identity |
//! | ICW4 | 0x01   | 0x01  | 8086 mode                        |

use crate::arch::Platform;

pub const PIC1_COMMAND: u16 = 0x20;
pub const PIC1_DATA: u16 = 0x21;
pub const PIC2_COMMAND: u16 = 0xA0;
pub const PIC2_DATA: u16 = 0xA1;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = 40;
pub const IRQ_COUNT: u8 = 16;

const ICW1_INIT: u8 = 0x11;
const ICW3_MASTER: u8 = 0x04;
const ICW3_SLAVE: u8 = 0x02;
const ICW4_8086: u8 = 0x01;
const EOI: u8 = 0x20;

/// Runs the ICW1-ICW4 sequence on both chips, then unmasks every line.
pub fn remap<P: Platform + ?Sized>(platform: &P) {
    platform.outb(PIC1_COMMAND, ICW1_INIT);
    platform.outb(PIC2_COMMAND, ICW1_INIT);
    platform.outb(PIC1_DATA, PIC_1_OFFSET);
    platform.outb(PIC2_DATA, PIC_2_OFFSET);
    platform.outb(PIC1_DATA, ICW3_MASTER);
    platform.outb(PIC2_DATA, ICW3_SLAVE);
    platform.outb(PIC1_DATA, ICW4_8086);
    platform.outb(PIC2_DATA, ICW4_8086);
    set_masks(platform, 0x00, 0x00);
}

pub fn set_masks<P: Platform + ?Sized>(platform: &P, master: u8, slave: u8) {
    platform.outb(PIC1_DATA, master);
    platform.outb(PIC2_DATA, slave);
}

/// Acknowledges `irq`. Lines 8-15 arrive through the slave, which needs
/// its own EOI before the master's.
pub fn end_of_interrupt<P: Platform + ?Sized>(platform: &P, irq: u8) {
    if irq >= 8 {
        platform.outb(PIC2_COMMAND, EOI);
    }
    platform.outb(PIC1_COMMAND, EOI);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimulatedPlatform;
    use alloc::vec;

    #[test]
    fn test_remap_sequence() {
        let platform = SimulatedPlatform::new();
        remap(&platform);
        assert_eq!(
            platform.port_writes(),
            vec![
                (0x20, 0x11),
                (0xA0, 0x11),
                (0x21, 0x20),
                (0xA1, 0x28),
                (0x21, 0x04),
                (0xA1, 0x02),
                (0x21, 0x01),
                (0xA1, 0x01),
                (0x21, 0x00),
                (0xA1, 0x00),
            ]
        );
    }

    #[test]
    fn test_eoi_master_only_for_low_lines() {
        let platform = SimulatedPlatform::new();
        end_of_interrupt(&platform, 1);
        assert_eq!(platform.port_writes(), vec![(0x20, 0x20)]);
    }

    #[test]
    fn test_eoi_both_chips_for_high_lines() {
        let platform = SimulatedPlatform::new();
        end_of_interrupt(&platform, 12);
        assert_eq!(platform.port_writes(), vec![(0xA0, 0x20), (0x20, 0x20)]);
    }
}
