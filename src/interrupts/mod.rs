//! # Trap Dispatch
//!
//! | Vectors | Source            | Handling                               |
//! |---------|-------------------|----------------------------------------|
//! | 0-31    | CPU exceptions    | message on the console, CPU halted     |
//! | 32-47   | IRQ 0-15 via PIC  | timer, keyboard, others ignored; EOI   |
//! | 0x80    | `int 0x80`        | system-call dispatcher                 |
//!
//! Every other vector has no gate.

use crate::arch::Platform;
use crate::drivers::ps2_keyboard::{self, KeyAction};
use crate::kernel::Kernel;

pub mod idt;
pub mod pic;
pub mod timer;

use idt::{exception_message, GateDescriptor, InterruptDescriptorTable};
use pic::{IRQ_COUNT, PIC_1_OFFSET};

pub const EXCEPTION_COUNT: u8 = 32;
pub const SYSCALL_VECTOR: u8 = 0x80;

const TIMER_IRQ: u8 = 0;
const KEYBOARD_IRQ: u8 = 1;

/// Zeroes `idt`, installs the exception and IRQ gates, remaps the PIC and
/// loads the table.
pub fn install_gates<P: Platform + ?Sized>(platform: &P, idt: &mut InterruptDescriptorTable) {
    idt.clear();
    for vector in 0..EXCEPTION_COUNT {
        idt.set_gate(vector, platform.trap_entry(vector));
    }
    pic::remap(platform);
    for vector in PIC_1_OFFSET..PIC_1_OFFSET + IRQ_COUNT {
        idt.set_gate(vector, platform.trap_entry(vector));
    }
    idt.load(platform);
}

impl<P: Platform> Kernel<P> {
    /// Installs a present ring-0 interrupt gate. Takes effect immediately
    /// since the loaded table is the one being edited.
    pub fn set_gate(&self, vector: u8, handler: usize) {
        self.critical(&self.idt, |idt| idt.set_gate(vector, handler));
    }

    pub fn gate(&self, vector: u8) -> GateDescriptor {
        self.critical(&self.idt, |idt| *idt.gate(vector))
    }

    /// Entry from the trap trampolines for every vector except 0x80.
    pub fn handle_trap(&self, vector: u8) {
        match vector {
            v if v < EXCEPTION_COUNT => self.handle_exception(v),
            v if (PIC_1_OFFSET..PIC_1_OFFSET + IRQ_COUNT).contains(&v) => {
                self.handle_irq(v - PIC_1_OFFSET)
            }
            v => log::warn!("unexpected trap vector {:#x}", v),
        }
    }

    pub fn handle_exception(&self, vector: u8) -> ! {
        let message = exception_message(vector);
        log::error!("exception {}: {}", vector, message);
        self.platform.console_write(b"EXCEPTION: ");
        self.platform.console_write(message.as_bytes());
        self.platform.console_write(b"\nSystem Halted!");
        self.platform.halt()
    }

    /// Services `irq` and acknowledges it at the PIC.
    pub fn handle_irq(&self, irq: u8) {
        match irq {
            TIMER_IRQ => self.timer_tick(),
            KEYBOARD_IRQ => self.keyboard_input(),
            _ => log::trace!("irq {} ignored", irq),
        }
        pic::end_of_interrupt(&self.platform, irq);
    }

    fn timer_tick(&self) {
        if self.timer.tick() {
            self.reschedule();
        }
    }

    fn keyboard_input(&self) {
        let scancode = self.platform.inb(ps2_keyboard::DATA_PORT);
        let action = self.critical(&self.keyboard, |kb| kb.handle_scancode(scancode));
        if let KeyAction::Dropped(c) = action {
            log::trace!("keyboard buffer full, dropped {:#x}", c);
        }
        if let Some(c) = action.echo() {
            self.platform.console_write(&[c]);
        }
    }

    /// Waits for the next interrupt and dispatches it when the platform
    /// hands it back instead of trapping.
    fn idle(&self) {
        if let Some(irq) = self.platform.wait_for_interrupt() {
            self.handle_irq(irq);
        }
    }

    pub fn ticks(&self) -> u64 {
        self.timer.ticks()
    }

    pub fn uptime_ms(&self) -> u64 {
        self.timer.uptime_ms()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.timer.uptime_secs()
    }

    /// Idles until at least `ms` milliseconds worth of ticks have passed.
    pub fn sleep(&self, ms: u64) {
        let target = self.ticks().saturating_add(self.timer.ticks_for_ms(ms));
        while self.ticks() < target {
            self.idle();
        }
    }

    /// Blocks until a typed character is available.
    pub fn read_char(&self) -> u8 {
        loop {
            if let Some(c) = self.try_read_char() {
                return c;
            }
            self.idle();
        }
    }

    pub fn try_read_char(&self) -> Option<u8> {
        self.critical(&self.keyboard, |kb| kb.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimulatedPlatform;
    use crate::config::KernelConfig;

    fn boot() -> Kernel<SimulatedPlatform> {
        let config = KernelConfig::default().with_heap_size(64 * 1024);
        Kernel::boot(SimulatedPlatform::new(), config).unwrap()
    }

    #[test]
    fn test_installed_gates() {
        let kernel = boot();
        for vector in 0..=255u8 {
            let expected = vector < 48 || vector == 0x80;
            assert_eq!(kernel.gate(vector).is_present(), expected, "vector {}", vector);
        }
        let gate = kernel.gate(33);
        assert_eq!(gate.handler_address(), kernel.platform().trap_entry(33));
        assert_eq!(gate.selector(), 0x08);
        assert_eq!(gate.type_attr(), 0x8E);
        assert!(kernel.platform().loaded_idt().is_some());
    }

    #[test]
    fn test_timer_irq_counts_and_acknowledges() {
        let kernel = boot();
        kernel.platform().clear_port_writes();
        kernel.handle_trap(32);
        assert_eq!(kernel.ticks(), 1);
        assert_eq!(kernel.platform().port_writes(), alloc::vec![(0x20, 0x20)]);
    }

    #[test]
    fn test_tenth_tick_reschedules() {
        let kernel = boot();
        let a = kernel.create_process("a", 0x1000).unwrap();
        for _ in 0..9 {
            kernel.handle_irq(0);
        }
        assert_eq!(kernel.current_pid(), Some(1));
        kernel.handle_irq(0);
        assert_eq!(kernel.current_pid(), Some(a));
        assert_eq!(kernel.platform().context_switches().len(), 1);
    }

    #[test]
    fn test_keyboard_irq_buffers_and_echoes() {
        let kernel = boot();
        kernel.platform().queue_port_input(0x60, &[0x23, 0xA3, 0x17]);
        kernel.handle_irq(1);
        kernel.handle_irq(1);
        kernel.handle_irq(1);
        assert_eq!(kernel.platform().console_output(), "hi");
        assert_eq!(kernel.try_read_char(), Some(b'h'));
        assert_eq!(kernel.try_read_char(), Some(b'i'));
        assert_eq!(kernel.try_read_char(), None);
    }

    #[test]
    fn test_high_irq_sends_both_eois() {
        let kernel = boot();
        kernel.platform().clear_port_writes();
        kernel.handle_trap(44);
        assert_eq!(
            kernel.platform().port_writes(),
            alloc::vec![(0xA0, 0x20), (0x20, 0x20)]
        );
    }

    #[test]
    fn test_sleep_waits_for_ticks() {
        let kernel = boot();
        kernel.sleep(50);
        assert_eq!(kernel.ticks(), 5);
        kernel.sleep(0);
        assert_eq!(kernel.ticks(), 5);
    }

    #[test]
    fn test_sleep_target_saturates() {
        let kernel = boot();
        for _ in 0..3 {
            kernel.handle_trap(32);
        }
        let target = kernel
            .ticks()
            .saturating_add(kernel.timer.ticks_for_ms(u64::MAX));
        assert_eq!(target, 3 + u64::MAX / 1000 + 1);
    }

    #[test]
    fn test_read_char_blocks_until_key() {
        let kernel = boot();
        kernel.platform().raise_irq(0);
        kernel.platform().press_key(0x1E);
        assert_eq!(kernel.read_char(), b'a');
        assert_eq!(kernel.ticks(), 1);
    }

    #[test]
    #[should_panic(expected = "System Halted")]
    fn test_exception_halts() {
        let kernel = boot();
        kernel.handle_trap(14);
    }

    #[test]
    fn test_exception_message_reaches_console() {
        let kernel = boot();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            kernel.handle_exception(0);
        }));
        assert!(result.is_err());
        assert_eq!(
            kernel.platform().console_output(),
            "EXCEPTION: Divide by Zero\nSystem Halted!"
        );
    }
}
