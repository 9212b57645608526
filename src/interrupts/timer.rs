//! System timer.
//!
//! PIT channel 0 in rate-generator mode drives IRQ 0 at `hz`. Every tick
//! bumps a counter; every `reschedule_interval`-th tick asks for a
//! reschedule.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::arch::Platform;

pub const PIT_FREQUENCY: u32 = 1_193_182;
pub const PIT_CHANNEL0: u16 = 0x40;
pub const PIT_COMMAND: u16 = 0x43;
/// Channel 0, lobyte/hibyte access, mode 3, binary.
const PIT_RATE_GENERATOR: u8 = 0x36;

pub struct Timer {
    ticks: AtomicU64,
    hz: u32,
    reschedule_interval: u64,
}

impl Timer {
    pub const fn new(hz: u32, reschedule_interval: u64) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            hz,
            reschedule_interval,
        }
    }

    pub fn divisor(&self) -> u16 {
        (PIT_FREQUENCY / self.hz).min(u16::MAX as u32) as u16
    }

    pub fn program<P: Platform + ?Sized>(&self, platform: &P) {
        let [low, high] = self.divisor().to_le_bytes();
        platform.outb(PIT_COMMAND, PIT_RATE_GENERATOR);
        platform.outb(PIT_CHANNEL0, low);
        platform.outb(PIT_CHANNEL0, high);
    }

    /// Counts one tick. Returns `true` when a reschedule is due.
    pub fn tick(&self) -> bool {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        ticks % self.reschedule_interval == 0
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn hz(&self) -> u32 {
        self.hz
    }

    /// Ticks covering at least `ms` milliseconds, saturating at `u64::MAX`.
    pub fn ticks_for_ms(&self, ms: u64) -> u64 {
        ms.saturating_mul(self.hz as u64).div_ceil(1000)
    }

    pub fn uptime_ms(&self) -> u64 {
        self.ticks() * 1000 / self.hz as u64
    }

    pub fn uptime_secs(&self) -> u64 {
        self.ticks() / self.hz as u64
    }
}
