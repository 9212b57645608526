//! Boot sequence.
//!
//! | # | Phase           | Produces                                     |
//! |---|-----------------|----------------------------------------------|
//! | 1 | Physical Memory | frame bitmap with the low frames reserved    |
//! | 2 | Paging          | kernel directory, identity map, CR3/CR0      |
//! | 3 | Heap            | free-list heap over the configured arena     |
//! | 4 | Interrupts      | IDT, remapped PIC, programmed PIT            |
//! | 5 | Scheduler       | process table holding the kernel process     |
//!
//! Interrupts stay masked until [`Kernel::enable_interrupts`].

use alloc::boxed::Box;

use spin::Mutex;

use crate::arch::Platform;
use crate::config::KernelConfig;
use crate::drivers::ps2_keyboard::KeyboardBuffer;
use crate::interrupts::idt::InterruptDescriptorTable;
use crate::interrupts::timer::Timer;
use crate::interrupts::{self, SYSCALL_VECTOR};
use crate::ipc::MessageQueue;
use crate::kernel::status::{BootStatus, InitStatus};
use crate::kernel::Kernel;
use crate::memory::allocators::Heap;
use crate::memory::MemoryManager;
use crate::process::{Scheduler, ThreadTable};
use crate::{KernelError, KernelResult};

pub const PHASES: [&str; 5] = [
    "Physical Memory",
    "Paging",
    "Heap",
    "Interrupts",
    "Scheduler",
];

fn init_phase<T>(
    status: &mut BootStatus,
    step: usize,
    init_fn: impl FnOnce() -> KernelResult<T>,
) -> KernelResult<T> {
    let name = PHASES[step];
    status.update(name, InitStatus::InProgress);
    log::info!("[{}/{}] Initializing {}...", step + 1, PHASES.len(), name);

    match init_fn() {
        Ok(value) => {
            status.update(name, InitStatus::Completed);
            log::info!("{} initialized", name);
            Ok(value)
        }
        Err(e) => {
            status.update(name, InitStatus::Failed(e));
            log::error!("{} failed: {}", name, e);
            Err(e)
        }
    }
}

impl<P: Platform> Kernel<P> {
    /// Brings every subsystem up in order and returns the running kernel.
    pub fn boot(platform: P, config: KernelConfig) -> KernelResult<Self> {
        config.validate()?;
        platform.disable_interrupts();

        let mut status = BootStatus::new();
        for name in PHASES {
            status.register(name);
        }

        let physical = init_phase(&mut status, 0, || Ok(MemoryManager::init_physical(&config)))?;

        let memory = init_phase(&mut status, 1, || {
            let memory = MemoryManager::with_physical(&platform, &config, physical)?;
            if config.activate_paging {
                memory.paging.activate(&platform);
            } else {
                log::warn!("paging not activated, boot page tables stay live");
            }
            Ok(memory)
        })?;

        let heap = init_phase(&mut status, 2, || {
            let arena = platform
                .heap_arena(config.heap_start, config.heap_size)
                .ok_or(KernelError::OutOfMemory)?;
            let heap = Heap::new(arena)?;
            log::info!(
                "heap: {} KiB at {:#x}",
                heap.total_size() / 1024,
                config.heap_start
            );
            Ok(heap)
        })?;

        let timer = Timer::new(config.timer_hz, config.reschedule_interval);
        let idt = init_phase(&mut status, 3, || {
            let mut idt = Box::new(InterruptDescriptorTable::new());
            interrupts::install_gates(&platform, &mut idt);
            timer.program(&platform);
            log::info!("timer: {} Hz (divisor {})", timer.hz(), timer.divisor());
            Ok(idt)
        })?;

        let directory = memory.paging.directory();
        let scheduler = init_phase(&mut status, 4, || {
            let mut scheduler = Scheduler::new(config.max_processes);
            let pid = scheduler.init(directory)?;
            log::info!("kernel process running as pid {}", pid);
            Ok(scheduler)
        })?;

        let kernel = Self {
            threads: Mutex::new(ThreadTable::new(config.max_threads)),
            messages: Mutex::new(MessageQueue::new(config.ipc_mailbox_limit)),
            keyboard: Mutex::new(KeyboardBuffer::new()),
            idt: Mutex::new(idt),
            memory: Mutex::new(memory),
            heap: Mutex::new(heap),
            scheduler: Mutex::new(scheduler),
            timer,
            status,
            config,
            platform,
        };
        kernel.set_gate(SYSCALL_VECTOR, kernel.platform.trap_entry(SYSCALL_VECTOR));

        log::info!("kernel initialization complete");
        Ok(kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimulatedPlatform;
    use crate::memory::PAGE_SIZE;

    fn small_config() -> KernelConfig {
        KernelConfig::default().with_heap_size(64 * 1024)
    }

    #[test]
    fn test_boot_completes_every_phase() {
        let kernel = Kernel::boot(SimulatedPlatform::new(), small_config()).unwrap();
        let status = kernel.boot_status();
        assert!(status.all_ready());
        let names: alloc::vec::Vec<_> = status.components().iter().map(|c| c.name).collect();
        assert_eq!(names, PHASES);
    }

    #[test]
    fn test_boot_leaves_interrupts_masked() {
        let platform = SimulatedPlatform::new();
        platform.enable_interrupts();
        let kernel = Kernel::boot(platform, small_config()).unwrap();
        assert!(!kernel.platform().interrupts_enabled());
        kernel.enable_interrupts();
        assert!(kernel.platform().interrupts_enabled());
    }

    #[test]
    fn test_boot_activates_paging_when_configured() {
        let kernel = Kernel::boot(SimulatedPlatform::new(), small_config()).unwrap();
        assert!(kernel.platform().paging_enabled());
        assert_eq!(
            kernel.platform().page_directory(),
            Some(kernel.kernel_directory())
        );

        let kernel =
            Kernel::boot(SimulatedPlatform::new(), small_config().with_paging(false)).unwrap();
        assert!(!kernel.platform().paging_enabled());
        assert_eq!(kernel.platform().page_directory(), None);
    }

    #[test]
    fn test_boot_memory_figures() {
        let kernel = Kernel::boot(SimulatedPlatform::new(), small_config()).unwrap();
        assert_eq!(kernel.get_total_memory(), 32768 * PAGE_SIZE);
        assert_eq!(kernel.get_free_memory(), (32768 - 256) * PAGE_SIZE);
        assert_eq!(kernel.get_used_memory(), 256 * PAGE_SIZE);
        assert_eq!(kernel.get_heap_usage(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = small_config().with_memory_size(0);
        assert_eq!(
            Kernel::boot(SimulatedPlatform::new(), config).err(),
            Some(KernelError::InvalidArgument)
        );
    }
}
