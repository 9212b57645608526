#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod bare_metal {
    use bootloader_api::config::Mapping;
    use bootloader_api::info::MemoryRegionKind;
    use bootloader_api::{entry_point, BootInfo, BootloaderConfig};
    use core::panic::PanicInfo;

    use myos_kernel::arch::x86::{gdt, serial, X86Platform, HEAP_ARENA_SIZE, KERNEL};
    use myos_kernel::memory::{self, PAGE_SIZE};
    use myos_kernel::{println, Kernel, KernelConfig, Platform};

    pub static BOOTLOADER_CONFIG: BootloaderConfig = {
        let mut config = BootloaderConfig::new_default();
        config.mappings.physical_memory = Some(Mapping::Dynamic);
        config
    };

    entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

    fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
        serial::init();
        serial::init_logger(log::LevelFilter::Info);

        if let Err(e) = memory::init_global_heap() {
            println!("Failed to init heap: {}", e);
            halt_forever();
        }
        gdt::init();

        let Some(offset) = boot_info.physical_memory_offset.into_option() else {
            println!("bootloader did not map physical memory");
            halt_forever();
        };

        let mut config = KernelConfig::default()
            .with_heap_size(HEAP_ARENA_SIZE)
            .with_paging(false);
        let limit = config.memory_size as u64;

        // Bootstrap page tables go into the first usable span big enough
        // for them above the reserved low frames.
        let reserved_end = (config.reserved_frames * PAGE_SIZE) as u64;
        let early = boot_info.memory_regions.iter().find(|r| {
            let start = r.start.max(reserved_end);
            r.kind == MemoryRegionKind::Usable
                && start % PAGE_SIZE as u64 == 0
                && r.end > start
                && r.end - start >= config.early_alloc_size as u64
                && start + (config.early_alloc_size as u64) <= limit
        });
        match early {
            Some(region) => config.early_alloc_base = region.start.max(reserved_end) as u32,
            None => {
                println!("no usable memory for boot page tables");
                halt_forever();
            }
        }

        let kernel = match Kernel::boot(X86Platform::new(offset), config) {
            Ok(kernel) => KERNEL.call_once(|| kernel),
            Err(e) => {
                println!("Kernel initialization failed: {}", e);
                halt_forever();
            }
        };

        for region in boot_info.memory_regions.iter() {
            if region.kind != MemoryRegionKind::Usable && region.start < limit {
                kernel.reserve_physical_range(region.start, region.end.min(limit));
            }
        }
        let early = kernel.config().early_alloc_base as u64;
        kernel.reserve_physical_range(early, early + kernel.config().early_alloc_size as u64);

        log::info!(
            "{} KiB free of {} KiB",
            kernel.get_free_memory() / 1024,
            kernel.get_total_memory() / 1024
        );
        log::info!("{}", kernel.boot_status());

        kernel.enable_interrupts();
        loop {
            kernel.platform().wait_for_interrupt();
        }
    }

    fn halt_forever() -> ! {
        X86Platform::new(0).halt()
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!("PANIC : {} | {:?}", info.message(), info.location());
        halt_forever()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    hosted::run();
}

#[cfg(not(target_os = "none"))]
mod hosted {
    use log::{LevelFilter, Log, Metadata, Record};

    use myos_kernel::arch::sim::SimulatedPlatform;
    use myos_kernel::memory::paging::PageFlags;
    use myos_kernel::syscalls::{SyscallContext, SyscallNumber};
    use myos_kernel::{Kernel, KernelConfig};

    struct StdoutLogger;

    impl Log for StdoutLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                println!("[{:5}] {}: {}", record.level(), record.target(), record.args());
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: StdoutLogger = StdoutLogger;

    pub fn run() {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Info);
        }

        let kernel = match Kernel::boot(SimulatedPlatform::new(), KernelConfig::default()) {
            Ok(kernel) => kernel,
            Err(e) => {
                eprintln!("Kernel initialization failed: {}", e);
                std::process::exit(1);
            }
        };
        kernel.enable_interrupts();

        println!("{}", kernel.boot_status());
        println!(
            "memory: {} KiB total, {} KiB free, {} KiB used",
            kernel.get_total_memory() / 1024,
            kernel.get_free_memory() / 1024,
            kernel.get_used_memory() / 1024
        );

        let shell = kernel.create_process("shell", 0x0040_0000);
        let init = kernel.create_process("init", 0x0040_1000);
        if let (Ok(shell), Ok(_)) = (shell, init) {
            if let Err(e) = kernel.send(shell, 1, b"hello from the kernel") {
                log::warn!("send to pid {} failed: {}", shell, e);
            }
            kernel.sleep(200);
            println!("pending for shell: {}", kernel.pending_messages(shell));
        }

        if let Some(frame) = kernel.allocate_frame() {
            let mapped = kernel.map_page(0x8000_0000, frame, PageFlags::PRESENT | PageFlags::WRITABLE);
            println!(
                "mapped 0x80000000 -> {:?} ({:?})",
                kernel.translate(0x8000_0000),
                mapped
            );
        }

        let text = b"write via int 0x80\n";
        kernel.syscall(SyscallContext::new(
            SyscallNumber::Write,
            [1, text.as_ptr() as usize, text.len(), 0, 0],
        ));
        print!("{}", kernel.platform().console_output());

        println!("uptime: {} ms", kernel.uptime_ms());
        for process in kernel.processes() {
            println!("  pid {:3} {:10} {:?}", process.pid, process.name, process.state);
        }
    }
}
