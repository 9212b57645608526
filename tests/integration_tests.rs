use myos_kernel::arch::sim::SimulatedPlatform;
use myos_kernel::memory::PAGE_SIZE;
use myos_kernel::{Kernel, KernelConfig, Platform};

fn boot_with(config: KernelConfig) -> Kernel<SimulatedPlatform> {
    Kernel::boot(SimulatedPlatform::new(), config).expect("boot failed")
}

fn boot() -> Kernel<SimulatedPlatform> {
    boot_with(KernelConfig::default().with_heap_size(256 * 1024))
}

mod boot {
    use super::*;
    use myos_kernel::process::ProcessState;

    #[test]
    fn test_end_to_end_boot_state() {
        let kernel = boot_with(KernelConfig::default());
        assert!(kernel.boot_status().all_ready());
        assert_eq!(kernel.get_free_memory(), (32768 - 256) * PAGE_SIZE);
        assert_eq!(kernel.get_heap_usage(), 0);

        let processes = kernel.processes();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].pid, 1);
        assert_eq!(processes[0].name.as_str(), "kernel");
        assert_eq!(processes[0].state, ProcessState::Running);
        assert_eq!(kernel.current_pid(), Some(1));
    }

    #[test]
    fn test_low_memory_is_identity_mapped() {
        let kernel = boot();
        for addr in [0u32, 0x1000, 0x0010_0000, 0x003F_F000] {
            assert_eq!(kernel.translate(addr), Some(addr));
        }
        assert_eq!(kernel.translate(0x0012_3456), Some(0x0012_3456));
        assert_eq!(kernel.translate(0x0040_0000), None);
    }

    #[test]
    fn test_idt_gates() {
        let kernel = boot();
        for vector in 0..=255u8 {
            let present = kernel.gate(vector).is_present();
            assert_eq!(present, vector < 48 || vector == 0x80, "vector {}", vector);
        }
        assert_eq!(
            kernel.gate(0x80).handler_address(),
            kernel.platform().trap_entry(0x80)
        );
    }

    #[test]
    fn test_pit_and_pic_programmed() {
        let kernel = boot();
        let writes = kernel.platform().port_writes();
        assert!(writes.contains(&(0x20, 0x11)));
        assert!(writes.contains(&(0xA1, 0x28)));
        let pit: Vec<(u16, u8)> = writes
            .into_iter()
            .filter(|(port, _)| (0x40..=0x43).contains(port))
            .collect();
        assert_eq!(pit, vec![(0x43, 0x36), (0x40, 0x9B), (0x40, 0x2E)]);
    }
}

mod memory {
    use super::*;
    use myos_kernel::memory::paging::PageFlags;
    use myos_kernel::KernelError;

    #[test]
    fn test_frames_exhaust_and_recycle() {
        let kernel = boot_with(
            KernelConfig::default()
                .with_memory_size(2 * 1024 * 1024)
                .with_heap_size(64 * 1024),
        );
        let mut frames = Vec::new();
        while let Some(frame) = kernel.allocate_frame() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 512 - 256);
        assert_eq!(frames[0], 256 * PAGE_SIZE as u32);
        assert_eq!(kernel.get_free_memory(), 0);

        let freed = frames[10];
        kernel.release_frame(freed).unwrap();
        assert_eq!(kernel.allocate_frame(), Some(freed));
        assert_eq!(kernel.allocate_frame(), None);
    }

    #[test]
    fn test_double_release_of_frame_rejected() {
        let kernel = boot();
        let frame = kernel.allocate_frame().unwrap();
        kernel.release_frame(frame).unwrap();
        assert!(kernel.release_frame(frame).is_err());
    }

    #[test]
    fn test_map_translate_unmap() {
        let kernel = boot();
        let frame = kernel.allocate_frame().unwrap();
        let flags = PageFlags::PRESENT | PageFlags::WRITABLE;

        kernel.map_page(0xC000_0000, frame, flags).unwrap();
        let after_first = kernel.get_free_memory();
        kernel.map_page(0xC000_0000, frame, flags).unwrap();
        assert_eq!(kernel.get_free_memory(), after_first);
        assert_eq!(kernel.translate(0xC000_0123), Some(frame | 0x123));

        kernel.unmap_page(0xC000_0000);
        assert_eq!(kernel.translate(0xC000_0000), None);
        assert!(kernel.platform().invalidated_pages().contains(&0xC000_0000));
    }

    #[test]
    fn test_heap_blocks_tile_the_arena() {
        let kernel = boot();
        let sizes = [1usize, 24, 100, 4096, 33];
        let ptrs: Vec<_> = sizes.iter().map(|&s| kernel.allocate(s).unwrap()).collect();
        for pair in ptrs.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(kernel.get_heap_usage() >= sizes.iter().sum::<usize>());

        for ptr in ptrs.iter().rev() {
            kernel.release(*ptr).unwrap();
        }
        assert_eq!(kernel.get_heap_usage(), 0);
        assert!(kernel.release(ptrs[0]).is_err());
    }

    #[test]
    fn test_heap_exhaustion() {
        let kernel = boot();
        assert!(kernel.allocate(1 << 20).is_none());
        assert!(kernel.allocate(0).is_none());
    }

    #[test]
    fn test_early_allocations_are_aligned_and_permanent() {
        let kernel = boot();
        let a = kernel.allocate_early(3).unwrap();
        let b = kernel.allocate_early(8).unwrap();
        assert_eq!(a % 4, 0);
        assert_eq!(b, a + 4);
        assert_eq!(kernel.allocate_early(2 * 1024 * 1024), None);
    }

    #[test]
    fn test_invalid_config() {
        let config = KernelConfig::default().with_max_processes(0);
        assert_eq!(
            Kernel::boot(SimulatedPlatform::new(), config).err(),
            Some(KernelError::InvalidArgument)
        );
    }
}

mod scheduling {
    use super::*;
    use myos_kernel::process::ProcessState;
    use myos_kernel::KernelError;

    #[test]
    fn test_round_robin_order() {
        let kernel = boot();
        let a = kernel.create_process("a", 0x1000).unwrap();
        let b = kernel.create_process("b", 0x2000).unwrap();
        let c = kernel.create_process("c", 0x3000).unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            kernel.yield_now();
            seen.push(kernel.current_pid().unwrap());
        }
        assert_eq!(seen, [c, b, a, 1]);
        assert_eq!(
            kernel
                .processes()
                .iter()
                .filter(|p| p.state == ProcessState::Running)
                .count(),
            1
        );
    }

    #[test]
    fn test_timer_drives_rescheduling() {
        let kernel = boot();
        let worker = kernel.create_process("worker", 0x1000).unwrap();
        kernel.sleep(100);
        assert_eq!(kernel.ticks(), 10);
        assert_eq!(kernel.current_pid(), Some(worker));
        let switch = kernel.platform().context_switches()[0].clone();
        assert_eq!(switch.from, Some(1));
        assert_eq!(switch.to, worker);
    }

    #[test]
    fn test_blocked_processes_are_skipped() {
        let kernel = boot();
        let a = kernel.create_process("a", 0x1000).unwrap();
        let b = kernel.create_process("b", 0x2000).unwrap();
        kernel.block_process(b).unwrap();
        kernel.yield_now();
        assert_eq!(kernel.current_pid(), Some(a));
        kernel.unblock_process(b).unwrap();
        kernel.yield_now();
        assert_eq!(kernel.current_pid(), Some(1));
        kernel.yield_now();
        assert_eq!(kernel.current_pid(), Some(b));
    }

    #[test]
    fn test_destroy_drops_threads() {
        let kernel = boot();
        let pid = kernel.create_process("owner", 0x1000).unwrap();
        let t1 = kernel.create_thread(pid, 0x1100).unwrap();
        let t2 = kernel.create_thread(pid, 0x1200).unwrap();
        assert_eq!(t2, t1 + 1);
        assert_eq!(kernel.thread(t1).unwrap().owner, pid);

        kernel.destroy_process(pid).unwrap();
        assert_eq!(kernel.thread_count(), 0);
        assert!(kernel.process(pid).is_none());
        assert_eq!(kernel.destroy_process(pid), Err(KernelError::NotFound));
        assert_eq!(kernel.create_thread(pid, 0x1000), Err(KernelError::NotFound));
    }

    #[test]
    fn test_process_table_capacity() {
        let kernel = boot_with(
            KernelConfig::default()
                .with_max_processes(3)
                .with_heap_size(64 * 1024),
        );
        kernel.create_process("a", 0).unwrap();
        kernel.create_process("b", 0).unwrap();
        assert_eq!(
            kernel.create_process("c", 0),
            Err(KernelError::ProcessTableFull)
        );
    }
}

mod ipc {
    use super::*;
    use myos_kernel::KernelError;

    #[test]
    fn test_message_delivery_and_truncation() {
        let kernel = boot();
        let peer = kernel.create_process("peer", 0x1000).unwrap();
        kernel.send(peer, 3, b"hello world").unwrap();
        assert_eq!(kernel.pending_messages(peer), 1);
        let used = kernel.get_heap_usage();
        assert!(used > 0);

        let mut nothing = [0u8; 16];
        assert_eq!(kernel.receive(&mut nothing), Err(KernelError::NotFound));

        kernel.yield_now();
        assert_eq!(kernel.current_pid(), Some(peer));
        let mut buf = [0u8; 5];
        let msg = kernel.receive(&mut buf).unwrap();
        assert_eq!(msg.sender, 1);
        assert_eq!(msg.msg_type, 3);
        assert_eq!(msg.length, 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(kernel.pending_messages(peer), 0);
        assert_eq!(kernel.get_heap_usage(), 0);
    }

    #[test]
    fn test_newest_message_first() {
        let kernel = boot();
        kernel.send(1, 1, b"first").unwrap();
        kernel.send(1, 2, b"second").unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(kernel.receive(&mut buf).unwrap().msg_type, 2);
        assert_eq!(kernel.receive(&mut buf).unwrap().msg_type, 1);
    }

    #[test]
    fn test_mailbox_limit() {
        let kernel = boot_with(
            KernelConfig::default()
                .with_mailbox_limit(Some(2))
                .with_heap_size(64 * 1024),
        );
        kernel.send(7, 0, b"a").unwrap();
        kernel.send(7, 0, b"b").unwrap();
        let used = kernel.get_heap_usage();
        assert_eq!(kernel.send(7, 0, b"c"), Err(KernelError::MailboxFull));
        assert_eq!(kernel.get_heap_usage(), used);
        assert_eq!(kernel.pending_messages(7), 2);
    }

    #[test]
    fn test_send_without_current_process() {
        let kernel = boot();
        kernel.destroy_process(1).unwrap();
        assert_eq!(
            kernel.send(2, 0, b"x"),
            Err(KernelError::NoCurrentProcess)
        );
    }
}

mod input {
    use super::*;

    #[test]
    fn test_read_char_waits_for_keyboard() {
        let kernel = boot();
        kernel.platform().press_key(0x2C);
        kernel.platform().press_key(0xAC);
        kernel.platform().press_key(0x39);
        assert_eq!(kernel.read_char(), b'z');
        assert_eq!(kernel.read_char(), b' ');
        assert_eq!(kernel.platform().console_output(), "z ");
    }

    #[test]
    fn test_backspace_erases_before_read() {
        let kernel = boot();
        for scancode in [0x1E, 0x30, 0x0E] {
            kernel.platform().press_key(scancode);
            kernel.handle_irq(1);
        }
        assert_eq!(kernel.try_read_char(), Some(b'a'));
        assert_eq!(kernel.try_read_char(), None);
        assert_eq!(kernel.platform().console_output(), "ab\x08");
    }
}

mod traps {
    use super::*;
    use myos_kernel::syscalls::{SyscallContext, SyscallNumber};

    #[test]
    #[should_panic(expected = "System Halted")]
    fn test_page_fault_halts() {
        let kernel = boot();
        kernel.handle_trap(14);
    }

    #[test]
    #[should_panic(expected = "System Halted")]
    fn test_reserved_exception_halts() {
        let kernel = boot();
        kernel.handle_trap(27);
    }

    #[test]
    fn test_unrecognized_irq_is_acknowledged() {
        let kernel = boot();
        kernel.platform().clear_port_writes();
        kernel.handle_trap(35);
        assert_eq!(kernel.platform().port_writes(), vec![(0x20, 0x20)]);
        assert_eq!(kernel.ticks(), 0);
    }

    #[test]
    fn test_uptime_tracks_ticks() {
        let kernel = boot();
        kernel.sleep(1500);
        assert_eq!(kernel.uptime_secs(), 1);
        assert_eq!(kernel.uptime_ms(), 1500);
        let ctx = SyscallContext::new(SyscallNumber::Uptime, [0; 5]);
        assert_eq!(kernel.syscall(ctx), 1500);
    }

    #[test]
    fn test_invalid_syscall() {
        let kernel = boot();
        let ctx = SyscallContext::from_registers(15, 0, 0, 0, 0, 0);
        assert_eq!(kernel.syscall(ctx), -1);
    }
}
