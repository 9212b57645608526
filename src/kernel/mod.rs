//! # Kernel Context
//!
//! [`Kernel`] owns every piece of kernel state. Foreground code and trap
//! handlers reach it through `&Kernel`, never through free-standing statics.
//!
//! ## Locking
//!
//! Each subsystem sits behind its own `spin::Mutex`, and every lock is taken
//! with interrupts masked through [`InterruptGuard`]. On this single-CPU
//! design a trap handler therefore never finds a lock held. When several
//! locks are needed they are taken in this order:
//!
//! `scheduler` → `threads` → `memory` → `heap` → `messages` → `keyboard`

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr::NonNull;

use spin::Mutex;

use crate::arch::{InterruptGuard, Platform};
use crate::config::KernelConfig;
use crate::drivers::ps2_keyboard::KeyboardBuffer;
use crate::interrupts::idt::InterruptDescriptorTable;
use crate::interrupts::timer::Timer;
use crate::ipc::{Message, MessageQueue, ReceivedMessage};
use crate::memory::allocators::Heap;
use crate::memory::paging::PageFlags;
use crate::memory::{MemoryManager, MemoryStats, PhysAddr, VirtAddr};
use crate::process::{ContextSwitch, Pid, Process, Scheduler, Thread, ThreadTable, Tid};
use crate::{KernelError, KernelResult};

pub mod init;
pub mod status;

pub use status::{BootStatus, ComponentStatus, InitStatus};

pub struct Kernel<P: Platform> {
    pub(crate) platform: P,
    pub(crate) config: KernelConfig,
    pub(crate) status: BootStatus,
    pub(crate) idt: Mutex<Box<InterruptDescriptorTable>>,
    pub(crate) timer: Timer,
    pub(crate) keyboard: Mutex<KeyboardBuffer>,
    pub(crate) memory: Mutex<MemoryManager>,
    pub(crate) heap: Mutex<Heap<'static>>,
    pub(crate) scheduler: Mutex<Scheduler>,
    pub(crate) threads: Mutex<ThreadTable>,
    pub(crate) messages: Mutex<MessageQueue>,
}

impl<P: Platform> Kernel<P> {
    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn boot_status(&self) -> &BootStatus {
        &self.status
    }

    pub(crate) fn mask_interrupts(&self) -> InterruptGuard<'_, P> {
        InterruptGuard::new(&self.platform)
    }

    /// Runs `f` on the value behind `lock` with interrupts masked.
    pub(crate) fn critical<T, R>(&self, lock: &Mutex<T>, f: impl FnOnce(&mut T) -> R) -> R {
        let _irq = self.mask_interrupts();
        let mut guard = lock.lock();
        f(&mut guard)
    }

    pub fn enable_interrupts(&self) {
        self.platform.enable_interrupts();
    }

    pub fn console_write(&self, bytes: &[u8]) {
        self.platform.console_write(bytes);
    }

    // ========================================================================
    // MEMORY
    // ========================================================================

    /// Kernel heap allocation; `None` when the heap is exhausted.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let ptr = self.critical(&self.heap, |heap| heap.allocate(size));
        if ptr.is_none() && size > 0 {
            log::warn!("heap allocation of {} bytes failed", size);
        }
        ptr
    }

    pub fn release(&self, ptr: NonNull<u8>) -> KernelResult<()> {
        self.critical(&self.heap, |heap| heap.release(ptr))?;
        Ok(())
    }

    /// Bootstrap bump allocation; never freed.
    pub fn allocate_early(&self, size: usize) -> Option<PhysAddr> {
        self.critical(&self.memory, |mm| mm.early.allocate(size))
    }

    pub fn allocate_frame(&self) -> Option<PhysAddr> {
        self.critical(&self.memory, |mm| mm.physical.allocate())
    }

    pub fn release_frame(&self, frame: PhysAddr) -> KernelResult<()> {
        self.critical(&self.memory, |mm| mm.physical.release(frame))?;
        Ok(())
    }

    /// Marks physical memory the board does not let us use.
    pub fn reserve_physical_range(&self, start: u64, end: u64) -> usize {
        self.critical(&self.memory, |mm| mm.physical.reserve_range(start, end))
    }

    pub fn map_page(&self, virt: VirtAddr, phys: PhysAddr, flags: PageFlags) -> KernelResult<()> {
        self.critical(&self.memory, |mm| mm.map_page(&self.platform, virt, phys, flags))
    }

    pub fn unmap_page(&self, virt: VirtAddr) {
        self.critical(&self.memory, |mm| mm.paging.unmap_page(&self.platform, virt))
    }

    pub fn translate(&self, virt: VirtAddr) -> Option<PhysAddr> {
        self.critical(&self.memory, |mm| mm.paging.translate(&self.platform, virt))
    }

    pub fn kernel_directory(&self) -> PhysAddr {
        self.critical(&self.memory, |mm| mm.paging.directory())
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let _irq = self.mask_interrupts();
        let mm = self.memory.lock();
        let heap = self.heap.lock();
        MemoryStats {
            total: mm.physical.total_memory(),
            free: mm.physical.free_memory(),
            used: mm.physical.used_memory(),
            heap_used: heap.used_size(),
            heap_total: heap.total_size(),
        }
    }

    pub fn get_total_memory(&self) -> usize {
        self.memory_stats().total
    }

    pub fn get_free_memory(&self) -> usize {
        self.memory_stats().free
    }

    pub fn get_used_memory(&self) -> usize {
        self.memory_stats().used
    }

    pub fn get_heap_usage(&self) -> usize {
        self.memory_stats().heap_used
    }

    // ========================================================================
    // PROCESSES
    // ========================================================================

    /// New processes share the kernel address space.
    pub fn create_process(&self, name: &str, entry_point: usize) -> KernelResult<Pid> {
        let directory = self.kernel_directory();
        let pid = self.critical(&self.scheduler, |s| s.create(name, entry_point, directory))?;
        log::info!("process {} '{}' created", pid, name);
        Ok(pid)
    }

    /// Unlinks the process and drops its threads. Pages it mapped stay mapped.
    pub fn destroy_process(&self, pid: Pid) -> KernelResult<()> {
        let _irq = self.mask_interrupts();
        self.scheduler.lock().destroy(pid)?;
        let threads = self.threads.lock().destroy_owned_by(pid);
        log::info!("process {} destroyed ({} threads)", pid, threads);
        Ok(())
    }

    pub fn current_process(&self) -> Option<Process> {
        self.critical(&self.scheduler, |s| s.current().cloned())
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.critical(&self.scheduler, |s| s.current_pid())
    }

    pub fn process(&self, pid: Pid) -> Option<Process> {
        self.critical(&self.scheduler, |s| s.get(pid).cloned())
    }

    /// Snapshot of the process list, newest first.
    pub fn processes(&self) -> Vec<Process> {
        self.critical(&self.scheduler, |s| s.iter().cloned().collect())
    }

    pub fn process_count(&self) -> usize {
        self.critical(&self.scheduler, |s| s.len())
    }

    /// Round-robin step; the platform is told about any switch.
    pub fn reschedule(&self) -> Option<ContextSwitch> {
        let switch = self.critical(&self.scheduler, |s| s.reschedule())?;
        self.platform.switch_context(&switch);
        Some(switch)
    }

    pub fn yield_now(&self) {
        self.reschedule();
    }

    pub fn block_process(&self, pid: Pid) -> KernelResult<()> {
        self.critical(&self.scheduler, |s| s.block(pid))
    }

    pub fn unblock_process(&self, pid: Pid) -> KernelResult<()> {
        self.critical(&self.scheduler, |s| s.unblock(pid))
    }

    pub fn create_thread(&self, owner: Pid, entry_point: usize) -> KernelResult<Tid> {
        let _irq = self.mask_interrupts();
        if self.scheduler.lock().get(owner).is_none() {
            return Err(KernelError::NotFound);
        }
        self.threads.lock().create(owner, entry_point)
    }

    pub fn destroy_thread(&self, tid: Tid) -> KernelResult<()> {
        self.critical(&self.threads, |t| t.destroy(tid))?;
        Ok(())
    }

    pub fn thread(&self, tid: Tid) -> Option<Thread> {
        self.critical(&self.threads, |t| t.get(tid).cloned())
    }

    pub fn thread_count(&self) -> usize {
        self.critical(&self.threads, |t| t.len())
    }

    // ========================================================================
    // IPC
    // ========================================================================

    /// Queues a copy of `data` for `dest`, stamped with the running process.
    pub fn send(&self, dest: Pid, msg_type: u32, data: &[u8]) -> KernelResult<()> {
        let _irq = self.mask_interrupts();
        let sender = self
            .scheduler
            .lock()
            .current_pid()
            .ok_or(KernelError::NoCurrentProcess)?;

        let mut heap = self.heap.lock();
        let mut messages = self.messages.lock();
        messages.check_capacity(dest)?;

        let payload = heap
            .allocate_block(data.len().max(1))
            .ok_or(KernelError::OutOfMemory)?;
        if let Some(block) = heap.block_mut(payload) {
            block[..data.len()].copy_from_slice(data);
        }
        let message = Message {
            sender,
            receiver: dest,
            msg_type,
            payload,
            length: data.len(),
        };
        if let Err(err) = messages.push(message) {
            heap.release_block(payload)?;
            return Err(err);
        }
        log::trace!("message {} -> {} type {}", sender, dest, msg_type);
        Ok(())
    }

    /// Takes the newest message addressed to the running process, copying at
    /// most `buffer.len()` bytes of it.
    pub fn receive(&self, buffer: &mut [u8]) -> KernelResult<ReceivedMessage> {
        let _irq = self.mask_interrupts();
        let receiver = self
            .scheduler
            .lock()
            .current_pid()
            .ok_or(KernelError::NoCurrentProcess)?;

        let mut heap = self.heap.lock();
        let message = self
            .messages
            .lock()
            .take_for(receiver)
            .ok_or(KernelError::NotFound)?;

        let length = message.length.min(buffer.len());
        if let Some(block) = heap.block(message.payload) {
            buffer[..length].copy_from_slice(&block[..length]);
        }
        heap.release_block(message.payload)?;
        Ok(ReceivedMessage {
            sender: message.sender,
            msg_type: message.msg_type,
            length,
        })
    }

    pub fn pending_messages(&self, pid: Pid) -> usize {
        self.critical(&self.messages, |m| m.pending_for(pid))
    }
}
