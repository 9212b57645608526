//! Trap trampolines.
//!
//! One stub per installed vector (0-47 and 0x80). Each pushes a dummy error
//! code when the CPU does not supply one, then the vector number, and jumps
//! to a common path that saves every general-purpose register and calls
//! [`trap_dispatch`] with a pointer to the resulting [`TrapFrame`].
//!
//! Stack at the call (16-byte aligned: 5 CPU words + 2 + 15 registers):
//!
//! ```text
//! ss rsp rflags cs rip | error vector | rax rbx rcx rdx rsi rdi rbp r8..r15
//! ```

use core::arch::global_asm;

use crate::arch::x86::{X86Platform, KERNEL};
use crate::arch::Platform;
use crate::interrupts::idt::exception_message;
use crate::interrupts::pic::{self, IRQ_COUNT, PIC_1_OFFSET};
use crate::interrupts::{EXCEPTION_COUNT, SYSCALL_VECTOR};
use crate::syscalls::SyscallContext;

/// Stubs in `TRAP_STUB_TABLE`, one per vector from 0.
pub const STUB_COUNT: usize = 48;

global_asm!(
    r#"
.macro TRAP_NOERR n
trap_stub_\n:
    push 0
    push \n
    jmp trap_common
.endm

.macro TRAP_ERR n
trap_stub_\n:
    push \n
    jmp trap_common
.endm

.section .text
.irp n, 0,1,2,3,4,5,6,7,9,15,16,18,19,20,21,22,23,24,25,26,27,28,29,31
    TRAP_NOERR \n
.endr
.irp n, 8,10,11,12,13,14,17,30
    TRAP_ERR \n
.endr
.irp n, 32,33,34,35,36,37,38,39,40,41,42,43,44,45,46,47
    TRAP_NOERR \n
.endr

.global trap_stub_syscall
trap_stub_syscall:
    push 0
    push 0x80
    jmp trap_common

trap_common:
    push rax
    push rbx
    push rcx
    push rdx
    push rsi
    push rdi
    push rbp
    push r8
    push r9
    push r10
    push r11
    push r12
    push r13
    push r14
    push r15
    mov rdi, rsp
    cld
    call trap_dispatch
    pop r15
    pop r14
    pop r13
    pop r12
    pop r11
    pop r10
    pop r9
    pop r8
    pop rbp
    pop rdi
    pop rsi
    pop rdx
    pop rcx
    pop rbx
    pop rax
    add rsp, 16
    iretq

.section .rodata
.balign 8
.global TRAP_STUB_TABLE
TRAP_STUB_TABLE:
.irp n, 0,1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20,21,22,23,24,25,26,27,28,29,30,31,32,33,34,35,36,37,38,39,40,41,42,43,44,45,46,47
    .quad trap_stub_\n
.endr
.section .text
"#
);

extern "C" {
    static TRAP_STUB_TABLE: [usize; STUB_COUNT];
    fn trap_stub_syscall();
}

pub fn entry(vector: u8) -> usize {
    if vector == SYSCALL_VECTOR {
        return trap_stub_syscall as usize;
    }
    // SAFETY: the table is immutable and fully initialized by the assembler.
    let table = unsafe { &*core::ptr::addr_of!(TRAP_STUB_TABLE) };
    table.get(vector as usize).copied().unwrap_or(0)
}

#[repr(C)]
#[derive(Debug)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub vector: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

#[no_mangle]
extern "C" fn trap_dispatch(frame: &mut TrapFrame) {
    let vector = frame.vector as u8;
    let Some(kernel) = KERNEL.get() else {
        early_trap(vector);
        return;
    };

    if vector == SYSCALL_VECTOR {
        let ctx = SyscallContext::from_registers(
            frame.rax as usize,
            frame.rbx as usize,
            frame.rcx as usize,
            frame.rdx as usize,
            frame.rsi as usize,
            frame.rdi as usize,
        );
        frame.rax = kernel.syscall(ctx) as u64;
        return;
    }

    if vector < EXCEPTION_COUNT {
        log::error!(
            "trap {} at {:#x}, error code {:#x}",
            vector,
            frame.rip,
            frame.error_code
        );
    }
    kernel.handle_trap(vector);
}

/// A trap before the kernel context exists. Exceptions still halt; stray
/// IRQs are acknowledged.
fn early_trap(vector: u8) {
    let platform = X86Platform::early();
    if vector < EXCEPTION_COUNT {
        platform.console_write(b"EXCEPTION: ");
        platform.console_write(exception_message(vector).as_bytes());
        platform.console_write(b"\nSystem Halted!");
        platform.halt();
    }
    if (PIC_1_OFFSET..PIC_1_OFFSET + IRQ_COUNT).contains(&vector) {
        pic::end_of_interrupt(&platform, vector - PIC_1_OFFSET);
    }
}
