use crate::arch::Platform;
use crate::kernel::Kernel;
use crate::process::Pid;
use crate::syscalls::dispatcher::{SyscallError, SyscallResult};

/// Queues `length` bytes at `data` for process `dest`.
pub fn sys_send<P: Platform>(
    kernel: &Kernel<P>,
    dest: Pid,
    msg_type: u32,
    data: *const u8,
    length: usize,
) -> SyscallResult {
    let payload: &[u8] = if length == 0 {
        &[]
    } else if data.is_null() {
        return Err(SyscallError::InvalidArgument);
    } else {
        // SAFETY: the caller hands over `length` readable bytes at `data`.
        unsafe { core::slice::from_raw_parts(data, length) }
    };
    kernel.send(dest, msg_type, payload)?;
    Ok(0)
}

/// Copies the next message into `buffer` and returns the copied length.
/// Sender and type are stored through the optional out-pointers.
pub fn sys_receive<P: Platform>(
    kernel: &Kernel<P>,
    buffer: *mut u8,
    capacity: usize,
    sender_out: *mut u32,
    type_out: *mut u32,
) -> SyscallResult {
    let buffer: &mut [u8] = if capacity == 0 {
        &mut []
    } else if buffer.is_null() {
        return Err(SyscallError::InvalidArgument);
    } else {
        // SAFETY: the caller hands over `capacity` writable bytes at `buffer`.
        unsafe { core::slice::from_raw_parts_mut(buffer, capacity) }
    };

    let received = kernel.receive(buffer)?;
    // SAFETY: non-null out-pointers name caller-owned u32 slots.
    unsafe {
        if !sender_out.is_null() {
            sender_out.write_unaligned(received.sender);
        }
        if !type_out.is_null() {
            type_out.write_unaligned(received.msg_type);
        }
    }
    Ok(received.length)
}
