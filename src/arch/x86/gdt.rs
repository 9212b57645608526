use spin::Lazy;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

use crate::interrupts::idt::KERNEL_CODE_SELECTOR;

const TRAP_STACK_SIZE: usize = 16 * 1024;

static mut TRAP_STACK: [u8; TRAP_STACK_SIZE] = [0; TRAP_STACK_SIZE];

static TSS: Lazy<TaskStateSegment> = Lazy::new(|| {
    let mut tss = TaskStateSegment::new();

    // Ring-0 stack for traps taken from user mode.
    tss.privilege_stack_table[0] = {
        let stack_start = unsafe { core::ptr::addr_of!(TRAP_STACK) } as u64;
        VirtAddr::new(stack_start + TRAP_STACK_SIZE as u64)
    };

    tss
});

struct Selectors {
    code_selector: SegmentSelector,
    data_selector: SegmentSelector,
    tss_selector: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, Selectors)> = Lazy::new(|| {
    let mut gdt = GlobalDescriptorTable::new();

    let code_selector = gdt.append(Descriptor::kernel_code_segment());
    let data_selector = gdt.append(Descriptor::kernel_data_segment());
    let tss_selector = gdt.append(Descriptor::tss_segment(&TSS));

    (
        gdt,
        Selectors {
            code_selector,
            data_selector,
            tss_selector,
        },
    )
});

/// Loads a flat GDT whose code selector matches the one every IDT gate uses.
pub fn init() {
    let (ref gdt, ref selectors) = *GDT;
    debug_assert_eq!(selectors.code_selector.0, KERNEL_CODE_SELECTOR);
    gdt.load();

    unsafe {
        use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};

        CS::set_reg(selectors.code_selector);
        DS::set_reg(selectors.data_selector);
        ES::set_reg(selectors.data_selector);
        SS::set_reg(selectors.data_selector);

        x86_64::instructions::tables::load_tss(selectors.tss_selector);
    }
}
