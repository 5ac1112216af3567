mod boot;
mod intc;
mod mbox;
mod mmu;
mod switch;
mod timer;
mod trap;
mod uart;

pub use intc::{fiq_disable, irq_disable, irq_enable, irq_pending};
pub use mmu::{dsb, flush_caches, flush_dcache, flush_tlb};
pub use switch::__switch;
pub use timer::{timer_ack, timer_init};
pub use trap::{trap_init, trapret};
pub use uart::{puts, uart_rx};

use crate::config::{EARLY_MEMORY_END, KERNBASE, PAGE_SIZE};

extern "C" {
    /// End of the loaded kernel image, from the linker script.
    static __kernel_end: u8;
}

/// Base of the directly mapped kernel window.
pub fn kernel_window_base() -> usize {
    KERNBASE
}

/// Kernel-window range of RAM that is free once the image is loaded,
/// bounded by the conservative boot mapping.
pub fn free_memory_range() -> (usize, usize) {
    let start = unsafe { &__kernel_end as *const u8 as usize };
    let start = (start + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
    (start, KERNBASE + EARLY_MEMORY_END)
}

/// Physical extent of the boot-time conservative mapping.
pub fn early_memory_limit() -> usize {
    EARLY_MEMORY_END
}

/// Physical memory size, as reported by the firmware.
pub fn detect_memory() -> usize {
    mbox::arm_memory_size()
}

/// Park the CPU.
pub fn halt() -> ! {
    loop {
        unsafe { core::arch::asm!("wfe") };
    }
}
