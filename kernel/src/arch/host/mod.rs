//! Host stand-ins for the machine layer.
//!
//! Physical memory is a static arena: a "physical" address is an offset
//! into it, so page-table entries keep fitting in 32 bits and the VM code
//! runs unchanged. Interrupt-controller state is a set of flags the test
//! suite can raise and the dispatcher can mask.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::Lazy;

use super::Context;
use crate::cell::SyncCell;
use crate::config::PAGE_SIZE;

const ARENA_PAGES: usize = 4096;
const ARENA_SIZE: usize = ARENA_PAGES * PAGE_SIZE;

#[repr(C, align(4096))]
struct Arena([u8; ARENA_SIZE]);

static ARENA: SyncCell<Arena> = SyncCell::new(Arena([0; ARENA_SIZE]));

static ARENA_BASE: Lazy<usize> = Lazy::new(|| ARENA.get() as usize);

pub fn kernel_window_base() -> usize {
    *ARENA_BASE
}

pub fn free_memory_range() -> (usize, usize) {
    (*ARENA_BASE, *ARENA_BASE + ARENA_SIZE)
}

pub fn early_memory_limit() -> usize {
    ARENA_SIZE
}

pub fn detect_memory() -> usize {
    ARENA_SIZE
}

pub fn puts(args: fmt::Arguments) {
    #[cfg(test)]
    std::print!("{}", args);
    #[cfg(not(test))]
    let _ = args;
}

pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

pub fn dsb() {}

pub fn flush_tlb() {}

pub fn flush_dcache() {}

pub fn flush_caches() {}

/* Interrupt controller */

static PENDING: [AtomicU32; 3] = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];
static ENABLED: [AtomicU32; 3] = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];

pub fn irq_pending(bank: usize) -> u32 {
    PENDING[bank].load(Ordering::Relaxed) & ENABLED[bank].load(Ordering::Relaxed)
}

pub fn irq_enable(bank: usize, mask: u32) {
    ENABLED[bank].fetch_or(mask, Ordering::Relaxed);
}

pub fn irq_disable(bank: usize, mask: u32) {
    ENABLED[bank].fetch_and(!mask, Ordering::Relaxed);
}

pub fn fiq_disable() {}

/// Raise a source, as the test's stand-in for the hardware line.
pub fn raise_irq(bank: usize, mask: u32) {
    PENDING[bank].fetch_or(mask, Ordering::Relaxed);
}

/// Drop a source.
pub fn clear_irq(bank: usize, mask: u32) {
    PENDING[bank].fetch_and(!mask, Ordering::Relaxed);
}

/* Timer and UART */

pub fn timer_init() {
    irq_enable(0, super::IRQ_TIMER);
}

pub fn timer_ack() {
    clear_irq(0, super::IRQ_TIMER);
}

pub fn uart_rx() {
    clear_irq(0, super::IRQ_MINIUART);
}

/* Trap and context switch */

pub fn trap_init() {}

/// # Safety
///
/// Never actually switches on the host; exists so the process layer
/// links and the setup around it can be tested.
pub unsafe fn __switch(_old: *mut *mut Context, _new: *mut Context) {
    unimplemented!("context switch only exists on the target machine");
}

pub extern "C" fn trapret() {
    unimplemented!("trap return only exists on the target machine");
}
