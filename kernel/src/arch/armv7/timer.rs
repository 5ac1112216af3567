//! BCM283x free-running system timer, compare channel 3.

use super::intc;
use crate::arch::IRQ_TIMER;
use crate::config::{MMIO_VBASE, TICKS_PER_SEC};

const TIMER_CS: usize = MMIO_VBASE + 0x3000;
const TIMER_CLO: usize = MMIO_VBASE + 0x3004;
const TIMER_C3: usize = MMIO_VBASE + 0x3018;

const CS_MATCH3: u32 = 1 << 3;

/// The counter runs at 1 MHz.
const INTERVAL: u32 = (1_000_000 / TICKS_PER_SEC) as u32;

fn read(reg: usize) -> u32 {
    unsafe { (reg as *const u32).read_volatile() }
}

fn write(reg: usize, val: u32) {
    unsafe { (reg as *mut u32).write_volatile(val) }
}

/// Arm the first compare and route the line to the CPU.
pub fn timer_init() {
    write(TIMER_C3, read(TIMER_CLO).wrapping_add(INTERVAL));
    intc::irq_enable(0, IRQ_TIMER);
}

/// Acknowledge the match and arm the next one.
pub fn timer_ack() {
    write(TIMER_CS, CS_MATCH3);
    write(TIMER_C3, read(TIMER_CLO).wrapping_add(INTERVAL));
}
