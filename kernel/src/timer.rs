//! The monotonic tick counter. One timer IRQ is one tick; sleepers wait
//! on the counter's address.

use kernel_sync::SpinLock;

use crate::arch;
use crate::cell::SyncCell;
use crate::task;

pub struct Ticks {
    pub lock: SpinLock,
    count: SyncCell<usize>,
}

pub static TICKS: Ticks = Ticks {
    lock: SpinLock::new("time"),
    count: SyncCell::new(0),
};

impl Ticks {
    /// The channel sleepers wait on: the counter's address.
    pub fn channel(&self) -> usize {
        self.count.get() as usize
    }

    /// Current tick count; `lock` must be held.
    pub fn get(&self) -> usize {
        assert!(self.lock.holding(), "ticks: lock not held");
        unsafe { *self.count.get() }
    }
}

/// Arm the hardware timer.
pub fn init() {
    arch::timer_init();
}

/// Called from the IRQ dispatcher on every timer interrupt.
pub fn timer_tick() {
    TICKS.lock.acquire();
    unsafe { *TICKS.count.get() += 1 };
    task::wakeup(TICKS.channel());
    TICKS.lock.release();
}
