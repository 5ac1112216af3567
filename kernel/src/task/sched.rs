//! The scheduler and the blocking primitives.
//!
//! In-kernel control only changes hands inside `sched()`, and only via
//! `do_yield`, `sleep` or `do_exit`. The table lock is held across
//! every `__switch`: the process acquires it and the scheduler releases
//! it on the other side, and vice versa.

use core::ptr;

use log::trace;

use crate::arch::{Context, __switch};
use crate::cell::SyncCell;
use crate::config::NPROC;
use crate::mm::{switch_kvm, switch_uvm};

use super::task::{current, ProcState, PTABLE};

/// Per-CPU scheduling state. `curr_cpu` is a fixed index on this
/// uniprocessor target.
pub struct CpuContext {
    /// Slot of the process running here, if any.
    pub current: Option<usize>,
    /// Where `sched` switches to; points into the scheduler's stack.
    pub scheduler: *mut Context,
    /// The first pass leaves the boot IRQ state alone.
    started: bool,
}

static CPU0: SyncCell<CpuContext> = SyncCell::new(CpuContext {
    current: None,
    scheduler: ptr::null_mut(),
    started: false,
});

pub fn cpu() -> &'static mut CpuContext {
    unsafe { CPU0.get_mut() }
}

/// Round-robin over the table forever. Each chosen process runs until
/// it comes back through `sched`; the table lock travels across the
/// switch in both directions.
pub fn scheduler() -> ! {
    let c = cpu();
    loop {
        if c.started {
            kernel_sync::intr_on();
        } else {
            c.started = true;
        }

        PTABLE.lock.acquire();
        for slot in 0..NPROC {
            let p = unsafe { &mut PTABLE.slots()[slot] };
            if p.state != ProcState::Runnable {
                continue;
            }

            c.current = Some(slot);
            switch_uvm(p.pgdir.as_ref().expect("scheduler: runnable without pgdir"));
            p.state = ProcState::Running;
            trace!("run pid {}", p.pid);

            unsafe { __switch(&mut c.scheduler, p.context) };

            // The process yielded, slept or exited.
            switch_kvm();
            c.current = None;
        }
        PTABLE.lock.release();
    }
}

/// Give the CPU back to the scheduler. The caller holds exactly the
/// table lock and has already moved off `Running`. The saved
/// interrupt-enable state survives the trip through the scheduler.
pub(super) fn sched() {
    let c = cpu();
    let p = current().expect("sched: no process");
    assert!(PTABLE.lock.holding(), "sched: ptable lock not held");
    assert_eq!(kernel_sync::cpu().noff, 1, "sched: locks held");
    assert!(p.state != ProcState::Running, "sched: process running");
    assert!(!kernel_sync::intr_get(), "sched: interruptible");

    let intena = kernel_sync::cpu().intena;
    unsafe { __switch(&mut p.context, c.scheduler) };
    kernel_sync::cpu().intena = intena;
}

/// Cooperatively step aside; the timer tick routes here from the trap
/// dispatcher.
pub fn do_yield() {
    PTABLE.lock.acquire();
    current().expect("yield: no process").state = ProcState::Runnable;
    sched();
    PTABLE.lock.release();
}

/// Sleep on `chan`, atomically releasing `lk`.
///
/// Wakeups serialize on the table lock: once we hold it we can release
/// `lk`, and a `wakeup` sequenced after the caller's decision to sleep
/// cannot be missed. Reacquires `lk` before returning.
pub fn sleep(chan: usize, lk: &kernel_sync::SpinLock) {
    let p = current().expect("sleep: no process");

    let swapped = !ptr::eq(lk, &PTABLE.lock);
    if swapped {
        PTABLE.lock.acquire();
        lk.release();
    }

    p.chan = chan;
    p.state = ProcState::Sleeping;
    sched();
    p.chan = 0;

    if swapped {
        PTABLE.lock.release();
        lk.acquire();
    }
}

/// Make every process sleeping on `chan` runnable. The table lock must
/// be held.
pub(super) fn wakeup_locked(chan: usize) {
    debug_assert!(PTABLE.lock.holding());
    for p in unsafe { PTABLE.slots() }.iter_mut() {
        if p.state == ProcState::Sleeping && p.chan == chan {
            p.state = ProcState::Runnable;
        }
    }
}

/// Wake sleepers on `chan`.
pub fn wakeup(chan: usize) {
    PTABLE.lock.acquire();
    wakeup_locked(chan);
    PTABLE.lock.release();
}
