//! Interrupt-masking locks for a uniprocessor kernel.
//!
//! Every lock acquisition disables IRQs and every release may re-enable
//! them, so code holding any lock can never be preempted by an interrupt
//! handler. Disabling nests: it takes two [`pop_off`] calls to undo two
//! [`push_off`] calls, and the IRQ-enable state captured at the outermost
//! `push_off` is restored by the matching outermost `pop_off`.

#![cfg_attr(not(test), no_std)]

mod arch;
mod mutex;
mod spinlock;

pub use arch::{intr_get, intr_off, intr_on};
pub use mutex::{SpinMutex, SpinMutexGuard};
pub use spinlock::SpinLock;

use core::cell::UnsafeCell;

pub(crate) use arch::cpu_id;

/// Number of CPUs. The target is uniprocessor; keeping the array makes the
/// per-CPU accounting explicit at every use site.
pub const NCPU: usize = 1;

/// Per-CPU interrupt accounting.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cpu {
    /// Depth of push_off() nesting.
    pub noff: usize,

    /// Were interrupts enabled before the outermost push_off()?
    pub intena: bool,
}

struct CpuArray(UnsafeCell<[Cpu; NCPU]>);

// Access is per-CPU and interrupts are off while the fields are mutated.
unsafe impl Sync for CpuArray {}

static CPUS: CpuArray = CpuArray(UnsafeCell::new(
    [Cpu {
        noff: 0,
        intena: false,
    }; NCPU],
));

/// This CPU's interrupt accounting record.
pub fn cpu() -> &'static mut Cpu {
    unsafe { &mut (*CPUS.0.get())[cpu_id()] }
}

/// Disable IRQs, remembering whether they were enabled beforehand if this
/// is the outermost disable. The nesting depth increases by one.
pub fn push_off() {
    let old = intr_get();
    intr_off();
    let cpu = cpu();
    if cpu.noff == 0 {
        cpu.intena = old;
    }
    cpu.noff += 1;
}

/// Undo one [`push_off`]. IRQs must currently be off; the depth must not
/// go negative. The last `pop_off` re-enables IRQs if the outermost
/// `push_off` found them enabled.
pub fn pop_off() {
    let cpu = cpu();
    assert!(!intr_get(), "pop_off: interruptible");
    assert!(cpu.noff >= 1, "pop_off: unbalanced");

    cpu.noff -= 1;
    if cpu.noff == 0 && cpu.intena {
        intr_on();
    }
}

/// Reset this CPU's accounting and force the emulated IRQ state.
///
/// Host builds only; lets tests start from a known interrupt state.
#[cfg(not(all(target_os = "none", target_arch = "arm")))]
pub fn reset_cpu_state(intr_enabled: bool) {
    let cpu = cpu();
    cpu.noff = 0;
    cpu.intena = false;
    arch::intr_force(intr_enabled);
}
