//! A raw named spinlock.
//!
//! The scheduler hands locks across context switches (a process acquires,
//! the scheduler releases on its behalf and vice versa), which a
//! guard-based lock cannot express. This type exposes explicit
//! `acquire`/`release` for those few places; everything else should use
//! [`SpinMutex`](crate::SpinMutex).

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{cpu_id, pop_off, push_off};

const NO_CPU: usize = usize::MAX;

/// An interrupt-masking lock.
///
/// On this uniprocessor target there is nothing to spin against: with
/// IRQs off, a held lock can only mean re-entry, which is a deadlock and
/// panics instead.
pub struct SpinLock {
    locked: AtomicBool,
    /// CPU holding the lock; written only while the lock is held.
    cpu: AtomicUsize,
    name: &'static str,
}

impl SpinLock {
    pub const fn new(name: &'static str) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            cpu: AtomicUsize::new(NO_CPU),
            name,
        }
    }

    /// Take the lock, disabling IRQs first.
    pub fn acquire(&self) {
        push_off();
        assert!(!self.holding(), "acquire {}: re-entry", self.name);
        self.locked.swap(true, Ordering::Acquire);
        self.cpu.store(cpu_id(), Ordering::Relaxed);
    }

    /// Drop the lock and undo the matching IRQ disable.
    pub fn release(&self) {
        assert!(self.holding(), "release {}: not held", self.name);
        self.cpu.store(NO_CPU, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
        pop_off();
    }

    /// Is this CPU holding the lock?
    pub fn holding(&self) -> bool {
        self.locked.load(Ordering::Relaxed) && self.cpu.load(Ordering::Relaxed) == cpu_id()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu, intr_get, reset_cpu_state};

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        crate::tests::SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn acquire_release_round_trip() {
        let _g = serial();
        reset_cpu_state(true);

        let lk = SpinLock::new("test");
        assert!(!lk.holding());
        lk.acquire();
        assert!(lk.holding());
        assert!(!intr_get());
        assert_eq!(cpu().noff, 1);
        lk.release();
        assert!(!lk.holding());
        assert!(intr_get());
        assert_eq!(cpu().noff, 0);
    }

    #[test]
    fn two_locks_nest() {
        let _g = serial();
        reset_cpu_state(true);

        let a = SpinLock::new("a");
        let b = SpinLock::new("b");
        a.acquire();
        b.acquire();
        assert_eq!(cpu().noff, 2);
        assert!(!intr_get());
        b.release();
        assert!(!intr_get());
        a.release();
        assert!(intr_get());
    }

    #[test]
    #[should_panic(expected = "acquire test: re-entry")]
    fn reacquire_panics() {
        let _g = serial();
        reset_cpu_state(false);

        let lk = SpinLock::new("test");
        lk.acquire();
        lk.acquire();
    }

    #[test]
    #[should_panic(expected = "release test: not held")]
    fn release_unheld_panics() {
        let _g = serial();
        reset_cpu_state(false);

        let lk = SpinLock::new("test");
        lk.release();
    }
}
