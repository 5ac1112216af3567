//! A guard-based wrapper over the interrupt-masking lock.

use core::{
    cell::UnsafeCell,
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{pop_off, push_off};

/// Mutually exclusive data behind an interrupt-masking lock.
///
/// When the guard falls out of scope it releases the lock and undoes the
/// IRQ disable. Like [`SpinLock`](crate::SpinLock), a contended `lock` on
/// this uniprocessor target means re-entry and panics.
pub struct SpinMutex<T: ?Sized> {
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

/// A guard that provides mutable data access.
pub struct SpinMutexGuard<'a, T: ?Sized + 'a> {
    lock: &'a AtomicBool,
    data: &'a mut T,
}

unsafe impl<T: ?Sized + Send> Sync for SpinMutex<T> {}
unsafe impl<T: ?Sized + Send> Send for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    pub const fn new(data: T) -> Self {
        SpinMutex {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinMutex<T> {
    /// Lock, disabling IRQs for the lifetime of the guard.
    pub fn lock(&self) -> SpinMutexGuard<T> {
        push_off();
        if self.lock.swap(true, Ordering::Acquire) {
            panic!("SpinMutex: re-entry");
        }
        SpinMutexGuard {
            lock: &self.lock,
            data: unsafe { &mut *self.data.get() },
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }

    /// A mutable borrow proves exclusivity; no locking needed.
    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut *self.data.get() }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SpinMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_locked() {
            write!(f, "SpinMutex {{ <locked> }}")
        } else {
            write!(f, "SpinMutex {{ data: ")
                .and_then(|()| unsafe { &*self.data.get() }.fmt(f))
                .and_then(|()| write!(f, " }}"))
        }
    }
}

impl<T: Default> Default for SpinMutex<T> {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<'a, T: ?Sized> Deref for SpinMutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.data
    }
}

impl<'a, T: ?Sized> DerefMut for SpinMutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

impl<'a, T: ?Sized> Drop for SpinMutexGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.store(false, Ordering::Release);
        pop_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{intr_get, reset_cpu_state};

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        crate::tests::SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn guard_masks_interrupts() {
        let _g = serial();
        reset_cpu_state(true);

        let m = SpinMutex::new(7usize);
        {
            let mut guard = m.lock();
            assert!(!intr_get());
            *guard += 1;
        }
        assert!(intr_get());
        assert_eq!(*m.lock(), 8);
    }
}
