use core::cell::UnsafeCell;

/// Interior-mutable storage for statics whose access is serialized
/// externally, by a lock or by single-threaded boot code.
///
/// Callers state that serialization by going through the unsafe accessor.
#[repr(transparent)]
pub struct SyncCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for SyncCell<T> {}

impl<T> SyncCell<T> {
    pub const fn new(value: T) -> Self {
        SyncCell(UnsafeCell::new(value))
    }

    pub fn get(&self) -> *mut T {
        self.0.get()
    }

    /// # Safety
    ///
    /// The caller must hold whatever lock protects this cell, or be the
    /// only thread of execution.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self) -> &mut T {
        &mut *self.0.get()
    }
}
