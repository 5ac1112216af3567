//! Page-granularity physical allocator: a free list threaded through the
//! pages themselves.

use core::ptr;

use kernel_sync::SpinMutex;
use log::warn;

use crate::config::PAGE_SIZE;
use crate::mm::addr::{page_round_up, VirtAddr};

struct Run {
    next: *mut Run,
}

pub struct FreeList {
    head: *mut Run,
    free: usize,
}

unsafe impl Send for FreeList {}

static FREE_LIST: SpinMutex<FreeList> = SpinMutex::new(FreeList {
    head: ptr::null_mut(),
    free: 0,
});

/// Hand the kernel-window range `[start, end)` to the allocator.
pub fn free_range(start: VirtAddr, end: VirtAddr) {
    let mut page = VirtAddr::new(page_round_up(start.value()));
    while page + PAGE_SIZE <= end {
        free_page(page);
        page = page + PAGE_SIZE;
    }
}

/// Return one page to the free list. Junk-fill it first to trip
/// use-after-free, then thread the list node through it.
pub fn free_page(va: VirtAddr) {
    assert!(va.is_page_aligned(), "free_page: unaligned {:?}", va);
    unsafe { ptr::write_bytes(va.value() as *mut u8, 1, PAGE_SIZE) };
    let run = va.value() as *mut Run;
    let mut list = FREE_LIST.lock();
    unsafe { (*run).next = list.head };
    list.head = run;
    list.free += 1;
}

/// A page of RAM, junk-filled. Callers that need zeroes clear it.
pub fn alloc_page() -> Option<VirtAddr> {
    let mut list = FREE_LIST.lock();
    if list.head.is_null() {
        warn!("alloc_page: out of memory");
        return None;
    }
    let run = list.head;
    list.head = unsafe { (*run).next };
    list.free -= 1;
    drop(list);
    unsafe { ptr::write_bytes(run as *mut u8, 5, PAGE_SIZE) };
    Some(VirtAddr::new(run as usize))
}

/// Pages currently on the free list.
pub fn free_pages() -> usize {
    FREE_LIST.lock().free
}

pub(crate) fn zero_page(va: VirtAddr) {
    unsafe { ptr::write_bytes(va.value() as *mut u8, 0, PAGE_SIZE) };
}
