//! User address spaces.
//!
//! A process's directory owns every L2 table and every mapped user page
//! reachable from it. `copy_uvm` materializes a full deep copy (no
//! sharing), and `free_vm` is the one place the ownership graph is
//! released.

use core::cmp::min;
use core::ptr;

use crate::config::{PAGE_SIZE, USERBOUND};
use crate::error::{KernelError, KernelResult};
use crate::fs::{self, Inode};
use crate::mm::addr::{p2v, page_round_up, v2p, VirtAddr};
use crate::mm::kalloc;
use crate::mm::kvm::setup_kvm;
use crate::mm::page_table::{PageDir, PdeFlags, Pte, PteFlags};

/// Load the initial process image: one zeroed page mapped user-RW at
/// address zero with `src` copied in. Only `user_init` calls this.
pub fn init_uvm(pgdir: &mut PageDir, src: &[u8]) {
    assert!(src.len() < PAGE_SIZE, "init_uvm: image more than a page");
    let mem = kalloc::alloc_page().expect("init_uvm: out of memory");
    kalloc::zero_page(mem);
    pgdir
        .map_range(
            VirtAddr::new(0),
            PAGE_SIZE,
            v2p(mem),
            PdeFlags::COARSE,
            PteFlags::user_rw(),
        )
        .expect("init_uvm: map");
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), mem.value() as *mut u8, src.len());
    }
}

/// Read a program segment from `ip` into pages that are already mapped.
/// A hole in the mapping is a caller bug and fatal.
pub fn load_uvm(
    pgdir: &mut PageDir,
    va: VirtAddr,
    ip: &Inode,
    offset: usize,
    sz: usize,
) -> KernelResult {
    assert!(va.is_page_aligned(), "load_uvm: va not page aligned");
    assert!(va.value() + sz <= USERBOUND, "load_uvm: out of range");
    let mut i = 0;
    while i < sz {
        let pte = pgdir
            .walk(va + i, PdeFlags::COARSE, false)
            .unwrap_or_else(|| panic!("load_uvm: address should exist"));
        if pte.is_unmapped() {
            panic!("load_uvm: address should exist");
        }
        let n = min(sz - i, PAGE_SIZE);
        let dst =
            unsafe { core::slice::from_raw_parts_mut(p2v(pte.base()).value() as *mut u8, n) };
        if fs::read_inode(ip, dst, offset + i)? != n {
            return Err(KernelError::InodeBounds);
        }
        i += PAGE_SIZE;
    }
    Ok(())
}

/// Grow user memory from `oldsz` to `newsz` with zeroed user-RW pages.
///
/// Returns the new size, `oldsz` when there is nothing to grow, or 0
/// after rolling back on exhaustion or when `newsz` would leave the user
/// range.
pub fn alloc_uvm(pgdir: &mut PageDir, oldsz: usize, newsz: usize) -> usize {
    if newsz >= USERBOUND {
        return 0;
    }
    if newsz <= oldsz {
        return oldsz;
    }

    let mut a = page_round_up(oldsz);
    while a < newsz {
        let mem = match kalloc::alloc_page() {
            Some(mem) => mem,
            None => {
                dealloc_uvm(pgdir, newsz, oldsz);
                return 0;
            }
        };
        kalloc::zero_page(mem);
        if pgdir
            .map_range(
                VirtAddr::new(a),
                PAGE_SIZE,
                v2p(mem),
                PdeFlags::COARSE,
                PteFlags::user_rw(),
            )
            .is_err()
        {
            kalloc::free_page(mem);
            dealloc_uvm(pgdir, newsz, oldsz);
            return 0;
        }
        a += PAGE_SIZE;
    }
    newsz
}

/// Shrink user memory from `oldsz` to `newsz`, freeing the pages above
/// the new break. Whole megabytes with no L2 table are skipped in one
/// step. Returns `newsz`.
pub fn dealloc_uvm(pgdir: &mut PageDir, oldsz: usize, newsz: usize) -> usize {
    if newsz >= oldsz {
        return oldsz;
    }

    let mut a = VirtAddr::new(page_round_up(newsz));
    while a.value() < oldsz {
        match pgdir.walk(a, PdeFlags::COARSE, false) {
            None => {
                // No table covers this megabyte.
                a = a.next_section();
            }
            Some(pte) => {
                if !pte.is_unmapped() {
                    if pte.base().value() == 0 {
                        panic!("kfree");
                    }
                    kalloc::free_page(p2v(pte.base()));
                    *pte = Pte::UNMAPPED;
                }
                a = a + PAGE_SIZE;
            }
        }
    }
    newsz
}

/// Deep-copy the first `sz` bytes of a user address space for fork.
/// Every page must be present in the parent; the copy shares nothing
/// with it. On failure the partial child is torn down.
pub fn copy_uvm(parent: &mut PageDir, sz: usize) -> KernelResult<PageDir> {
    let mut new = setup_kvm()?;
    let mut va = VirtAddr::new(0);
    while va.value() < sz {
        let pte = parent
            .walk(va, PdeFlags::COARSE, false)
            .unwrap_or_else(|| panic!("copy_uvm: pte should exist"));
        if pte.is_unmapped() {
            panic!("copy_uvm: page not present");
        }
        let flags = pte.flags();
        let mem = match kalloc::alloc_page() {
            Some(mem) => mem,
            None => {
                free_vm(new);
                return Err(KernelError::OutOfMemory);
            }
        };
        unsafe {
            ptr::copy_nonoverlapping(
                p2v(pte.base()).value() as *const u8,
                mem.value() as *mut u8,
                PAGE_SIZE,
            );
        }
        if new
            .map_range(va, PAGE_SIZE, v2p(mem), PdeFlags::COARSE, flags)
            .is_err()
        {
            kalloc::free_page(mem);
            free_vm(new);
            return Err(KernelError::OutOfMemory);
        }
        va = va + PAGE_SIZE;
    }
    Ok(new)
}

/// Release everything a user directory owns: mapped pages, L2 tables,
/// then the directory page itself.
pub fn free_vm(mut pgdir: PageDir) {
    dealloc_uvm(&mut pgdir, USERBOUND, 0);
    for pdx in 0..pgdir.len() {
        let pde = pgdir.entries()[pdx];
        if pde.is_table() {
            kalloc::free_page(p2v(pde.table_base()));
        }
    }
    kalloc::free_page(pgdir.base());
}

/// Revoke user access on the page at `uva`; the stack guard below a user
/// stack is made this way.
pub fn clear_pte_u(pgdir: &mut PageDir, uva: VirtAddr) {
    let pte = pgdir
        .walk(uva, PdeFlags::COARSE, false)
        .unwrap_or_else(|| panic!("clear_pte_u"));
    if pte.is_unmapped() {
        panic!("clear_pte_u");
    }
    pte.clear_user();
}

/// Kernel-window address of the page behind `uva`, if it is mapped and
/// user-accessible.
pub fn uva2ka(pgdir: &mut PageDir, uva: VirtAddr) -> Option<VirtAddr> {
    let pte = pgdir.walk(uva, PdeFlags::COARSE, false)?;
    if pte.is_unmapped() || !pte.user_accessible() {
        return None;
    }
    Some(p2v(pte.base()))
}

/// Copy `src` into a (possibly inactive) user address space at `va`,
/// honoring page boundaries on the way.
pub fn copy_out(pgdir: &mut PageDir, va: VirtAddr, src: &[u8]) -> KernelResult {
    let mut off = 0;
    let mut va = va;
    while off < src.len() {
        let page = va.page_align_down();
        let ka = uva2ka(pgdir, page).ok_or(KernelError::BadAddress)?;
        let in_page = va.value() - page.value();
        let n = min(src.len() - off, PAGE_SIZE - in_page);
        unsafe {
            ptr::copy_nonoverlapping(
                src[off..].as_ptr(),
                (ka.value() + in_page) as *mut u8,
                n,
            );
        }
        off += n;
        va = page + PAGE_SIZE;
    }
    Ok(())
}
