//! ARMv7-A short-descriptor page tables: L1 directories holding section
//! or coarse-table entries, and L2 tables of small pages.

use bitflags::bitflags;

use crate::config::{PAGE_SIZE, SECTION_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::mm::addr::{p2v, v2p, PhysAddr, VirtAddr};
use crate::mm::kalloc;

bitflags! {
    /// L1 descriptor attributes.
    pub struct PdeFlags: u32 {
        /// Entry points at an L2 table.
        const COARSE = 0b01;
        /// Entry maps a 1 MiB section directly.
        const SECTION = 0b10;
        /// Bufferable (sections only).
        const SEC_B = 1 << 2;
        /// Cacheable (sections only).
        const SEC_C = 1 << 3;
        /// Kernel read/write, no user access (sections only).
        const SEC_AP_KRW = 0b01 << 10;
    }
}

bitflags! {
    /// L2 small-page attributes.
    pub struct PteFlags: u32 {
        /// Execute never.
        const XN = 1 << 0;
        /// Small-page marker; set on every mapped entry.
        const SMALL = 1 << 1;
        /// Bufferable.
        const B = 1 << 2;
        /// Cacheable.
        const C = 1 << 3;
        /// AP[0]: privileged read/write.
        const AP_KRW = 1 << 4;
        /// AP[1]: user access as well.
        const AP_USER = 1 << 5;
        /// AP extension.
        const APX = 1 << 9;
        /// Shareable.
        const S = 1 << 10;
        /// Non-global.
        const NG = 1 << 11;
    }
}

impl PdeFlags {
    /// Kernel section mapping: cached, buffered, kernel RW.
    pub fn kernel_section() -> Self {
        PdeFlags::SECTION | PdeFlags::SEC_C | PdeFlags::SEC_B | PdeFlags::SEC_AP_KRW
    }

    /// Device section mapping: strongly ordered, kernel RW.
    pub fn device_section() -> Self {
        PdeFlags::SECTION | PdeFlags::SEC_AP_KRW
    }
}

impl PteFlags {
    /// User data page: cached, buffered, user and kernel RW.
    pub fn user_rw() -> Self {
        PteFlags::SMALL | PteFlags::C | PteFlags::B | PteFlags::AP_KRW | PteFlags::AP_USER
    }

    /// Kernel-only page.
    pub fn kernel_rw() -> Self {
        PteFlags::SMALL | PteFlags::C | PteFlags::B | PteFlags::AP_KRW
    }
}

/// An L1 entry. Zero is unmapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pde(u32);

impl Pde {
    pub const UNMAPPED: Pde = Pde(0);

    pub fn table(pa: PhysAddr, flags: PdeFlags) -> Pde {
        Pde(pa.value() as u32 | flags.bits())
    }

    pub fn section(pa: PhysAddr, flags: PdeFlags) -> Pde {
        Pde(pa.value() as u32 | flags.bits())
    }

    pub fn is_unmapped(self) -> bool {
        self.0 == 0
    }

    pub fn is_table(self) -> bool {
        self.0 & 0b11 == PdeFlags::COARSE.bits()
    }

    pub fn is_section(self) -> bool {
        self.0 & 0b11 == PdeFlags::SECTION.bits()
    }

    /// Physical base of the L2 table this entry points at.
    pub fn table_base(self) -> PhysAddr {
        PhysAddr::new((self.0 & !0x3FF) as usize)
    }
}

/// An L2 entry: physical page base in the top 20 bits, attributes below.
/// Zero is unmapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(u32);

impl Pte {
    pub const UNMAPPED: Pte = Pte(0);

    pub fn new(pa: PhysAddr, flags: PteFlags) -> Pte {
        Pte(pa.value() as u32 | flags.bits())
    }

    pub fn is_unmapped(self) -> bool {
        self.0 == 0
    }

    pub fn base(self) -> PhysAddr {
        PhysAddr::new((self.0 & !0xFFF) as usize)
    }

    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    pub fn user_accessible(self) -> bool {
        self.flags().contains(PteFlags::AP_USER)
    }

    /// Revoke user access, leaving the kernel mapping intact.
    pub fn clear_user(&mut self) {
        self.0 &= !PteFlags::AP_USER.bits();
    }
}

/// Handle to a page directory.
///
/// A user directory is a single page covering the first 1024 L1 slots;
/// the live kernel directory is the full 4096-slot table. The handle
/// does not own the backing pages: user directories are torn down
/// explicitly by `free_vm`.
#[derive(Debug, Clone, Copy)]
pub struct PageDir {
    base: VirtAddr,
    len: usize,
}

impl PageDir {
    /// # Safety
    ///
    /// `base` must point at `len` L1 entries that stay alive for the
    /// handle's uses.
    pub unsafe fn from_raw(base: VirtAddr, len: usize) -> PageDir {
        PageDir { base, len }
    }

    pub fn base(&self) -> VirtAddr {
        self.base
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn entries(&self) -> &[Pde] {
        unsafe { core::slice::from_raw_parts(self.base.value() as *const Pde, self.len) }
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Pde] {
        unsafe { core::slice::from_raw_parts_mut(self.base.value() as *mut Pde, self.len) }
    }

    /// The L2 slot covering `va`.
    ///
    /// With `alloc`, a missing L2 table is created: a zeroed page whose
    /// directory entry gets exactly the caller's `l1attr` (user mappings
    /// must pass the user table attribute). Without `alloc`, a missing
    /// table yields `None`. Finding a section entry in the walked slot
    /// is fatal: sections never cover walked (user) ranges.
    pub fn walk(&mut self, va: VirtAddr, l1attr: PdeFlags, alloc: bool) -> Option<&'static mut Pte> {
        let pdx = va.pdx();
        assert!(pdx < self.len, "walk: {:?} beyond directory", va);
        let pde = self.entries()[pdx];
        let table = if pde.is_table() {
            p2v(pde.table_base())
        } else if pde.is_unmapped() {
            if !alloc {
                return None;
            }
            let page = kalloc::alloc_page()?;
            kalloc::zero_page(page);
            self.entries_mut()[pdx] = Pde::table(v2p(page), l1attr);
            page
        } else {
            panic!("walk: section entry at {:?}", va);
        };
        let ptes = table.value() as *mut Pte;
        Some(unsafe { &mut *ptes.add(va.ptx()) })
    }

    /// Map `[va, va+size)` to physical memory starting at `pa`.
    ///
    /// `l1attr` selects the mode: section entries are written straight
    /// into the directory in 1 MiB steps, coarse mappings go through
    /// `walk` in page steps with `l2attr`. Mapping over a present entry
    /// is a bug in the caller and fatal.
    pub fn map_range(
        &mut self,
        va: VirtAddr,
        size: usize,
        pa: PhysAddr,
        l1attr: PdeFlags,
        l2attr: PteFlags,
    ) -> KernelResult {
        assert!(size > 0, "map_range: empty range");
        if l1attr.contains(PdeFlags::SECTION) {
            self.map_sections(va, size, pa, l1attr)
        } else if l1attr.contains(PdeFlags::COARSE) {
            self.map_pages(va, size, pa, l1attr, l2attr)
        } else {
            panic!("map_range: bad l1 attribute {:#x}", l1attr.bits());
        }
    }

    fn map_sections(
        &mut self,
        va: VirtAddr,
        size: usize,
        pa: PhysAddr,
        l1attr: PdeFlags,
    ) -> KernelResult {
        let mask = SECTION_SIZE - 1;
        let mut va = va.value() & !mask;
        let last = (va + size - 1) & !mask;
        let mut pa = pa.value() & !mask;
        loop {
            let pdx = VirtAddr::new(va).pdx();
            assert!(pdx < self.len, "map_range: section beyond directory");
            if !self.entries()[pdx].is_unmapped() {
                panic!("remap");
            }
            self.entries_mut()[pdx] = Pde::section(PhysAddr::new(pa), l1attr);
            if va == last {
                return Ok(());
            }
            va += SECTION_SIZE;
            pa += SECTION_SIZE;
        }
    }

    fn map_pages(
        &mut self,
        va: VirtAddr,
        size: usize,
        pa: PhysAddr,
        l1attr: PdeFlags,
        l2attr: PteFlags,
    ) -> KernelResult {
        let mask = PAGE_SIZE - 1;
        let mut va = va.value() & !mask;
        let last = (va + size - 1) & !mask;
        let mut pa = pa.value() & !mask;
        loop {
            let pte = self
                .walk(VirtAddr::new(va), l1attr, true)
                .ok_or(KernelError::OutOfMemory)?;
            if !pte.is_unmapped() {
                panic!("remap");
            }
            *pte = Pte::new(PhysAddr::new(pa), l2attr);
            if va == last {
                return Ok(());
            }
            va += PAGE_SIZE;
            pa += PAGE_SIZE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::{setup_kvm, uvm};
    use crate::test_util;

    #[test]
    fn walk_allocates_l2_tables_on_demand() {
        let _g = test_util::setup();
        let before = kalloc::free_pages();
        let mut dir = setup_kvm().unwrap();

        assert!(dir.walk(VirtAddr::new(0x1000), PdeFlags::COARSE, false).is_none());

        let pte = dir.walk(VirtAddr::new(0x1000), PdeFlags::COARSE, true).unwrap();
        assert!(pte.is_unmapped());
        assert!(dir.entries()[0].is_table());

        // Same section, second page: no new table.
        let used = before - kalloc::free_pages();
        dir.walk(VirtAddr::new(0x2000), PdeFlags::COARSE, true).unwrap();
        assert_eq!(before - kalloc::free_pages(), used);

        uvm::free_vm(dir);
        assert_eq!(kalloc::free_pages(), before);
    }

    #[test]
    fn map_pages_installs_flags_and_base() {
        let _g = test_util::setup();
        let before = kalloc::free_pages();
        let mut dir = setup_kvm().unwrap();

        let page = kalloc::alloc_page().unwrap();
        let pa = v2p(page);
        dir.map_range(
            VirtAddr::new(0x7000),
            PAGE_SIZE,
            pa,
            PdeFlags::COARSE,
            PteFlags::user_rw(),
        )
        .unwrap();

        let pte = dir.walk(VirtAddr::new(0x7000), PdeFlags::COARSE, false).unwrap();
        assert_eq!(pte.base(), pa);
        assert!(pte.user_accessible());

        uvm::free_vm(dir);
        assert_eq!(kalloc::free_pages(), before);
    }

    #[test]
    #[should_panic(expected = "remap")]
    fn remap_is_fatal() {
        let _g = test_util::setup();
        let mut dir = setup_kvm().unwrap();

        let page = kalloc::alloc_page().unwrap();
        let pa = v2p(page);
        dir.map_range(
            VirtAddr::new(0x1_0000),
            PAGE_SIZE,
            pa,
            PdeFlags::COARSE,
            PteFlags::user_rw(),
        )
        .unwrap();
        dir.map_range(
            VirtAddr::new(0x1_0000),
            PAGE_SIZE,
            pa,
            PdeFlags::COARSE,
            PteFlags::user_rw(),
        )
        .unwrap();
    }

    #[test]
    fn clear_user_drops_only_the_user_bit() {
        let mut pte = Pte::new(PhysAddr::new(0x3000), PteFlags::user_rw());
        pte.clear_user();
        assert!(!pte.user_accessible());
        assert!(pte.flags().contains(PteFlags::AP_KRW));
        assert_eq!(pte.base(), PhysAddr::new(0x3000));
    }
}
