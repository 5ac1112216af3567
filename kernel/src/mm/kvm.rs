//! The kernel address space.
//!
//! A single 4096-entry directory, `KPGDIR`, is the live translation
//! table for the whole kernel lifetime. The boot assembly builds the
//! bootstrap identity section and a conservative RAM window directly
//! into it; `init` adds the fixed device mappings, and `init_stage2`
//! grows the window to the real memory size once the firmware can be
//! asked. User address spaces are activated by copying their 1024 user
//! slots into the low end of this table.

use kernel_sync::{pop_off, push_off};
use log::info;

use crate::arch;
use crate::cell::SyncCell;
use crate::config::{
    EARLY_MEMORY_END, HVECTORS, KERNBASE, KPD_ENTRIES, MMIO_PBASE, MMIO_SIZE, MMIO_VBASE,
    N_PD_ENTRIES, PAGE_SIZE,
};
use crate::error::{KernelError, KernelResult};
use crate::mm::addr::{p2v, v2p, PhysAddr, VirtAddr};
use crate::mm::kalloc;
use crate::mm::page_table::{PageDir, Pde, PdeFlags, PteFlags};

#[repr(C, align(16384))]
pub struct KernelDir(pub [Pde; KPD_ENTRIES]);

/// The live kernel directory. Mutated only by the boot path and by
/// `switch_uvm`/`switch_kvm`, always with IRQs off.
#[no_mangle]
pub static KPGDIR: SyncCell<KernelDir> = SyncCell::new(KernelDir([Pde::UNMAPPED; KPD_ENTRIES]));

/// Backing page for the high exception vectors, linked into the image so
/// the kmap table can name its physical address.
#[repr(C, align(4096))]
struct VectorPage([u8; PAGE_SIZE]);

static VECTOR_PAGE: SyncCell<VectorPage> = SyncCell::new(VectorPage([0; PAGE_SIZE]));

/// A permanent kernel mapping.
struct KMap {
    virt: usize,
    phys_start: usize,
    phys_end: usize,
    l1: PdeFlags,
    l2: PteFlags,
}

/// The fixed kernel layout. The RAM window below `EARLY_MEMORY_END` is
/// established by the entry assembly before any of this runs; stage 2
/// extends it to `pm_size`.
fn kmap(pm_size: usize) -> [KMap; 3] {
    [
        KMap {
            virt: KERNBASE,
            phys_start: 0,
            phys_end: pm_size,
            l1: PdeFlags::kernel_section(),
            l2: PteFlags::empty(),
        },
        KMap {
            virt: MMIO_VBASE,
            phys_start: MMIO_PBASE,
            phys_end: MMIO_PBASE + MMIO_SIZE,
            l1: PdeFlags::device_section(),
            l2: PteFlags::empty(),
        },
        KMap {
            virt: HVECTORS,
            phys_start: 0, // patched at runtime: the vector page
            phys_end: PAGE_SIZE,
            l1: PdeFlags::COARSE,
            l2: PteFlags::kernel_rw(),
        },
    ]
}

pub(crate) fn kernel_dir() -> PageDir {
    unsafe { PageDir::from_raw(VirtAddr::new(KPGDIR.get() as usize), KPD_ENTRIES) }
}

/// Stage 1: apply the fixed mappings the entry assembly left out, i.e.
/// the peripheral window and the high-vectors page.
pub(super) fn init() {
    let mut kdir = kernel_dir();
    let vectors_pa = v2p(VirtAddr::new(VECTOR_PAGE.get() as usize));
    for m in kmap(EARLY_MEMORY_END).iter().skip(1) {
        let pa = if m.virt == HVECTORS {
            vectors_pa
        } else {
            PhysAddr::new(m.phys_start)
        };
        kdir.map_range(
            VirtAddr::new(m.virt),
            m.phys_end - m.phys_start,
            pa,
            m.l1,
            m.l2,
        )
        .expect("kvm: fixed mappings");
    }
    arch::dsb();
    arch::flush_tlb();
}

/// Stage 2: the firmware tells us the real memory size; extend the
/// kernel window, hand the new RAM to the allocator, and drop the
/// bootstrap identity megabyte.
pub(super) fn init_stage2() {
    let early = arch::early_memory_limit();
    let pm_size = arch::detect_memory();
    if pm_size > early {
        let mut kdir = kernel_dir();
        let maps = kmap(pm_size);
        let window = &maps[0];
        kdir.map_range(
            VirtAddr::new(window.virt + early),
            pm_size - early,
            PhysAddr::new(early),
            window.l1,
            window.l2,
        )
        .expect("kvm: window extension");
        kalloc::free_range(p2v(PhysAddr::new(early)), p2v(PhysAddr::new(pm_size)));
    }

    #[cfg(all(target_os = "none", target_arch = "arm"))]
    {
        // The identity mapping only existed to carry the MMU switch.
        kernel_dir().entries_mut()[0] = Pde::UNMAPPED;
        arch::flush_dcache();
        arch::flush_tlb();
    }

    info!("memory: {} MiB", pm_size >> 20);
}

/// A fresh, empty user directory. The kernel half of the address space
/// lives in `KPGDIR` and is shared by everyone, so there is nothing to
/// copy here.
pub fn setup_kvm() -> KernelResult<PageDir> {
    let page = kalloc::alloc_page().ok_or(KernelError::OutOfMemory)?;
    kalloc::zero_page(page);
    Ok(unsafe { PageDir::from_raw(page, N_PD_ENTRIES) })
}

/// Install a process's user mappings as the active translation. IRQs are
/// masked across the copy so the table is never live while half-written.
pub fn switch_uvm(pgdir: &PageDir) {
    assert_eq!(pgdir.len(), N_PD_ENTRIES, "switch_uvm: not a user directory");
    push_off();
    let mut kdir = kernel_dir();
    kdir.entries_mut()[..N_PD_ENTRIES].copy_from_slice(pgdir.entries());
    arch::dsb();
    arch::flush_tlb();
    pop_off();
}

/// Back to the bare kernel mappings.
pub fn switch_kvm() {
    push_off();
    let mut kdir = kernel_dir();
    for pde in kdir.entries_mut()[..N_PD_ENTRIES].iter_mut() {
        *pde = Pde::UNMAPPED;
    }
    arch::dsb();
    arch::flush_tlb();
    pop_off();
}
