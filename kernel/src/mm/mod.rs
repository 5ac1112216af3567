mod addr;
pub mod kalloc;
mod kvm;
mod page_table;
pub mod uvm;

pub use addr::{p2v, page_round_down, page_round_up, v2p, PhysAddr, VirtAddr};
pub use kvm::{setup_kvm, switch_kvm, switch_uvm, KPGDIR};
pub use page_table::{PageDir, Pde, PdeFlags, Pte, PteFlags};
pub use uvm::{
    alloc_uvm, clear_pte_u, copy_out, copy_uvm, dealloc_uvm, free_vm, init_uvm, load_uvm, uva2ka,
};

use crate::arch;

/// Stage 1: seed the page allocator with the boot-mapped RAM and finish
/// the fixed kernel mappings.
pub fn init() {
    let (start, end) = arch::free_memory_range();
    kalloc::free_range(VirtAddr::new(start), VirtAddr::new(end));
    kvm::init();
}

/// Stage 2: learn the real memory size, extend the window, retire the
/// bootstrap identity mapping.
pub fn init_stage2() {
    kvm::init_stage2();
}
