//! A small Unix-like teaching kernel for ARMv7 (Raspberry Pi 2/3 class)
//! boards: two-level paging, an xv6-shaped process table and scheduler,
//! high exception vectors, and interrupt-masking locks.
//!
//! The machine-independent core builds for the host as well; everything
//! hardware lives behind `arch`.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod cell;
pub mod config;
pub mod cons;
pub mod error;
pub mod fs;
pub mod mm;
pub mod syscall;
pub mod task;
pub mod timer;
pub mod trap;

use log::info;

/// Kernel main, entered from the boot assembly with the MMU on and the
/// boot stack installed.
#[no_mangle]
pub extern "C" fn rust_main() -> ! {
    cons::init();
    info!("acore booting");
    mm::init();
    trap::init();
    timer::init();
    mm::init_stage2();
    task::user_init();
    task::scheduler()
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::{Mutex, MutexGuard, Once};

    use crate::config::PAGE_SIZE;
    use crate::mm::{alloc_uvm, free_vm, kalloc, setup_kvm};
    use crate::task::{cpu, ProcState, PTABLE};
    use crate::trap::TrapFrame;

    static SERIAL: Mutex<()> = Mutex::new(());
    static INIT: Once = Once::new();

    /// Serialize tests (the process table, allocator and CPU record are
    /// process-wide) and put the emulated machine in a known state.
    pub fn setup() -> MutexGuard<'static, ()> {
        let guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        INIT.call_once(|| {
            crate::mm::init();
        });
        kernel_sync::reset_cpu_state(true);
        cpu().current = None;
        guard
    }

    /// A minimal running process installed as `current`: one user page
    /// and a trapframe at the top of its kernel stack.
    pub fn fake_process() -> usize {
        let slot = crate::task::test_alloc_proc();
        let p = unsafe { &mut PTABLE.slots()[slot] };
        let mut pgdir = setup_kvm().unwrap();
        assert_eq!(alloc_uvm(&mut pgdir, 0, PAGE_SIZE), PAGE_SIZE);
        p.pgdir = Some(pgdir);
        p.sz = PAGE_SIZE;
        unsafe { *p.tf = TrapFrame::new_user(0, PAGE_SIZE) };
        p.set_name("test");
        PTABLE.lock.acquire();
        p.state = ProcState::Running;
        PTABLE.lock.release();
        cpu().current = Some(slot);
        slot
    }

    /// Release everything `fake_process` built.
    pub fn destroy_process(slot: usize) {
        if cpu().current == Some(slot) {
            cpu().current = None;
        }
        let p = unsafe { &mut PTABLE.slots()[slot] };
        if let Some(kstack) = p.kstack.take() {
            kalloc::free_page(kstack);
        }
        if let Some(pgdir) = p.pgdir.take() {
            free_vm(pgdir);
        }
        if let Some(cwd) = p.cwd.take() {
            crate::fs::iput(cwd);
        }
        PTABLE.lock.acquire();
        p.clear();
        PTABLE.lock.release();
    }
}
