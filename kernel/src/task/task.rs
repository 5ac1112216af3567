//! The process table: a fixed arena of PCB slots under one lock.
//!
//! Cross-process references (parent links) are slot indices, never
//! pointers, so reaping a slot cannot dangle. Every `state` transition
//! and every scan across the table happens with `PTABLE.lock` held.

use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use kernel_sync::SpinLock;
use log::info;

use crate::arch::{self, Context};
use crate::cell::SyncCell;
use crate::config::{KSTACK_SIZE, NOFILE, NPROC, PAGE_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::fs::{namei, File, Inode};
use crate::mm::{init_uvm, kalloc, setup_kvm, switch_uvm, PageDir};
use crate::trap::TrapFrame;

use super::sched::cpu;

pub const NAME_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

/// Per-process control block. The slot owns its kernel stack and page
/// directory from allocation until `do_wait` reaps it.
pub struct Proc {
    pub state: ProcState,
    pub pid: usize,
    /// Bytes of user memory mapped; page-aligned between syscalls.
    pub sz: usize,
    pub pgdir: Option<PageDir>,
    /// Kernel stack page; trapframe and first context live at its top.
    pub kstack: Option<crate::mm::VirtAddr>,
    /// Wait channel; zero when not sleeping.
    pub chan: usize,
    pub killed: bool,
    /// Parent slot index; only init has none.
    pub parent: Option<usize>,
    pub tf: *mut TrapFrame,
    pub context: *mut Context,
    pub ofile: [Option<&'static File>; NOFILE],
    pub cwd: Option<&'static Inode>,
    name: [u8; NAME_LEN],
}

impl Proc {
    const fn unused() -> Self {
        Proc {
            state: ProcState::Unused,
            pid: 0,
            sz: 0,
            pgdir: None,
            kstack: None,
            chan: 0,
            killed: false,
            parent: None,
            tf: ptr::null_mut(),
            context: ptr::null_mut(),
            ofile: [None; NOFILE],
            cwd: None,
            name: [0; NAME_LEN],
        }
    }

    /// Back to a reusable slot; the owner must already have released the
    /// kstack and pgdir.
    pub(crate) fn clear(&mut self) {
        debug_assert!(self.kstack.is_none() && self.pgdir.is_none());
        *self = Proc::unused();
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_LEN];
        for (dst, src) in self.name.iter_mut().zip(name.bytes()) {
            *dst = src;
        }
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }
}

pub struct ProcTable {
    pub lock: SpinLock,
    slots: SyncCell<[Proc; NPROC]>,
}

const UNUSED_SLOT: Proc = Proc::unused();

pub static PTABLE: ProcTable = ProcTable {
    lock: SpinLock::new("ptable"),
    slots: SyncCell::new([UNUSED_SLOT; NPROC]),
};

impl ProcTable {
    /// # Safety
    ///
    /// The caller must hold `lock` for any scan or state change, or own
    /// the slot it touches (an `Embryo` it just carved out, or the
    /// running process's private fields).
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slots(&self) -> &'static mut [Proc; NPROC] {
        &mut *self.slots.get()
    }
}

static NEXT_PID: AtomicUsize = AtomicUsize::new(1);

const NO_SLOT: usize = usize::MAX;

static INIT_SLOT: AtomicUsize = AtomicUsize::new(NO_SLOT);

/// Slot of the init process, once `user_init` has run.
pub fn init_slot() -> Option<usize> {
    match INIT_SLOT.load(Ordering::Relaxed) {
        NO_SLOT => None,
        slot => Some(slot),
    }
}

/// The process running on this CPU.
pub fn current() -> Option<&'static mut Proc> {
    let slot = cpu().current?;
    Some(unsafe { &mut PTABLE.slots()[slot] })
}

/// Wait channel identifying a PCB: its address.
pub(super) fn proc_channel(slot: usize) -> usize {
    unsafe { &PTABLE.slots()[slot] as *const Proc as usize }
}

/// First user instructions, hand-assembled: loop { sleep(100) }.
///
/// ```text
///   mov r0, #100
///   mov r7, #13        @ SYS_sleep
///   swi 0
///   b   start
/// ```
static INITCODE: [u8; 16] = [
    0x64, 0x00, 0xA0, 0xE3, // mov r0, #100
    0x0D, 0x70, 0xA0, 0xE3, // mov r7, #13
    0x00, 0x00, 0x00, 0xEF, // swi 0
    0xFB, 0xFF, 0xFF, 0xEA, // b start
];

/// Carve a new PCB out of the table: find an `Unused` slot, take a pid,
/// lay a trapframe and a first context at the top of a fresh kernel
/// stack. The context resumes in `fork_return`, which falls through to
/// the trap-return assembly.
pub(super) fn alloc_proc() -> KernelResult<usize> {
    PTABLE.lock.acquire();
    let slot = unsafe { PTABLE.slots() }
        .iter()
        .position(|p| p.state == ProcState::Unused);
    let slot = match slot {
        Some(slot) => slot,
        None => {
            PTABLE.lock.release();
            return Err(KernelError::TooManyProcs);
        }
    };
    let p = unsafe { &mut PTABLE.slots()[slot] };
    p.state = ProcState::Embryo;
    p.pid = NEXT_PID.fetch_add(1, Ordering::Relaxed);
    PTABLE.lock.release();

    let kstack = match kalloc::alloc_page() {
        Some(kstack) => kstack,
        None => {
            PTABLE.lock.acquire();
            let p = unsafe { &mut PTABLE.slots()[slot] };
            p.clear();
            PTABLE.lock.release();
            return Err(KernelError::OutOfMemory);
        }
    };
    kalloc::zero_page(kstack);

    let p = unsafe { &mut PTABLE.slots()[slot] };
    p.kstack = Some(kstack);
    let mut sp = kstack.value() + KSTACK_SIZE;
    sp -= core::mem::size_of::<TrapFrame>();
    p.tf = sp as *mut TrapFrame;
    sp -= core::mem::size_of::<Context>();
    p.context = sp as *mut Context;
    unsafe {
        *p.context = Context::new(fork_return as usize, arch::trapret as usize);
    }
    Ok(slot)
}

/// First landing of every new process: the scheduler's table lock is
/// still held. Returning takes us into the trap-return assembly and out
/// to user mode.
#[no_mangle]
extern "C" fn fork_return() {
    PTABLE.lock.release();
}

#[cfg(test)]
pub(super) fn fork_return_addr() -> usize {
    fork_return as usize
}

/// Create the init process around the built-in `INITCODE` image.
pub fn user_init() {
    let slot = alloc_proc().expect("user_init: no process slot");
    let p = unsafe { &mut PTABLE.slots()[slot] };

    let mut pgdir = setup_kvm().expect("user_init: out of memory");
    init_uvm(&mut pgdir, &INITCODE);
    p.pgdir = Some(pgdir);
    p.sz = PAGE_SIZE;
    unsafe { *p.tf = TrapFrame::new_user(0, PAGE_SIZE) };
    p.set_name("initcode");
    p.cwd = namei("/");
    INIT_SLOT.store(slot, Ordering::Relaxed);
    info!("init process pid {}", p.pid);

    PTABLE.lock.acquire();
    p.state = ProcState::Runnable;
    PTABLE.lock.release();
}

/// Grow or shrink the current process's memory by `n` bytes and
/// reinstall its translation.
pub fn grow_proc(n: isize) -> KernelResult {
    let p = current().ok_or(KernelError::NoSuchProcess)?;
    if n == 0 {
        return Ok(());
    }
    let sz = p.sz;
    let pgdir = p.pgdir.as_mut().expect("grow_proc: no pgdir");
    let new = if n > 0 {
        let target = sz.checked_add(n as usize).ok_or(KernelError::BadBreak)?;
        match crate::mm::alloc_uvm(pgdir, sz, target) {
            0 => return Err(KernelError::OutOfMemory),
            new => new,
        }
    } else {
        let target = sz
            .checked_sub(n.unsigned_abs())
            .ok_or(KernelError::BadBreak)?;
        crate::mm::dealloc_uvm(pgdir, sz, target)
    };
    p.sz = new;
    switch_uvm(p.pgdir.as_ref().unwrap());
    Ok(())
}
