//! Process teardown: exit, wait, kill.

use log::{info, trace};

use crate::config::NPROC;
use crate::error::{KernelError, KernelResult};
use crate::fs::{file_close, iput};
use crate::mm::{free_vm, kalloc};

use super::sched::{cpu, sched, sleep, wakeup_locked};
use super::task::{init_slot, proc_channel, ProcState, PTABLE};

/// Terminate the current process. It stays a `Zombie`, holding only its
/// kstack and pgdir, until the parent reaps it. Never returns; the init
/// process must never get here.
pub fn do_exit() -> ! {
    let slot = cpu().current.expect("exit: no process");
    let init = init_slot().expect("exit: no init process");
    if slot == init {
        panic!("init exiting");
    }

    // File-subsystem references go back before the table is touched.
    let p = unsafe { &mut PTABLE.slots()[slot] };
    for file in p.ofile.iter_mut() {
        if let Some(f) = file.take() {
            file_close(f);
        }
    }
    if let Some(cwd) = p.cwd.take() {
        iput(cwd);
    }
    trace!("pid {} ({}) exiting", p.pid, p.name());

    PTABLE.lock.acquire();

    // The parent may be blocked in do_wait on its own PCB.
    if let Some(parent) = p.parent {
        wakeup_locked(proc_channel(parent));
    }

    // Orphans go to init; a zombie orphan needs init awake to reap it.
    for i in 0..NPROC {
        let q = unsafe { &mut PTABLE.slots()[i] };
        if q.parent == Some(slot) {
            q.parent = Some(init);
            if q.state == ProcState::Zombie {
                wakeup_locked(proc_channel(init));
            }
        }
    }

    let p = unsafe { &mut PTABLE.slots()[slot] };
    p.state = ProcState::Zombie;
    sched();
    panic!("zombie exit");
}

/// Wait for a child to exit and reap it. Returns the child's pid, or
/// `NoChildren` when there is nothing to wait for (also when killed).
pub fn do_wait() -> KernelResult<usize> {
    let slot = cpu().current.expect("wait: no process");
    PTABLE.lock.acquire();
    loop {
        let mut have_kids = false;
        for i in 0..NPROC {
            let q = unsafe { &mut PTABLE.slots()[i] };
            if q.parent != Some(slot) {
                continue;
            }
            have_kids = true;
            if q.state != ProcState::Zombie {
                continue;
            }

            // Found one; everything it still owns comes home.
            let pid = q.pid;
            kalloc::free_page(q.kstack.take().expect("wait: zombie without kstack"));
            free_vm(q.pgdir.take().expect("wait: zombie without pgdir"));
            q.clear();
            PTABLE.lock.release();
            info!("reaped pid {}", pid);
            return Ok(pid);
        }

        let p = unsafe { &PTABLE.slots()[slot] };
        if !have_kids || p.killed {
            PTABLE.lock.release();
            return Err(KernelError::NoChildren);
        }

        sleep(proc_channel(slot), &PTABLE.lock);
    }
}

/// Flag `pid` for termination. A sleeper is lifted to `Runnable` so it
/// can reach the next kernel-to-user boundary and die there.
pub fn do_kill(pid: usize) -> KernelResult {
    PTABLE.lock.acquire();
    for p in unsafe { PTABLE.slots() }.iter_mut() {
        if p.state != ProcState::Unused && p.pid == pid {
            p.killed = true;
            if p.state == ProcState::Sleeping {
                p.state = ProcState::Runnable;
            }
            PTABLE.lock.release();
            return Ok(());
        }
    }
    PTABLE.lock.release();
    Err(KernelError::NoSuchProcess)
}
