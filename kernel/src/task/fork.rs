//! fork: duplicate the current process.

use log::trace;

use crate::config::NOFILE;
use crate::error::{KernelError, KernelResult};
use crate::fs::{file_dup, idup};
use crate::mm::{copy_uvm, kalloc};

use super::sched::cpu;
use super::task::{alloc_proc, ProcState, PTABLE};

/// Clone the current process: a deep copy of its user memory, a copy of
/// its trapframe with r0 forced to zero (the child's return value), and
/// duplicated file references. Returns the child's pid to the parent.
pub fn do_fork() -> KernelResult<usize> {
    let parent_slot = cpu().current.ok_or(KernelError::NoSuchProcess)?;
    let child_slot = alloc_proc()?;

    let parent = unsafe { &mut PTABLE.slots()[parent_slot] };
    let child = unsafe { &mut PTABLE.slots()[child_slot] };

    let parent_sz = parent.sz;
    let parent_pgdir = parent.pgdir.as_mut().expect("fork: no pgdir");
    let pgdir = match copy_uvm(parent_pgdir, parent_sz) {
        Ok(pgdir) => pgdir,
        Err(err) => {
            // Undo alloc_proc: drop the kstack, put the slot back.
            kalloc::free_page(child.kstack.take().expect("fork: lost kstack"));
            PTABLE.lock.acquire();
            child.clear();
            PTABLE.lock.release();
            return Err(err);
        }
    };

    child.pgdir = Some(pgdir);
    child.sz = parent_sz;
    child.parent = Some(parent_slot);
    unsafe {
        *child.tf = *parent.tf;
        (*child.tf).set_r0(0);
    }
    for fd in 0..NOFILE {
        if let Some(f) = parent.ofile[fd] {
            child.ofile[fd] = Some(file_dup(f));
        }
    }
    child.cwd = parent.cwd.map(idup);
    child.set_name(parent.name());

    let pid = child.pid;
    trace!("fork: pid {} -> pid {}", parent.pid, pid);

    PTABLE.lock.acquire();
    child.state = ProcState::Runnable;
    PTABLE.lock.release();
    Ok(pid)
}
