//! Process system calls.

use crate::error::{KernelError, KernelResult};
use crate::task::{self, current, do_exit, do_fork, do_kill, do_wait, grow_proc, sleep};
use crate::timer::TICKS;

use super::argint;

pub(super) fn sys_fork() -> KernelResult<usize> {
    do_fork()
}

pub(super) fn sys_exit() -> KernelResult<usize> {
    do_exit()
}

pub(super) fn sys_wait() -> KernelResult<usize> {
    do_wait()
}

pub(super) fn sys_kill() -> KernelResult<usize> {
    let pid = argint(0)?;
    do_kill(pid)?;
    Ok(0)
}

pub(super) fn sys_getpid() -> KernelResult<usize> {
    Ok(current().ok_or(KernelError::NoSuchProcess)?.pid)
}

/// Move the break by a signed delta; returns the previous break.
pub(super) fn sys_sbrk() -> KernelResult<usize> {
    let n = argint(0)? as isize;
    let addr = current().ok_or(KernelError::NoSuchProcess)?.sz;
    grow_proc(n)?;
    Ok(addr)
}

/// Sleep for `n` ticks on the tick counter, bailing out if killed.
pub(super) fn sys_sleep() -> KernelResult<usize> {
    let n = argint(0)?;
    TICKS.lock.acquire();
    let ticks0 = TICKS.get();
    while TICKS.get().wrapping_sub(ticks0) < n {
        let p = task::current().expect("sys_sleep: no process");
        if p.killed {
            TICKS.lock.release();
            return Err(KernelError::Killed);
        }
        sleep(TICKS.channel(), &TICKS.lock);
    }
    TICKS.lock.release();
    Ok(0)
}

pub(super) fn sys_uptime() -> KernelResult<usize> {
    TICKS.lock.acquire();
    let ticks = TICKS.get();
    TICKS.lock.release();
    Ok(ticks)
}
