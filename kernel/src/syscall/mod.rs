//! System-call numbers, argument marshalling and dispatch.
//!
//! The number rides in r7, arguments in r0-r3, and the result goes back
//! in r0; every user-visible failure is -1.

mod proc;

use log::trace;
use numeric_enum_macro::numeric_enum;

use crate::error::{KernelError, KernelResult};
use crate::task;
use crate::trap::TrapFrame;

numeric_enum! {
    #[repr(usize)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SyscallNo {
        FORK = 1,
        EXIT = 2,
        WAIT = 3,
        KILL = 6,
        GETPID = 11,
        SBRK = 12,
        SLEEP = 13,
        UPTIME = 14,
    }
}

/// Decode and run the syscall carried by `tf`, leaving the result in r0.
pub fn syscall(tf: &mut TrapFrame) {
    let no = tf.syscall_no();
    let result = match SyscallNo::try_from(no) {
        Ok(no) => dispatch(no),
        Err(_) => Err(KernelError::SyscallUnsupported(no)),
    };
    match result {
        Ok(value) => tf.set_r0(value),
        Err(err) => {
            if let Some(p) = task::current() {
                trace!("pid {} ({}): syscall {} -> {:?}", p.pid, p.name(), no, err);
            }
            tf.set_r0(usize::MAX) // -1
        }
    }
}

fn dispatch(no: SyscallNo) -> KernelResult<usize> {
    match no {
        SyscallNo::FORK => proc::sys_fork(),
        SyscallNo::EXIT => proc::sys_exit(),
        SyscallNo::WAIT => proc::sys_wait(),
        SyscallNo::KILL => proc::sys_kill(),
        SyscallNo::GETPID => proc::sys_getpid(),
        SyscallNo::SBRK => proc::sys_sbrk(),
        SyscallNo::SLEEP => proc::sys_sleep(),
        SyscallNo::UPTIME => proc::sys_uptime(),
    }
}

/// Fetch 32-bit syscall argument `i` from the current trapframe.
pub fn argint(i: usize) -> KernelResult<usize> {
    if i >= 4 {
        return Err(KernelError::BadArgument);
    }
    let p = task::current().ok_or(KernelError::BadArgument)?;
    Ok(unsafe { (*p.tf).arg(i) })
}
