#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The page allocator is exhausted.
    OutOfMemory,

    /// Every process-table slot is in use.
    TooManyProcs,

    /// A user address was out of range or not user-accessible.
    BadAddress,

    /// The calling process has no children to wait for.
    NoChildren,

    /// No process with the given pid.
    NoSuchProcess,

    /// The calling process was killed while blocked.
    Killed,

    /// Growing past the user address-space bound, or shrinking below zero.
    BadBreak,

    /// Syscall argument index out of the register window.
    BadArgument,

    /// Unknown syscall number.
    SyscallUnsupported(usize),

    /// Read past the end of an inode.
    InodeBounds,
}

pub type KernelResult<T = ()> = Result<T, KernelError>;
