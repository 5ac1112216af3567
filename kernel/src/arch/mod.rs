//! The machine layer. Everything that touches hardware lives under
//! `armv7`; host builds get deterministic shims instead so the
//! machine-independent core can run under `cargo test`.

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", target_arch = "arm"))] {
        mod armv7;
        pub use armv7::*;
    } else {
        mod host;
        pub use host::*;
    }
}

/// Timer line in `irq_pending[0]` (BCM283x system timer, channel 3).
pub const IRQ_TIMER: u32 = 1 << 3;

/// Mini-UART receive line in `irq_pending[0]`.
pub const IRQ_MINIUART: u32 = 1 << 29;

/// Callee-save register context of a paused kernel thread.
///
/// Written only by `__switch`; the saved stack pointer of a paused
/// process points at this record on its kernel stack. The layout must
/// match the pushes in the context-switch assembly.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub r4: usize,
    pub r5: usize,
    pub r6: usize,
    pub r7: usize,
    pub r8: usize,
    pub r9: usize,
    pub r10: usize,
    pub r11: usize,
    pub r12: usize,
    pub lr: usize,
    pub pc: usize,
}

impl Context {
    pub const fn zero() -> Self {
        Context {
            r4: 0,
            r5: 0,
            r6: 0,
            r7: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            lr: 0,
            pc: 0,
        }
    }

    /// A context that resumes at `pc`, with `lr` as the address the
    /// resumed code returns to.
    pub fn new(pc: usize, lr: usize) -> Self {
        let mut ctx = Context::zero();
        ctx.pc = pc;
        ctx.lr = lr;
        ctx
    }
}
