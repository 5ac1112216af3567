//! Exception entry and return.
//!
//! Each stub parks the trapped mode's return address and SPSR on the
//! supervisor stack with `srs`, moves the CPU to supervisor mode with
//! IRQs masked, and builds a `TrapFrame` (see `trap::trapframe` for the
//! layout the offsets below must match):
//!
//! ```text
//!   low   trapno, ifar, cpsr, r0-r12, sp_usr, lr_usr, pc, spsr   high
//! ```
//!
//! The user-bank r13/r14 are captured with the `^` form of `stm`. The
//! return path reloads them the same way for user-mode traps and skips
//! the banked reload when returning to a trapped kernel mode.

use core::arch::asm;

use super::{intc, mmu, uart};
use crate::config::{HVECTORS, PAGE_SIZE};
use crate::mm::kalloc;

core::arch::global_asm!(
    r#"
.text
@ One entry stub per exception class. `srs` parks the trapped mode's
@ return address and SPSR on the supervisor stack, `cps` moves us there
@ with IRQs masked, and the `^` store captures the user bank. A trap out
@ of a privileged mode must keep the supervisor lr instead of the stale
@ user one, both here and on the return leg.
.macro  vector  name, num, adjust
.globl vector_\name
vector_\name:
.if \adjust
    sub     lr, lr, #\adjust
.endif
    srsdb   sp!, #0x13
    cpsid   i, #0x13
    stmdb   sp, {{r0-r14}}^         @ r0-r12 plus the user-bank sp/lr
    sub     sp, sp, #60
    ldr     r0, [sp, #64]           @ spsr at trap
    and     r0, r0, #0x1F
    cmp     r0, #0x10
    strne   lr, [sp, #56]           @ privileged trap: frame lr = svc lr
    mrs     r1, cpsr
    mrc     p15, 0, r2, c6, c0, 2   @ IFAR
    mov     r3, #\num
    stmdb   sp!, {{r1}}             @ cpsr at trap
    stmdb   sp!, {{r2}}             @ ifar
    stmdb   sp!, {{r3}}             @ trap number
    mov     r0, sp
    bl      trap
    b       trapret
.endm

    vector  reset, 0x00, 0
    vector  und,   0x01, 0
    vector  swi,   0x40, 0
    vector  pabt,  0x02, 4
    vector  dabt,  0x04, 8
    vector  irq,   0x80, 4
    vector  fiq,   0x00, 0

.globl trapret
trapret:
    add     sp, sp, #12             @ drop trapno, ifar, cpsr
    ldr     lr, [sp, #64]           @ the frame's spsr
    and     lr, lr, #0x1F
    cmp     lr, #0x10               @ user mode?
    bne     1f
    ldmia   sp, {{r0-r14}}^         @ restore the user bank
    add     sp, sp, #60
    rfeia   sp!
1:  ldr     lr, [sp, #56]           @ kernel leg: supervisor lr, no bank
    ldmia   sp, {{r0-r12}}
    add     sp, sp, #60
    rfeia   sp!
"#
);

extern "C" {
    pub fn trapret();
    fn vector_reset();
    fn vector_und();
    fn vector_swi();
    fn vector_pabt();
    fn vector_dabt();
    fn vector_irq();
    fn vector_fiq();
}

/// `ldr pc, [pc, #24]`: each vector slot jumps through the address word
/// 32 bytes further on.
const LDR_PC_PC_24: u32 = 0xE59F_F018;

/// Privileged modes that get their own 4 KiB stack, FIQ and IRQ masked.
const MODES: [u32; 6] = [
    0x11, // FIQ
    0x12, // IRQ
    0x1B, // undefined
    0x17, // abort
    0x16, // monitor
    0x1F, // system
];

unsafe fn set_mode_stack(mode: u32, sp: usize) {
    asm!(
        "mrs {old}, cpsr",
        "msr cpsr_c, {mode}",
        "mov sp, {sp}",
        "msr cpsr_c, {old}",
        old = out(reg) _,
        mode = in(reg) mode | 0xC0, // IRQ and FIQ masked in that mode
        sp = in(reg) sp,
    );
}

/// Install the high exception vectors and the per-mode stacks.
///
/// `mm::init` has already mapped the vector page at `HVECTORS`.
pub fn trap_init() {
    // One stack page per privileged mode we can trap out of.
    for mode in MODES {
        let stack = kalloc::alloc_page().expect("trap_init: out of memory");
        unsafe { set_mode_stack(mode, stack.value() + PAGE_SIZE) };
    }

    // Write the vector preamble: eight `ldr pc` slots, then the handler
    // address words their offsets point at.
    let handlers = [
        vector_reset as usize,
        vector_und as usize,
        vector_swi as usize,
        vector_pabt as usize,
        vector_dabt as usize,
        vector_reset as usize, // reserved
        vector_irq as usize,
        vector_fiq as usize,
    ];
    let page = HVECTORS as *mut u32;
    unsafe {
        for i in 0..8 {
            page.add(i).write_volatile(LDR_PC_PC_24);
        }
        for (i, handler) in handlers.iter().enumerate() {
            page.add(8 + i).write_volatile(*handler as u32);
        }
    }

    // Point the CPU at the high vectors (SCTLR.V) and make the new code
    // visible to instruction fetch.
    unsafe {
        asm!(
            "mrc p15, 0, {t}, c1, c0, 0",
            "orr {t}, {t}, #0x2000",
            "mcr p15, 0, {t}, c1, c0, 0",
            t = out(reg) _,
        );
    }
    mmu::dsb();
    mmu::flush_caches();

    intc::fiq_disable();
    uart::init();
}
