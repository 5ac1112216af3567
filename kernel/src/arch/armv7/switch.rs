//! The context switch.
//!
//! `__switch(old, new)` pushes the callee-save context onto the current
//! kernel stack, stores the resulting stack pointer through `old`, then
//! adopts `new` as the stack pointer and pops the context saved there.
//! The pushed record is `arch::Context`: r4-r12, lr, pc.

use super::super::Context;

core::arch::global_asm!(
    r#"
.text
.globl __switch
__switch:
    push    {{lr}}                  @ pc to resume at
    push    {{lr}}                  @ lr at resume
    push    {{r4-r12}}
    str     sp, [r0]                @ *old = saved context
    mov     sp, r1                  @ adopt the new one
    pop     {{r4-r12}}
    pop     {{lr}}
    pop     {{pc}}
"#
);

extern "C" {
    /// See the module docs; never returns in the caller's frame until
    /// something switches back.
    pub fn __switch(old: *mut *mut Context, new: *mut Context);
}
