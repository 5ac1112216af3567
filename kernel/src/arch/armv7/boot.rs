//! Kernel entry. The firmware drops us here in some privileged mode with
//! the MMU off, executing at the load address. Build just enough of the
//! live kernel directory to run at the link address, turn the MMU on and
//! continue in `rust_main` on the boot stack.
//!
//! The table built here is `KPGDIR` itself: the identity section that
//! covers this code (cleared again by `mm::init_stage2`) plus a
//! conservative 256 MiB kernel window. Section attribute 0x40E is
//! section + cacheable + bufferable + kernel read/write, domain 0.

core::arch::global_asm!(
    r#"
.section .text.entry
.globl _start
_start:
    @ supervisor mode, IRQ and FIQ masked
    msr     cpsr_c, #0xD3

    @ clear .bss: the directory and the boot stack live there, and this
    @ runs before any Rust code could do it
    ldr     r0, =__bss_start
    sub     r0, r0, #0x80000000
    ldr     r1, =__bss_end
    sub     r1, r1, #0x80000000
    mov     r2, #0
1:  cmp     r0, r1
    strlo   r2, [r0], #4
    blo     1b

    @ r0 = physical address of the live kernel directory
    ldr     r0, =KPGDIR
    sub     r0, r0, #0x80000000

    @ identity-map the first megabyte so the PC survives the MMU switch
    ldr     r2, =0x40E
    str     r2, [r0]

    @ map 256 MiB of RAM as sections at the kernel window
    mov     r3, #0x800              @ L1 slot of KERNBASE
    mov     r4, #0                  @ megabyte index
2:  ldr     r2, =0x40E
    orr     r2, r2, r4, lsl #20
    str     r2, [r0, r3, lsl #2]
    add     r3, r3, #1
    add     r4, r4, #1
    cmp     r4, #256
    blo     2b

    @ TTBR0 = directory, TTBCR N=0 (one table), domain 0 client
    mcr     p15, 0, r0, c2, c0, 0
    mov     r1, #0
    mcr     p15, 0, r1, c2, c0, 2
    mov     r1, #1
    mcr     p15, 0, r1, c3, c0, 0

    @ drop stale TLB entries, then MMU + caches on
    mov     r1, #0
    mcr     p15, 0, r1, c8, c7, 0
    dsb
    mrc     p15, 0, r1, c1, c0, 0
    orr     r1, r1, #0x1            @ M: MMU
    orr     r1, r1, #0x4            @ C: data cache
    orr     r1, r1, #0x1000         @ I: instruction cache
    mcr     p15, 0, r1, c1, c0, 0
    isb

    @ continue at the link address
    ldr     sp, =__boot_stack_top
    ldr     r1, =rust_main
    bx      r1

.ltorg

.section .bss.stack, "aw", %nobits
.align 12
__boot_stack:
    .space 0x4000                   @ BOOT_STACK_SIZE
.globl __boot_stack_top
__boot_stack_top:

.text
"#
);
