/// Page size.
pub const PAGE_SIZE: usize = 4096;

/// Page size as a shift.
pub const PAGE_SHIFT: usize = 12;

/// One L1 section maps this much.
pub const SECTION_SIZE: usize = 1 << 20;

/// Base of the directly mapped kernel window. Physical address `pa` is
/// visible to the kernel at `KERNBASE + pa`.
pub const KERNBASE: usize = 0x8000_0000;

/// RAM window mapped by the boot assembly before the firmware has told us
/// how much memory the board actually has.
pub const EARLY_MEMORY_END: usize = 0x1000_0000;

/// Virtual address the high exception vectors live at.
pub const HVECTORS: usize = 0xFFFF_0000;

/// BCM283x peripheral block (physical).
pub const MMIO_PBASE: usize = 0x3F00_0000;

/// Size of the peripheral block.
pub const MMIO_SIZE: usize = 0x0100_0000;

/// Virtual base the peripheral block is remapped to.
pub const MMIO_VBASE: usize = 0xD000_0000;

/// Interrupt-controller registers, relative to the peripheral block.
pub const INT_REGS_OFFSET: usize = 0x0000_B200;

/// CPUs. The target is a single core; see `task::cpu`.
pub const CPU_NUM: usize = 1;

/// Boot stack size, carved out in the entry assembly.
pub const BOOT_STACK_SIZE: usize = 0x4000;

/// Kernel stack per process: one page.
pub const KSTACK_SIZE: usize = PAGE_SIZE;

/// Maximum number of processes.
pub const NPROC: usize = 64;

/// Open files per process.
pub const NOFILE: usize = 16;

/// Open files across the whole system.
pub const NFILE: usize = 100;

/// Timer ticks per second programmed into the system timer.
pub const TICKS_PER_SEC: usize = 100;
