#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

// The boot assembly in `arch::armv7` owns `_start` and jumps straight
// into `acore_kernel::rust_main`; linking the library is all the binary
// has to do.
use acore_kernel as _;

#[cfg(not(target_os = "none"))]
fn main() {}
