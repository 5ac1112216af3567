cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", target_arch = "arm"))] {
        /// Uniprocessor target; the scheduler never migrates.
        pub(crate) fn cpu_id() -> usize {
            0
        }

        /// Clear the CPSR I bit.
        pub fn intr_on() {
            unsafe { core::arch::asm!("cpsie i") };
        }

        /// Set the CPSR I bit.
        pub fn intr_off() {
            unsafe { core::arch::asm!("cpsid i") };
        }

        /// Are IRQs currently enabled?
        pub fn intr_get() -> bool {
            let cpsr: u32;
            unsafe { core::arch::asm!("mrs {0}, cpsr", out(reg) cpsr) };
            cpsr & (1 << 7) == 0
        }
    } else {
        use core::sync::atomic::{AtomicBool, Ordering};

        // Host builds model the IRQ-enable bit with a flag so the nesting
        // logic can be exercised off target.
        static INTR_ENABLED: AtomicBool = AtomicBool::new(false);

        pub(crate) fn cpu_id() -> usize {
            0
        }

        pub fn intr_on() {
            INTR_ENABLED.store(true, Ordering::Relaxed);
        }

        pub fn intr_off() {
            INTR_ENABLED.store(false, Ordering::Relaxed);
        }

        pub fn intr_get() -> bool {
            INTR_ENABLED.load(Ordering::Relaxed)
        }

        pub(crate) fn intr_force(enabled: bool) {
            INTR_ENABLED.store(enabled, Ordering::Relaxed);
        }
    }
}
