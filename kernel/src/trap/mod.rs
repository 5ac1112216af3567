//! Trap dispatch: every exception funnels through `trap`, which routes
//! syscalls, drains the interrupt controller, and turns anything else
//! into a kill (user origin) or a panic (kernel origin).

mod trapframe;

use log::warn;

pub use trapframe::*;

use crate::arch;
use crate::task::{self, ProcState};
use crate::timer;

/// Install the exception vectors and per-mode stacks.
pub fn init() {
    arch::trap_init();
}

/// Entered from the exception stubs with the freshly built trapframe.
#[no_mangle]
pub extern "C" fn trap(tf: &mut TrapFrame) {
    if tf.trapno == T_SYSCALL {
        handle_syscall(tf);
        return;
    }

    let is_timer = match tf.trapno {
        T_IRQ => handle_irq(),
        _ => {
            handle_bad_trap(tf);
            false
        }
    };

    if let Some(p) = task::current() {
        // A kill that arrived while we were in the kernel takes effect
        // here, before and after the timer yield.
        if p.killed && tf.from_user() {
            task::do_exit();
        }
        if p.state == ProcState::Running && is_timer {
            task::do_yield();
        }
        let p = task::current().expect("trap: process vanished");
        if p.killed && tf.from_user() {
            task::do_exit();
        }
    }
}

fn handle_syscall(tf: &mut TrapFrame) {
    let p = task::current().expect("syscall: no process");
    if p.killed {
        task::do_exit();
    }
    p.tf = tf as *mut TrapFrame;
    crate::syscall::syscall(tf);
    let p = task::current().expect("syscall: process vanished");
    if p.killed {
        task::do_exit();
    }
}

/// Drain every pending interrupt source. Returns whether a timer tick
/// was among them.
fn handle_irq() -> bool {
    let mut is_timer = false;
    loop {
        let pending = [
            arch::irq_pending(0),
            arch::irq_pending(1),
            arch::irq_pending(2),
        ];
        if pending.iter().all(|&word| word == 0) {
            break;
        }

        let mut claimed = false;
        if pending[0] & arch::IRQ_TIMER != 0 {
            arch::timer_ack();
            timer::timer_tick();
            is_timer = true;
            claimed = true;
        }
        if pending[0] & arch::IRQ_MINIUART != 0 {
            arch::uart_rx();
            claimed = true;
        }

        if !claimed {
            // An enabled source nothing handles would pin us here; mask it.
            warn!("irq: masking unclaimed sources {:x?}", pending);
            for (bank, &word) in pending.iter().enumerate() {
                if word != 0 {
                    arch::irq_disable(bank, word);
                }
            }
        }
    }
    is_timer
}

fn handle_bad_trap(tf: &mut TrapFrame) {
    if tf.from_user() {
        if let Some(p) = task::current() {
            warn!(
                "pid {} ({}): trap {:#x} pc {:#x} ifar {:#x}, killing",
                p.pid,
                p.name(),
                tf.trapno,
                tf.pc,
                tf.ifar
            );
            p.killed = true;
            return;
        }
    }
    panic!("bad trap in kernel: {:#x?}", tf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{clear_irq, raise_irq, IRQ_MINIUART, IRQ_TIMER};
    use crate::test_util;
    use crate::timer::TICKS;

    fn ticks_now() -> usize {
        TICKS.lock.acquire();
        let t = TICKS.get();
        TICKS.lock.release();
        t
    }

    #[test]
    fn irq_drain_counts_a_tick() {
        let _g = test_util::setup();
        crate::arch::irq_enable(0, IRQ_TIMER | IRQ_MINIUART);

        let before = ticks_now();
        raise_irq(0, IRQ_TIMER);
        assert!(handle_irq());
        assert_eq!(ticks_now(), before + 1);
    }

    #[test]
    fn uart_line_is_not_a_timer() {
        let _g = test_util::setup();
        crate::arch::irq_enable(0, IRQ_TIMER | IRQ_MINIUART);

        raise_irq(0, IRQ_MINIUART);
        assert!(!handle_irq());
    }

    #[test]
    fn unclaimed_sources_get_masked() {
        let _g = test_util::setup();
        let stray = 1 << 9;
        crate::arch::irq_enable(1, stray);
        raise_irq(1, stray);

        assert!(!handle_irq());
        // Masked now: raising it again goes unseen.
        assert_eq!(crate::arch::irq_pending(1), 0);
        clear_irq(1, stray);
    }
}
