mod exit;
mod fork;
mod sched;
mod task;

pub use exit::{do_exit, do_kill, do_wait};
pub use fork::do_fork;
pub use sched::{cpu, do_yield, scheduler, sleep, wakeup, CpuContext};
pub use task::{
    current, grow_proc, init_slot, user_init, Proc, ProcState, ProcTable, PTABLE,
};

/// Test-only door into `alloc_proc`, which is deliberately private.
#[cfg(test)]
pub fn test_alloc_proc() -> usize {
    task::alloc_proc().unwrap()
}

#[cfg(test)]
mod tests {
    use super::task::alloc_proc;
    use super::*;
    use crate::config::{NOFILE, PAGE_SIZE};
    use crate::error::KernelError;
    use crate::fs::File;
    use crate::mm::{kalloc, uva2ka, VirtAddr};
    use crate::test_util::{self, destroy_process, fake_process};
    use crate::trap::TrapFrame;

    #[test]
    fn alloc_proc_carves_an_embryo() {
        let _g = test_util::setup();
        let before = kalloc::free_pages();

        let a = alloc_proc().unwrap();
        let b = alloc_proc().unwrap();
        {
            let procs = unsafe { PTABLE.slots() };
            assert_eq!(procs[a].state, ProcState::Embryo);
            assert!(procs[a].pid > 0);
            assert!(procs[b].pid > procs[a].pid);
            assert!(procs[a].kstack.is_some());
            assert!(!procs[a].tf.is_null());
            assert!(!procs[a].context.is_null());
        }

        destroy_process(a);
        destroy_process(b);
        assert_eq!(kalloc::free_pages(), before);

        // A cleared slot is indistinguishable from a never-used one.
        let procs = unsafe { PTABLE.slots() };
        assert_eq!(procs[a].state, ProcState::Unused);
        assert_eq!(procs[a].pid, 0);
        assert!(procs[a].kstack.is_none() && procs[a].pgdir.is_none());
    }

    #[test]
    fn fork_clones_memory_and_returns_zero_to_the_child() {
        let _g = test_util::setup();
        let before = kalloc::free_pages();

        let parent = fake_process();
        {
            let p = unsafe { &mut PTABLE.slots()[parent] };
            let pgdir = p.pgdir.as_mut().unwrap();
            let ka = uva2ka(pgdir, VirtAddr::new(0)).unwrap();
            unsafe { *(ka.value() as *mut u8) = 0x42 };
            unsafe { (*p.tf).r[0] = 999 };
        }

        let child_pid = do_fork().unwrap();

        let procs = unsafe { PTABLE.slots() };
        let child = procs
            .iter()
            .position(|q| q.pid == child_pid)
            .expect("child slot");
        assert_eq!(procs[child].state, ProcState::Runnable);
        assert_eq!(procs[child].parent, Some(parent));
        assert_eq!(procs[child].sz, PAGE_SIZE);
        assert_eq!(procs[child].name(), "test");

        // The child's syscall return is zero; the parent's r0 untouched.
        unsafe {
            assert_eq!((*procs[child].tf).arg(0), 0);
            assert_eq!((*procs[parent].tf).arg(0), 999);
        }

        // Deep copy: same bytes, different frames.
        let child_ka = {
            let q = unsafe { &mut PTABLE.slots()[child] };
            uva2ka(q.pgdir.as_mut().unwrap(), VirtAddr::new(0)).unwrap()
        };
        let parent_ka = {
            let p = unsafe { &mut PTABLE.slots()[parent] };
            uva2ka(p.pgdir.as_mut().unwrap(), VirtAddr::new(0)).unwrap()
        };
        assert_ne!(child_ka, parent_ka);
        assert_eq!(unsafe { *(child_ka.value() as *const u8) }, 0x42);

        destroy_process(child);
        destroy_process(parent);
        assert_eq!(kalloc::free_pages(), before);
    }

    #[test]
    fn fork_duplicates_file_references() {
        let _g = test_util::setup();
        static F: File = File::new();

        let parent = fake_process();
        {
            let p = unsafe { &mut PTABLE.slots()[parent] };
            p.ofile[3] = Some(&F);
        }
        let refs_before = F.ref_count();

        let child_pid = do_fork().unwrap();
        assert_eq!(F.ref_count(), refs_before + 1);

        let procs = unsafe { PTABLE.slots() };
        let child = procs.iter().position(|q| q.pid == child_pid).unwrap();
        assert!(procs[child].ofile[3].is_some());
        for fd in 0..NOFILE {
            if fd != 3 {
                assert!(procs[child].ofile[fd].is_none());
            }
        }

        // Undo the test's references by hand.
        crate::fs::file_close(procs[child].ofile[3].take().unwrap());
        procs[parent].ofile[3] = None;
        destroy_process(child);
        destroy_process(parent);
    }

    #[test]
    fn wait_reaps_a_zombie_child() {
        let _g = test_util::setup();
        let before = kalloc::free_pages();

        let parent = fake_process();
        let child_pid = do_fork().unwrap();
        let child = unsafe { PTABLE.slots() }
            .iter()
            .position(|q| q.pid == child_pid)
            .unwrap();

        PTABLE.lock.acquire();
        unsafe { PTABLE.slots()[child].state = ProcState::Zombie };
        PTABLE.lock.release();

        assert_eq!(do_wait(), Ok(child_pid));
        let procs = unsafe { PTABLE.slots() };
        assert_eq!(procs[child].state, ProcState::Unused);
        assert_eq!(procs[child].pid, 0);

        destroy_process(parent);
        assert_eq!(kalloc::free_pages(), before);
    }

    #[test]
    fn wait_without_children_fails() {
        let _g = test_util::setup();
        let parent = fake_process();
        assert_eq!(do_wait(), Err(KernelError::NoChildren));
        destroy_process(parent);
    }

    #[test]
    fn kill_lifts_a_sleeper() {
        let _g = test_util::setup();
        let slot = alloc_proc().unwrap();
        let pid = {
            let p = unsafe { &mut PTABLE.slots()[slot] };
            PTABLE.lock.acquire();
            p.state = ProcState::Sleeping;
            p.chan = 0xDEAD;
            PTABLE.lock.release();
            p.pid
        };

        assert_eq!(do_kill(pid), Ok(()));
        let p = unsafe { &PTABLE.slots()[slot] };
        assert!(p.killed);
        assert_eq!(p.state, ProcState::Runnable);

        assert_eq!(do_kill(987_654), Err(KernelError::NoSuchProcess));
        destroy_process(slot);
    }

    #[test]
    fn wakeup_matches_channels_exactly() {
        let _g = test_util::setup();
        let a = alloc_proc().unwrap();
        let b = alloc_proc().unwrap();
        {
            let procs = unsafe { PTABLE.slots() };
            PTABLE.lock.acquire();
            procs[a].state = ProcState::Sleeping;
            procs[a].chan = 0xDEAD;
            procs[b].state = ProcState::Sleeping;
            procs[b].chan = 0xBEEF;
            PTABLE.lock.release();
        }

        wakeup(0xDEAD);

        let procs = unsafe { PTABLE.slots() };
        assert_eq!(procs[a].state, ProcState::Runnable);
        assert_eq!(procs[b].state, ProcState::Sleeping);

        destroy_process(a);
        destroy_process(b);
    }

    #[test]
    fn sbrk_grows_and_shrinks_the_break() {
        let _g = test_util::setup();
        let before = kalloc::free_pages();

        let slot = fake_process();
        let old = current().unwrap().sz;
        assert_eq!(old, PAGE_SIZE);

        grow_proc(2 * PAGE_SIZE as isize).unwrap();
        assert_eq!(current().unwrap().sz, 3 * PAGE_SIZE);
        {
            let p = current().unwrap();
            let pgdir = p.pgdir.as_mut().unwrap();
            for i in 0..3 {
                assert!(uva2ka(pgdir, VirtAddr::new(i * PAGE_SIZE)).is_some());
            }
        }

        let mapped = before - kalloc::free_pages();
        grow_proc(-(PAGE_SIZE as isize)).unwrap();
        assert_eq!(current().unwrap().sz, 2 * PAGE_SIZE);
        // The shrunk page went back to the allocator.
        assert_eq!(before - kalloc::free_pages(), mapped - 1);
        {
            let p = current().unwrap();
            let pgdir = p.pgdir.as_mut().unwrap();
            assert!(uva2ka(pgdir, VirtAddr::new(2 * PAGE_SIZE)).is_none());
        }

        destroy_process(slot);
        assert_eq!(kalloc::free_pages(), before);
    }

    #[test]
    fn user_init_prepares_a_runnable_init_process() {
        let _g = test_util::setup();
        user_init();

        let slot = init_slot().expect("init registered");
        let p = unsafe { &mut PTABLE.slots()[slot] };
        assert_eq!(p.state, ProcState::Runnable);
        assert_eq!(p.sz, PAGE_SIZE);
        assert_eq!(p.name(), "initcode");
        assert!(p.parent.is_none());

        // The image landed at address zero, user-accessible.
        let pgdir = p.pgdir.as_mut().unwrap();
        let ka = uva2ka(pgdir, VirtAddr::new(0)).unwrap();
        let word = unsafe { *(ka.value() as *const u32) };
        assert_eq!(word, 0xE3A0_0064); // mov r0, #100

        // Its first trap return enters user mode at pc 0.
        let tf = unsafe { &*p.tf };
        assert!(tf.from_user());
        assert_eq!(tf.pc, 0);
        assert_eq!(tf.sp_usr, PAGE_SIZE);

        destroy_process(slot);
    }

    #[test]
    fn embryo_contexts_resume_in_fork_return() {
        let _g = test_util::setup();
        let slot = alloc_proc().unwrap();
        let p = unsafe { &PTABLE.slots()[slot] };
        let ctx = unsafe { &*p.context };

        assert_eq!(ctx.pc, super::task::fork_return_addr());
        assert_eq!(ctx.lr, crate::arch::trapret as usize);

        // The context sits directly below the trapframe at the stack top.
        let kstack = p.kstack.unwrap().value();
        assert_eq!(
            p.tf as usize + core::mem::size_of::<TrapFrame>(),
            kstack + crate::config::KSTACK_SIZE
        );
        assert_eq!(
            p.context as usize + core::mem::size_of::<crate::arch::Context>(),
            p.tf as usize
        );

        destroy_process(slot);
    }
}
