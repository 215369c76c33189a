//! The process table and per-core map: process-wide mutable state owned by
//! a single lock, the way `atomic_os::scheduler::SCHEDULER` owns its
//! `Scheduler` behind a `spin::Mutex` + `lazy_static!`. Every trap is
//! expected to take this lock once, at entry, and hold it for the whole
//! dispatch — the single big kernel lock.

use crate::config::{CAP, NCORES};
use crate::hal::Hal;
use crate::pcb::{FreeTarget, Process, ProcessId, ProcessState};
use crate::stats;
use lazy_static::lazy_static;
use spin::Mutex;

/// Process table plus the bookkeeping the MLFQ and scheduler share.
pub struct Kernel {
    /// `pcbs[0]` is the idle placeholder; `pcbs[1..=CAP]` are real slots.
    pub pcbs: [Process; CAP + 1],
    pub core_to_slot: [usize; NCORES],
    next_pid: u64,
    pub last_global_reset_us: u64,
}

impl Kernel {
    pub const fn new() -> Self {
        Kernel {
            pcbs: [Process::idle(); CAP + 1],
            core_to_slot: [0; NCORES],
            next_pid: 1,
            last_global_reset_us: 0,
        }
    }

    /// Finds the slot holding `pid`, if any non-`Unused` slot matches.
    pub fn find_slot(&self, pid: ProcessId) -> Option<usize> {
        (1..=CAP).find(|&i| self.pcbs[i].status != ProcessState::Unused && self.pcbs[i].pid == pid)
    }

    /// True iff some non-`Unused` slot (any status) carries `pid` — used to
    /// validate a `Send`'s `receiver` at issuance time.
    pub fn pid_exists(&self, pid: ProcessId) -> bool {
        self.find_slot(pid).is_some()
    }

    /// Allocates a fresh PCB. Fatal (panics) if the table is full — a
    /// broken invariant, not a runtime condition the caller can recover
    /// from.
    pub fn alloc(&mut self, hal: &impl Hal) -> ProcessId {
        let slot = (1..=CAP)
            .find(|&i| self.pcbs[i].status == ProcessState::Unused)
            .unwrap_or_else(|| panic!("process table exhausted: all {CAP} slots in use"));

        let pid = ProcessId(self.next_pid);
        self.next_pid += 1;

        let now = hal.now_us();
        self.pcbs[slot] = Process {
            pid,
            status: ProcessState::Loading,
            queue_level: 0,
            creation_time_us: now,
            ..Process::idle()
        };
        pid
    }

    /// Frees one or every user process, emitting the lifecycle statistics
    /// block for each and releasing its MMU resources.
    pub fn free(&mut self, target: FreeTarget, hal: &impl Hal) {
        let slots: alloc_free::SlotList = match target {
            FreeTarget::One(pid) => self.find_slot(pid).into_iter().collect(),
            FreeTarget::All => (1..=CAP)
                .filter(|&i| {
                    self.pcbs[i].status != ProcessState::Unused
                        && self.pcbs[i].pid.0 >= crate::config::USER_START
                })
                .collect(),
        };

        for idx in slots {
            self.flush_accounting_if_running(idx, hal);
            let now = hal.now_us();
            self.pcbs[idx].termination_time_us = now;
            stats::report(&self.pcbs[idx]);
            hal.mmu_free(self.pcbs[idx].pid);
            self.pcbs[idx] = Process::idle();
        }
    }

    /// Transition into `Running`: stamps `last_scheduled_us`, and
    /// `first_scheduled_us` on the very first schedule.
    pub fn set_running(&mut self, idx: usize, core_id: usize, hal: &impl Hal) {
        let now = hal.now_us();
        let p = &mut self.pcbs[idx];
        if p.first_scheduled_us == 0 {
            p.first_scheduled_us = now;
        }
        p.last_scheduled_us = now;
        p.core_id = core_id;
        p.status = ProcessState::Running;
        self.core_to_slot[core_id] = idx;
    }

    /// Transition to `Runnable`. Flushes CPU accounting first, but only if
    /// the slot was actually `Running` — unblocking a `PendingSyscall` via
    /// IPC delivery is not a transition out of `Running` and accrues no
    /// CPU time.
    pub fn set_runnable(&mut self, idx: usize, hal: &impl Hal) {
        self.flush_accounting_if_running(idx, hal);
        self.pcbs[idx].status = ProcessState::Runnable;
    }

    /// Transition to `PendingSyscall` (the ecall path, always entered from
    /// `Running`). Flushes CPU accounting.
    pub fn set_pending(&mut self, idx: usize, hal: &impl Hal) {
        self.flush_accounting_if_running(idx, hal);
        self.pcbs[idx].status = ProcessState::PendingSyscall;
    }

    /// Flushes accrued CPU time into `total_cpu_us` and the MLFQ's
    /// `queue_time_us`/`queue_level` on every transition out of `Running`,
    /// then advances the checkpoint (`last_scheduled_us = now`) so the
    /// flushed interval is never counted twice. Callers must
    /// only invoke this while `idx` is actually `Running` — the
    /// timer-interrupt path in `trap` calls this directly without a status
    /// transition, since a tick doesn't by itself move the PCB out of
    /// `Running` (that happens later, in `schedule`'s demotion step, which
    /// flushes again — harmlessly, since the checkpoint has already caught
    /// up to `now` and the second flush's delta is zero).
    pub fn flush_cpu_accounting(&mut self, idx: usize, hal: &impl Hal) {
        let p = &mut self.pcbs[idx];
        let now = hal.now_us();
        let delta = now.saturating_sub(p.last_scheduled_us);
        p.total_cpu_us += delta;
        p.last_scheduled_us = now;
        crate::mlfq::account(p, delta);
    }

    fn flush_accounting_if_running(&mut self, idx: usize, hal: &impl Hal) {
        if self.pcbs[idx].status == ProcessState::Running {
            self.flush_cpu_accounting(idx, hal);
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// A tiny fixed-capacity collection avoids pulling in `alloc` just to
/// gather at most `CAP` slot indices out of `free`.
mod alloc_free {
    use crate::config::CAP;

    pub struct SlotList {
        buf: [usize; CAP],
        len: usize,
    }

    impl FromIterator<usize> for SlotList {
        fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
            let mut buf = [0usize; CAP];
            let mut len = 0;
            for v in iter {
                buf[len] = v;
                len += 1;
            }
            SlotList { buf, len }
        }
    }

    impl IntoIterator for SlotList {
        type Item = usize;
        type IntoIter = core::iter::Take<core::array::IntoIter<usize, CAP>>;
        fn into_iter(self) -> Self::IntoIter {
            self.buf.into_iter().take(self.len)
        }
    }
}

lazy_static! {
    pub static ref KERNEL: Mutex<Kernel> = Mutex::new(Kernel::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockHal;

    #[test]
    fn alloc_assigns_increasing_pids_and_zeroes_accounting() {
        let hal = MockHal::new();
        let mut k = Kernel::new();
        let p1 = k.alloc(&hal);
        let p2 = k.alloc(&hal);
        assert_eq!(p1, ProcessId(1));
        assert_eq!(p2, ProcessId(2));
        let slot = k.find_slot(p2).unwrap();
        assert_eq!(k.pcbs[slot].status, ProcessState::Loading);
        assert_eq!(k.pcbs[slot].queue_level, 0);
        assert_eq!(k.pcbs[slot].total_cpu_us, 0);
    }

    #[test]
    #[should_panic(expected = "process table exhausted")]
    fn alloc_panics_when_table_is_full() {
        let hal = MockHal::new();
        let mut k = Kernel::new();
        for _ in 0..CAP {
            k.alloc(&hal);
        }
        k.alloc(&hal);
    }

    #[test]
    fn free_emits_stats_and_releases_mmu() {
        let hal = MockHal::new();
        let mut k = Kernel::new();
        let pid = k.alloc(&hal);
        let slot = k.find_slot(pid).unwrap();
        k.pcbs[slot].status = ProcessState::Ready;
        k.set_running(slot, 0, &hal);
        hal.advance_us(5_000);
        k.free(FreeTarget::One(pid), &hal);

        assert!(!k.pid_exists(pid));
        assert_eq!(*hal.mmu_frees.borrow(), vec![pid]);
    }

    #[test]
    fn set_runnable_flushes_cpu_accounting_only_when_running() {
        let hal = MockHal::new();
        let mut k = Kernel::new();
        let pid = k.alloc(&hal);
        let slot = k.find_slot(pid).unwrap();
        k.pcbs[slot].status = ProcessState::Ready;
        k.set_running(slot, 0, &hal);
        hal.advance_us(30_000);
        k.set_runnable(slot, &hal);
        assert_eq!(k.pcbs[slot].total_cpu_us, 30_000);
        assert_eq!(k.pcbs[slot].queue_time_us, 30_000);

        // Unblocking a PendingSyscall (not Running) accrues no CPU time.
        k.pcbs[slot].status = ProcessState::PendingSyscall;
        hal.advance_us(99_000);
        k.set_runnable(slot, &hal);
        assert_eq!(k.pcbs[slot].total_cpu_us, 30_000);
    }
}
