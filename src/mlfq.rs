//! Multi-level-feedback-queue policy: the rules by which a PCB's
//! `queue_level` moves, layered on top of the plain data the process table
//! owns. This module never touches `status` or the table's slot array
//! directly — it only ever sees the `Process` it's handed, mirroring how
//! `atomic_os::scheduler::Scheduler::wake_all_blocked` stays a pure
//! transform over the processes passed to it rather than reaching back
//! into global state on its own.

use crate::config::{BASE_QUANTUM_US, L, RESET_PERIOD_US, SHELL_PID};
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::pcb::{Process, ProcessId, ProcessState};

/// `quantum(level) = (level + 1) * BASE_QUANTUM_US` — 100, 200, 300, 400,
/// 500 ms for the default `L = 5`, `BASE_QUANTUM_US = 100_000`.
pub fn quantum(level: u8) -> u64 {
    (level as u64 + 1) * BASE_QUANTUM_US
}

/// Accrues `delta_us` of runtime against `p`'s current level, demoting it
/// by exactly one level if that crosses the level's quantum — a single
/// call can cross at most one boundary. The bottom level (`L - 1`) is
/// sticky: it never demotes further, regardless of how large `delta` is.
pub fn account(p: &mut Process, delta_us: u64) {
    if p.queue_level as usize >= L - 1 {
        return;
    }
    p.queue_time_us += delta_us;
    if p.queue_time_us >= quantum(p.queue_level) {
        p.queue_level += 1;
        p.queue_time_us = 0;
    }
}

/// Called once per scheduler pass.
///
/// 1. If the TTY has pending input, boost the shell process alone.
/// 2. If `RESET_PERIOD_US` has elapsed since the last global reset, boost
///    every non-`Unused` PCB and rearm the reset clock.
///
/// Both boosts are level-0/time-0 resets, never partial: applying this
/// twice in a row without an intervening `account` call is a no-op.
pub fn maybe_reset(kernel: &mut Kernel, hal: &impl Hal) {
    if !hal.tty_input_empty() {
        if let Some(slot) = kernel.find_slot(ProcessId(SHELL_PID)) {
            boost(&mut kernel.pcbs[slot]);
        }
    }

    let now = hal.now_us();
    if now.saturating_sub(kernel.last_global_reset_us) >= RESET_PERIOD_US {
        for slot in kernel.pcbs.iter_mut() {
            if slot.status != ProcessState::Unused {
                boost(slot);
            }
        }
        kernel.last_global_reset_us = now;
    }
}

fn boost(p: &mut Process) {
    p.queue_level = 0;
    p.queue_time_us = 0;
}
