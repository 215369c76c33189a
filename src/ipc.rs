//! Synchronous send/receive rendezvous. The only agent that moves a PCB
//! out of `PendingSyscall` here is a successful delivery — everything else
//! (timeouts, demotion) lives in `trap`/`mlfq`. Kept separate from `trap`
//! the way `atomic_os::fs::pipe` is kept separate from the syscall
//! dispatcher that drives it: the matching rule is a pure policy over two
//! PCBs, independent of how a scheduler pass decides to walk the table.

use crate::config::SYSCALL_ARG;
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::pcb::{ProcessId, ProcessState, SyscallKind, SyscallStatus};

/// Attempts to advance slot `idx`'s syscall by one step. Only a `Send`
/// slot can make progress on its own initiative — a `Recv` slot is a
/// passive target, matched when *its* prospective sender's `Send` runs
/// this function: delivery is always attempted against the PCB whose pid
/// equals the sender's `receiver`.
///
/// Returns `true` iff a delivery happened this call — both PCBs are
/// `Runnable` by the time this returns `true`.
pub fn try_progress(kernel: &mut Kernel, idx: usize, hal: &impl Hal) -> bool {
    let send = &kernel.pcbs[idx];
    if send.syscall.kind != SyscallKind::Send || send.syscall.status != SyscallStatus::Pending {
        return false;
    }
    let sender_pid = send.pid;
    let content = send.syscall.content;
    let receiver_pid = match send.syscall.receiver {
        Some(r) => r,
        None => return false,
    };

    let recv_slot = match kernel.find_slot(receiver_pid) {
        Some(s) => s,
        // Existence was already validated fatally at Send issuance; the
        // receiver having since been freed mid-wait is not modeled — a
        // Send's only fatal check is at the moment it's issued.
        None => return false,
    };

    let ready_to_receive = {
        let recv = &kernel.pcbs[recv_slot];
        recv.status == ProcessState::PendingSyscall
            && recv.syscall.kind == SyscallKind::Recv
            && recv.syscall.status == SyscallStatus::Pending
            && matches_filter(recv.syscall.sender, sender_pid)
    };

    if !ready_to_receive {
        return false;
    }

    kernel.pcbs[recv_slot].syscall.content = content;
    kernel.pcbs[recv_slot].syscall.sender = Some(sender_pid);
    kernel.pcbs[recv_slot].syscall.status = SyscallStatus::Done;
    kernel.pcbs[idx].syscall.status = SyscallStatus::Done;

    // content is copied twice: user->kernel happened at ecall entry; this
    // is the kernel->user leg, into the receiver's own argument block so
    // neither address space needs the other mapped.
    let paddr = hal.mmu_translate(receiver_pid, SYSCALL_ARG);
    hal.write_phys_bytes(paddr + 1, &sender_pid.0.to_le_bytes());
    hal.write_phys_bytes(paddr + 9, &content);

    kernel.set_runnable(recv_slot, hal);
    kernel.set_runnable(idx, hal);
    true
}

fn matches_filter(filter: Option<ProcessId>, sender: ProcessId) -> bool {
    match filter {
        None => true,
        Some(wanted) => wanted == sender,
    }
}
