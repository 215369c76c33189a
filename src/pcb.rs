//! The Process Control Block and the records it carries.

use crate::config::MSG_LEN;

/// Unique process identifier. `0` is reserved for the idle placeholder;
/// real processes are assigned `1, 2, 3, ...` and a pid is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

/// Process state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Unused,
    Loading,
    Ready,
    Running,
    Runnable,
    PendingSyscall,
}

/// The syscall types this kernel recognizes. `Send`/`Recv` rendezvous;
/// `Sleep`/`Yield` are the two syscalls that never block on a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallKind {
    Send,
    Recv,
    Sleep,
    Yield,
}

/// Whether a syscall is still waiting on a partner/deadline, or has
/// already been satisfied and is only waiting for the scheduler to notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallStatus {
    Pending,
    Done,
}

/// The in-kernel record of a process's current syscall.
///
/// `sender`/`receiver` are modeled as `Option<ProcessId>` rather than a
/// magic sentinel pid: `None` plays the role of "any sender" (on a `Recv`
/// filter) or "not applicable" (on a `Send`'s `receiver` once delivered,
/// or on `Sleep`/`Yield` throughout).
#[derive(Debug, Clone, Copy)]
pub struct SyscallRecord {
    pub kind: SyscallKind,
    pub status: SyscallStatus,
    /// `Send`: the sender's own pid, filled in by the kernel on ecall entry.
    /// `Recv`: the filter the caller asked for (`None` = `ANY`), replaced
    /// with the actual sender's pid once delivery succeeds.
    pub sender: Option<ProcessId>,
    /// `Send` only: the destination pid.
    pub receiver: Option<ProcessId>,
    /// Message payload. For `Sleep`, the first 8 bytes hold the requested
    /// duration in microseconds, little-endian (see `sleep_duration_us`).
    pub content: [u8; MSG_LEN],
}

impl SyscallRecord {
    pub const fn empty() -> Self {
        SyscallRecord {
            kind: SyscallKind::Yield,
            status: SyscallStatus::Done,
            sender: None,
            receiver: None,
            content: [0; MSG_LEN],
        }
    }

    /// Decodes the `Sleep` duration stashed in `content`'s first 8 bytes.
    pub fn sleep_duration_us(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.content[0..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn set_sleep_duration_us(&mut self, duration_us: u64) {
        self.content[0..8].copy_from_slice(&duration_us.to_le_bytes());
    }
}

/// The register file snapshotted at trap entry and restored at trap exit.
pub type SavedRegs = [u64; crate::config::REGS_COUNT];

/// A single process table slot.
#[derive(Debug, Clone, Copy)]
pub struct Process {
    pub pid: ProcessId,
    pub status: ProcessState,
    pub saved_pc: u64,
    pub saved_regs: SavedRegs,
    pub syscall: SyscallRecord,
    pub queue_level: u8,
    pub queue_time_us: u64,
    pub wakeup_time_us: u64,
    pub creation_time_us: u64,
    pub first_scheduled_us: u64,
    pub total_cpu_us: u64,
    pub termination_time_us: u64,
    pub timer_tick_count: u64,
    /// Internal bookkeeping: instant this PCB was last installed as
    /// `Running`, consumed by the accounting flush on every transition out
    /// of `Running`.
    pub(crate) last_scheduled_us: u64,
    /// Internal bookkeeping: the hart that last ran this PCB while
    /// `Running`, so `core_to_slot` can be kept in sync.
    pub(crate) core_id: usize,
}

impl Process {
    /// The idle placeholder occupying slot 0. Never scheduled by name —
    /// `core_to_slot[c] == 0` means "this core is idle", not "running pid 0".
    pub const fn idle() -> Self {
        Process {
            pid: ProcessId(0),
            status: ProcessState::Unused,
            saved_pc: 0,
            saved_regs: [0; crate::config::REGS_COUNT],
            syscall: SyscallRecord::empty(),
            queue_level: 0,
            queue_time_us: 0,
            wakeup_time_us: 0,
            creation_time_us: 0,
            first_scheduled_us: 0,
            total_cpu_us: 0,
            termination_time_us: 0,
            timer_tick_count: 0,
            last_scheduled_us: 0,
            core_id: 0,
        }
    }

    pub fn is_runnable_candidate(&self) -> bool {
        matches!(self.status, ProcessState::Ready | ProcessState::Runnable)
    }
}

/// Target of `Table::free` — `ALL` frees every non-idle slot (used when a
/// core or the whole kernel is being torn down), modeled as an enum
/// instead of a sentinel pid for the same reason `ANY` is `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeTarget {
    One(ProcessId),
    All,
}
