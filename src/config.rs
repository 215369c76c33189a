//! Compile-time configuration constants for the kernel core.
//!
//! Grouped in one place the way `atomic_os::syscalls` centralizes its
//! `SYS_*` numbers and `atomic_os::interrupts::idt` centralizes its PIC
//! offsets — everything a platform integrator might want to retune lives
//! here, not scattered through the scheduler and trap code.

/// Process table capacity. Slot 0 is the idle placeholder; slots `1..=CAP`
/// hold real processes.
pub const CAP: usize = 16;

/// Number of hardware threads (harts) this kernel image is built for.
pub const NCORES: usize = 4;

/// Number of MLFQ priority levels. Level 0 is highest priority.
pub const L: usize = 5;

/// Base quantum for level 0, in microseconds. `quantum(level)` scales
/// linearly from here: 100, 200, 300, 400, 500 ms.
pub const BASE_QUANTUM_US: u64 = 100_000;

/// Global priority-boost period (Rule 5): every process is reset to level 0
/// after this much wall-clock time has elapsed since the last reset.
pub const RESET_PERIOD_US: u64 = 10_000_000;

/// Fixed payload size of a Send/Recv message, in bytes.
pub const MSG_LEN: usize = 64;

/// Smallest pid considered "user" rather than kernel/idle. Used to decide
/// whether an exception is process-terminating or fatal.
pub const USER_START: u64 = 1;

/// The pid of the interactive shell, boosted to level 0 on TTY input.
pub const SHELL_PID: u64 = 1;

/// Entry point a freshly-loaded process starts executing at.
pub const APPS_ENTRY: u64 = 0x2000_0000;

/// Virtual address of the `argc`/`argv` handoff cell for a freshly-loaded
/// process. `saved_regs[0]` gets `APPS_ARG`, `saved_regs[1]` gets
/// `APPS_ARG + 4`.
pub const APPS_ARG: u64 = 0x3000_0000;

/// Fixed virtual address of the user-space syscall argument block, read on
/// every ecall via `Hal::mmu_translate` + `Hal::read_phys_bytes`.
pub const SYSCALL_ARG: u64 = 0x3000_1000;

/// Size of the general-purpose register file snapshotted at trap entry
/// (RV64's `x0..x31`).
pub const REGS_COUNT: usize = 32;

/// `response` times beyond this are treated as a clock anomaly and clamped
/// (see `stats::compute`). Tunable per platform.
pub const RESPONSE_SANITY_CAP_US: u64 = 10_000_000;

/// `mcause` code for a machine-mode timer interrupt (the only interrupt
/// this kernel expects to see — anything else is fatal).
pub const CAUSE_TIMER_INTERRUPT: u64 = 7;

/// `mcause` code for an `ecall` trapped from user mode.
pub const CAUSE_ECALL_FROM_U: u64 = 8;

/// `mcause` code for an `ecall` trapped from machine mode.
pub const CAUSE_ECALL_FROM_M: u64 = 11;

/// Width, in bytes, of the `ecall` instruction — `saved_pc` is advanced by
/// this much so the instruction isn't re-executed on trap return.
pub const ECALL_WIDTH: u64 = 4;

/// Top bit of `mcause`: set for interrupts, clear for exceptions.
pub const CAUSE_INTERRUPT_BIT: u64 = 1 << 63;

/// Syscall ABI: the `type` tag a user-space ecall argument block carries
/// at offset 0.
pub const SYS_SEND: u8 = 0;
pub const SYS_RECV: u8 = 1;
pub const SYS_SLEEP: u8 = 2;
pub const SYS_YIELD: u8 = 3;

/// Wire layout of the syscall argument block at `SYSCALL_ARG`: a one-byte
/// type tag, an 8-byte LE argument (receiver pid for `Send`, sender filter
/// for `Recv` with `0` meaning `ANY`, duration in microseconds for
/// `Sleep`), and the `MSG_LEN`-byte payload (`Send` only).
pub const SYSCALL_WIRE_LEN: usize = 1 + 8 + MSG_LEN;
