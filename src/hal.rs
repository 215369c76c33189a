//! Hardware Abstraction Layer: the thin platform façade the dispatcher and
//! scheduler are generic over. Every architectural opcode lives behind this
//! trait — CSR reads, the timer, the MMU, the TTY probe — so the rest of
//! the crate never needs an `asm!` block.
//!
//! `atomic_os` bakes its platform directly into `scheduler`/`interrupts`
//! (it only ever targets x86_64 via the `x86_64` crate). This crate instead
//! takes the platform as a generic parameter, the way `r3_kernel` and
//! `constance` parameterize their kernel over a `Port`/`System` trait —
//! that's what makes the scheduling and IPC logic testable on the host
//! without real RISC-V hardware.

use crate::pcb::ProcessId;

/// Everything the trap dispatcher and scheduler need from the platform.
pub trait Hal {
    /// Monotonic, non-decreasing microseconds since boot.
    fn now_us(&self) -> u64;

    /// Arms `core`'s preemption timer for the next tick.
    fn timer_reset(&self, core: usize);

    /// Translates `vaddr` in `pid`'s address space to a physical address.
    fn mmu_translate(&self, pid: ProcessId, vaddr: u64) -> u64;

    /// Installs `pid`'s page tables on the current core.
    fn mmu_switch(&self, pid: ProcessId);

    /// Flushes the TLB after a `mmu_switch`.
    fn mmu_flush_cache(&self);

    /// Releases `pid`'s page tables.
    fn mmu_free(&self, pid: ProcessId);

    /// True iff the TTY input ring is empty.
    fn tty_input_empty(&self) -> bool;

    /// Reads the `mcause`/`scause` CSR the dispatcher decodes on trap entry.
    fn read_cause(&self) -> u64;

    /// Reads the trapped PC (`mepc`/`sepc`).
    fn read_epc(&self) -> u64;

    /// Writes back the (possibly advanced) trapped PC before trap return.
    fn write_epc(&self, pc: u64);

    /// Selects the privilege mode trap return will drop into.
    fn set_mpp(&self, mode: PrivilegeMode);

    /// Re-enables interrupts (taken on the idle path, after the kernel lock
    /// has already been released by the caller).
    fn enable_interrupts(&self);

    /// Issues the architectural wait-for-interrupt. Callers MUST have
    /// released the kernel lock first: the dispatcher itself never calls
    /// this, so whatever glue code invokes `handle_trap` must only reach
    /// for it after the lock guard has already been dropped.
    fn wait_for_interrupt(&self);

    /// Copies `out.len()` bytes out of physical memory starting at `paddr`,
    /// the physical address `mmu_translate`'s result is consumed through.
    fn read_phys_bytes(&self, paddr: u64, out: &mut [u8]);

    /// Copies `data` into physical memory starting at `paddr`.
    fn write_phys_bytes(&self, paddr: u64, data: &[u8]);

    /// Snapshots the register file out of the architecturally fixed save
    /// area: the trap prologue/epilogue owns those bytes, and the
    /// dispatcher copies them in and out of the PCB. Called once per trap,
    /// at context-save time.
    fn read_saved_regs(&self) -> crate::pcb::SavedRegs;

    /// Writes `regs` back into the fixed save area, ready for the trap
    /// epilogue to restore into hardware registers on trap return.
    fn write_saved_regs(&self, regs: &crate::pcb::SavedRegs);
}

/// The privilege mode trap return should drop into, set via `Hal::set_mpp`:
/// user PCBs return to user mode, kernel PCBs return to machine mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
    User,
    Machine,
}

#[cfg(test)]
pub mod mock {
    //! An in-memory `Hal` used by the unit test scenarios below, in the
    //! style of the `r3_port_std`/`constance_port_std` host test ports: a
    //! software clock and plain buffers stand in for the timer and
    //! physical memory, so the scheduling and IPC logic can be exercised
    //! as ordinary `#[test]` functions.

    use super::{Hal, PrivilegeMode};
    use crate::pcb::ProcessId;
    use std::cell::RefCell;
    use std::collections::HashMap;

    pub struct MockHal {
        pub clock_us: RefCell<u64>,
        pub cause: RefCell<u64>,
        pub epc: RefCell<u64>,
        pub tty_empty: RefCell<bool>,
        pub interrupts_enabled: RefCell<bool>,
        pub mpp: RefCell<PrivilegeMode>,
        /// Physical memory, addressed by the `u64` `mmu_translate` hands
        /// back. Tests pre-populate this directly rather than simulating a
        /// real page table.
        pub phys_mem: RefCell<HashMap<u64, Vec<u8>>>,
        pub timer_resets: RefCell<u32>,
        pub mmu_switches: RefCell<Vec<ProcessId>>,
        pub mmu_frees: RefCell<Vec<ProcessId>>,
        pub waits_for_interrupt: RefCell<u32>,
        pub saved_regs: RefCell<crate::pcb::SavedRegs>,
    }

    impl MockHal {
        pub fn new() -> Self {
            MockHal {
                clock_us: RefCell::new(0),
                cause: RefCell::new(0),
                epc: RefCell::new(0),
                tty_empty: RefCell::new(true),
                interrupts_enabled: RefCell::new(false),
                mpp: RefCell::new(PrivilegeMode::User),
                phys_mem: RefCell::new(HashMap::new()),
                timer_resets: RefCell::new(0),
                mmu_switches: RefCell::new(Vec::new()),
                mmu_frees: RefCell::new(Vec::new()),
                waits_for_interrupt: RefCell::new(0),
                saved_regs: RefCell::new([0; crate::config::REGS_COUNT]),
            }
        }

        pub fn advance_us(&self, delta: u64) {
            *self.clock_us.borrow_mut() += delta;
        }

        pub fn set_cause(&self, cause: u64) {
            *self.cause.borrow_mut() = cause;
        }

        pub fn inject_tty_key(&self) {
            *self.tty_empty.borrow_mut() = false;
        }

        /// Writes `bytes` at `paddr`, as if a user process had written its
        /// syscall argument block there.
        pub fn put_phys(&self, paddr: u64, bytes: &[u8]) {
            self.phys_mem.borrow_mut().insert(paddr, bytes.to_vec());
        }
    }

    impl Default for MockHal {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Hal for MockHal {
        fn now_us(&self) -> u64 {
            *self.clock_us.borrow()
        }

        fn timer_reset(&self, _core: usize) {
            *self.timer_resets.borrow_mut() += 1;
        }

        fn mmu_translate(&self, _pid: ProcessId, vaddr: u64) -> u64 {
            // Identity mapping, matching atomic_os's own "boot.asm identity
            // maps the first 1GB" shortcut — good enough for a host test
            // double that never runs real user code.
            vaddr
        }

        fn mmu_switch(&self, pid: ProcessId) {
            self.mmu_switches.borrow_mut().push(pid);
        }

        fn mmu_flush_cache(&self) {}

        fn mmu_free(&self, pid: ProcessId) {
            self.mmu_frees.borrow_mut().push(pid);
        }

        fn tty_input_empty(&self) -> bool {
            *self.tty_empty.borrow()
        }

        fn read_cause(&self) -> u64 {
            *self.cause.borrow()
        }

        fn read_epc(&self) -> u64 {
            *self.epc.borrow()
        }

        fn write_epc(&self, pc: u64) {
            *self.epc.borrow_mut() = pc;
        }

        fn set_mpp(&self, mode: PrivilegeMode) {
            *self.mpp.borrow_mut() = mode;
        }

        fn enable_interrupts(&self) {
            *self.interrupts_enabled.borrow_mut() = true;
        }

        fn wait_for_interrupt(&self) {
            *self.waits_for_interrupt.borrow_mut() += 1;
        }

        fn read_phys_bytes(&self, paddr: u64, out: &mut [u8]) {
            if let Some(bytes) = self.phys_mem.borrow().get(&paddr) {
                let n = out.len().min(bytes.len());
                out[..n].copy_from_slice(&bytes[..n]);
            }
        }

        fn write_phys_bytes(&self, paddr: u64, data: &[u8]) {
            self.phys_mem
                .borrow_mut()
                .insert(paddr, data.to_vec());
        }

        fn read_saved_regs(&self) -> crate::pcb::SavedRegs {
            *self.saved_regs.borrow()
        }

        fn write_saved_regs(&self, regs: &crate::pcb::SavedRegs) {
            *self.saved_regs.borrow_mut() = *regs;
        }
    }
}
