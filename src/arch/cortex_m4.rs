//! # Cortex-M4 Port Layer
//!
//! Hardware-specific half of the two-phase context switch.
//!
//! ## Context Switch Mechanism
//!
//! Tasks run in Thread mode on PSP; handlers run on MSP. On exception entry
//! the processor stacks R0-R3, R12, LR, PC and xPSR onto PSP. A task with
//! live FP state (CONTROL.FPCA) also gets S0-S15 and FPSCR, stacked lazily,
//! and bit 4 of EXC_RETURN reads as clear.
//!
//! - **SysTick** (save + decide): pushes S16-S31 when bit 4 of EXC_RETURN
//!   is clear, then R4-R11 and EXC_RETURN, all below PSP *without* moving
//!   PSP. It then tail-calls the Rust decision entry with the resulting
//!   address. If no switch is requested the exception return simply pops
//!   the hardware frame; the software copy is abandoned.
//! - **PendSV** (restore): loads the selected slot's stack pointer, pops
//!   R4-R11 and that task's EXC_RETURN, pops S16-S31 if it describes an FP
//!   frame, sets PSP past them and returns with the popped EXC_RETURN, which
//!   unstacks the matching hardware frame.
//!
//! cortex-m-rt enables the FPU at reset on hard-float targets; automatic
//! and lazy state preservation stay at their reset defaults (on).
//!
//! ## Interrupt Priorities
//!
//! - SysTick: `TIMER_PRIORITY` (0x00), the decision always runs to
//!   completion before PendSV.
//! - PendSV: `DISPATCH_PRIORITY` (0xF0), tail-chained after SysTick exits.
//!
//! PendSV masks interrupts while it rewrites R4-R11 and PSP, so a SysTick
//! can never observe a half-restored context.

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};

use crate::config::{DISPATCH_PRIORITY, SYSTEM_CLOCK_HZ, TICK_HZ, TIMER_PRIORITY};
use crate::kernel;

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at `TICK_HZ` from the processor clock.
///
/// With the 168 MHz clock tree the reload value is 0xCD13F.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Put SysTick above PendSV so the dispatch trap can only tail-chain.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: called with interrupts masked, before the scheduler starts;
    // no priority-based critical section is in use yet.
    unsafe {
        scb.set_priority(SystemHandler::SysTick, TIMER_PRIORITY);
        scb.set_priority(SystemHandler::PendSV, DISPATCH_PRIORITY);
    }
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Pend the dispatch trap. It runs as soon as SysTick returns.
#[inline]
pub fn request_dispatch() {
    SCB::set_pendsv();
}

// ---------------------------------------------------------------------------
// First task launch
// ---------------------------------------------------------------------------

/// Start the first task from its bootstrap frame. Never returns.
///
/// Skips the zeroed R4-R11 and EXC_RETURN, switches Thread mode to PSP
/// with no FP context, unstacks the hardware part of the frame by hand and
/// branches to the entry point.
///
/// # Safety
/// `psp` must point at a bootstrap frame built by `stack::init_stack`, and
/// interrupts must be masked on entry; they are enabled right before the
/// branch.
pub unsafe fn start_first_task(psp: *const u32) -> ! {
    asm!(
        "adds r0, #36",        // skip R4-R11, EXC_RETURN
        "msr psp, r0",
        "movs r0, #2",         // CONTROL.SPSEL = 1, FPCA = 0
        "msr control, r0",
        "isb",
        "pop {{r0-r3, r12}}",
        "pop {{r4}}",          // LR placeholder, the body never returns
        "pop {{r5}}",          // PC
        "pop {{r6}}",          // xPSR, set by the processor
        "orr r5, r5, #1",      // bx needs the Thumb bit the frame clears
        "cpsie i",
        "bx r5",
        in("r0") psp,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// SysTick handler (save step)
// ---------------------------------------------------------------------------

/// SysTick exception handler.
///
/// Captures the interrupted task's callee-saved registers and EXC_RETURN
/// below its PSP and branches to `kernel::timer_tick` with LR still holding
/// EXC_RETURN, so the Rust function returns straight out of the exception.
///
/// # Safety
/// Installed in the vector table; never called directly.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn SysTick() {
    naked_asm!(
        "mrs r0, psp",
        "tst lr, #0x10",           // bit 4 clear: FP frame
        "it eq",
        "vstmdbeq r0!, {{s16-s31}}",
        "stmdb r0!, {{r4-r11, lr}}",
        "b {timer_tick}",
        timer_tick = sym kernel::timer_tick,
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (restore step)
// ---------------------------------------------------------------------------

/// PendSV exception handler.
///
/// Restores whichever slot the last decision committed, including the
/// case where it is the task that was just interrupted.
///
/// # Safety
/// Installed in the vector table; never called directly.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "bl {next_sp}",            // r0 = saved context of the current slot
        "ldmia r0!, {{r4-r11, lr}}",
        "tst lr, #0x10",
        "it eq",
        "vldmiaeq r0!, {{s16-s31}}",
        "msr psp, r0",
        "isb",
        "cpsie i",
        // Thread mode on PSP, with the frame layout the task was saved with
        "bx lr",
        next_sp = sym kernel::dispatch_stack_pointer,
    );
}
