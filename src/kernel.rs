//! # Kernel
//!
//! Owns the global scheduler instance and glues it to the Cortex-M4 port.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► environment bring-up (clocks, peripherals)
//!         ├─► kernel::init(&tasks)  ← validate policy, bootstrap every slot
//!         └─► kernel::start(cp)     ← no return
//!               ├─► mask interrupts
//!               ├─► SysTick above PendSV
//!               ├─► arm SysTick
//!               └─► launch the first task, unmask
//! ```
//!
//! After `start` the scheduler is reached only through [`timer_tick`] and
//! [`dispatch_stack_pointer`], called from the naked SysTick and PendSV
//! handlers.

use core::cell::UnsafeCell;

use cortex_m::peripheral::SCB;

use crate::arch::cortex_m4;
use crate::config::{POLICY, TASK_COUNT};
use crate::error::ConfigError;
use crate::scheduler::Scheduler;
use crate::sync;
use crate::task::TaskSpec;
use crate::{log_debug, log_error, log_info};

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

struct SchedulerCell(UnsafeCell<Scheduler<TASK_COUNT>>);

// SAFETY: the cell is accessed from thread mode only inside a critical
// section before `start`, and afterwards only from SysTick and PendSV,
// which never run concurrently on a single core.
//
// Known limit: ordering between the two rests on priorities alone. If an
// interrupt above PendSV holds the core for a whole tick period, SysTick
// fires again while the previous dispatch is still pending; `timer_tick`
// detects this and halts.
unsafe impl Sync for SchedulerCell {}

static SCHEDULER: SchedulerCell = SchedulerCell(UnsafeCell::new(Scheduler::new(POLICY)));

/// # Safety
/// The caller must be one of the contexts listed on [`SchedulerCell`] and
/// must not hold the reference past its own return.
#[inline(always)]
unsafe fn scheduler() -> &'static mut Scheduler<TASK_COUNT> {
    &mut *SCHEDULER.0.get()
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Validate the task table against the policy and bootstrap every slot.
///
/// Must be called once, from `main`, before [`start`].
pub fn init(tasks: &[TaskSpec; TASK_COUNT]) -> Result<(), ConfigError> {
    // SAFETY: thread mode, interrupts masked, timer not armed yet.
    sync::critical_section(|_cs| unsafe { scheduler().boot(tasks) })?;

    for (id, task) in tasks.iter().enumerate() {
        log_debug!("task {}: class {}", id, task.class);
    }
    Ok(())
}

/// Arm the timer and launch the first task. **Does not return.**
///
/// Requires environment bring-up to have configured the core clock to
/// `SYSTEM_CLOCK_HZ`. Halts if [`init`] did not succeed.
pub fn start(mut cp: cortex_m::Peripherals) -> ! {
    cortex_m::interrupt::disable();
    cortex_m4::set_interrupt_priorities(&mut cp.SCB);
    cortex_m4::configure_systick(&mut cp.SYST);

    // SAFETY: interrupts are masked until the first task runs.
    let sched = unsafe { scheduler() };
    let first = match sched.start() {
        Ok(first) => first,
        Err(e) => {
            log_error!("cannot start scheduler: {}", e);
            halt()
        }
    };
    let cursor = sched.dispatch_cursor();
    let psp = sched.stack_mut(first).ptr_at(cursor);
    log_info!("scheduler armed, {} ticks per quantum", POLICY.quantum);

    // SAFETY: `psp` is the bootstrap frame of `first`; interrupts are masked.
    unsafe { cortex_m4::start_first_task(psp) }
}

/// Terminal state for unrecoverable conditions.
pub fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Trap entry points
// ---------------------------------------------------------------------------

/// Save commit and decision. Tail-called by `SysTick` with the address of
/// the context block it just pushed onto the interrupted task's stack.
///
/// # Safety
/// Only called from the SysTick handler.
pub(crate) unsafe extern "C" fn timer_tick(saved: *const u32) {
    // The interrupted task is not `current` until the pending dispatch runs
    if SCB::is_pendsv_pending() {
        log_error!("tick overran a pending dispatch");
        halt()
    }

    let sched = scheduler();
    let current = sched.current();
    let cursor = sched.stack(current).cursor_of(saved);
    match cursor {
        Some(cursor) => sched.save_context(cursor),
        None => {
            log_error!("task {} left its stack region", current);
            halt()
        }
    }

    sched.tick();
    if sched.take_dispatch_request() {
        cortex_m4::request_dispatch();
    }
}

/// Stack pointer of the slot selected by the last decision. Called by
/// `PendSV` with interrupts masked.
///
/// # Safety
/// Only called from the PendSV handler.
pub(crate) unsafe extern "C" fn dispatch_stack_pointer() -> *mut u32 {
    let sched = scheduler();
    let current = sched.current();
    let cursor = sched.dispatch_cursor();
    sched.stack_mut(current).ptr_at(cursor)
}
