//! # Strata Configuration
//!
//! Compile-time constants governing the scheduler and the reference
//! seven-task firmware. Nothing here is mutable at runtime: the task
//! population, each slot's priority class, the quantum and the promotion
//! epochs are all fixed when the firmware is built.

use crate::policy::{Policy, Promotion};
use crate::task::PriorityClass;

/// Number of task slots in the reference firmware.
pub const TASK_COUNT: usize = 7;

/// Per-task stack size in 32-bit words (1 KiB). Must hold the deepest
/// call chain of the task body plus one saved context, which is 51 words
/// for a task with live FP state.
pub const STACK_WORDS: usize = 256;

/// Ticks between ordinary reschedule checks.
pub const QUANTUM: u32 = 3;

/// Tick at which class 1 becomes the active class.
pub const FIRST_EPOCH: u64 = 2000;

/// Tick at which class 0 becomes the active class.
pub const SECOND_EPOCH: u64 = 4000;

/// Core clock after bring-up (25 MHz HSE, PLL M=25 N=336 P=2).
pub const SYSTEM_CLOCK_HZ: u32 = 168_000_000;

/// SysTick frequency in Hz. 168 MHz / 200 Hz gives a reload of 0xCD13F.
pub const TICK_HZ: u32 = 200;

/// SysTick priority. Must be numerically lower (more urgent) than
/// [`DISPATCH_PRIORITY`] so a decision always completes before the
/// dispatch trap it pends can run.
pub const TIMER_PRIORITY: u8 = 0x00;

/// PendSV priority: the lowest level on a part with 4 priority bits.
pub const DISPATCH_PRIORITY: u8 = 0xF0;

/// Priority class of each slot: slot 0 in class 2, slots 1-3 in class 1,
/// slots 4-6 in class 0.
pub const TASK_CLASSES: [PriorityClass; TASK_COUNT] = [2, 1, 1, 1, 0, 0, 0];

/// The reference promotion policy: class 2 runs alone until
/// [`FIRST_EPOCH`], class 1 until [`SECOND_EPOCH`], class 0 afterwards.
pub const POLICY: Policy = Policy {
    quantum: QUANTUM,
    initial_class: 2,
    promotions: [
        Promotion { epoch: FIRST_EPOCH, class: 1 },
        Promotion { epoch: SECOND_EPOCH, class: 0 },
    ],
};
