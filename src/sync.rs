//! # Synchronization
//!
//! Thread-mode access to the scheduler before the timer is armed. Once
//! scheduling starts, the table is touched only from the SysTick and PendSV
//! handlers, which the priority configuration keeps from nesting.

use cortex_m::interrupt;

/// Execute a closure with interrupts disabled.
///
/// Used by the kernel while it populates and launches the task table, so
/// a stray early SysTick cannot observe a half-built table.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&interrupt::CriticalSection) -> R,
{
    interrupt::free(f)
}
