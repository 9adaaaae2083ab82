//! # Errors
//!
//! Everything the scheduler can reject. Configuration errors are caught at
//! boot, before the timer is armed; protocol errors only come out of the
//! hosted harness, where trap ordering is driven by software.

use core::fmt;

use crate::task::PriorityClass;

/// A task table or policy that could stall the selection scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ConfigError {
    /// The table has no slots.
    NoTasks,
    /// The quantum must be at least one tick.
    ZeroQuantum,
    /// Promotion epochs must be non-zero and strictly increasing.
    EpochOrder,
    /// Promotion classes must strictly decrease from the initial class.
    ClassOrder,
    /// A class that becomes active has no member to select.
    EmptyClass { class: PriorityClass },
    /// A slot belongs to a class that never becomes active.
    StrandedTask { task: usize, class: PriorityClass },
    /// `boot` was called on a table that is already populated.
    AlreadyBooted,
    /// `start` was called before a successful `boot`.
    NotBooted,
    /// `start` was called on a scheduler that already has a running task.
    AlreadyStarted,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTasks => write!(f, "task table is empty"),
            Self::ZeroQuantum => write!(f, "quantum must be non-zero"),
            Self::EpochOrder => write!(f, "promotion epochs must be non-zero and increasing"),
            Self::ClassOrder => write!(f, "promotion classes must decrease from the initial class"),
            Self::EmptyClass { class } => write!(f, "class {} has no tasks", class),
            Self::StrandedTask { task, class } => {
                write!(f, "task {} is in class {}, which never runs", task, class)
            }
            Self::AlreadyBooted => write!(f, "scheduler already booted"),
            Self::NotBooted => write!(f, "scheduler started before boot"),
            Self::AlreadyStarted => write!(f, "scheduler already started"),
        }
    }
}

/// A trap sequence the processor would never produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// A timer interrupt arrived while a dispatch was still pending.
    TimerDuringDispatch,
    /// The dispatch trap ran without a pending request.
    NoDispatchPending,
    /// A context push would leave the slot's stack region.
    StackExhausted { task: usize },
    /// A saved context reaches past the top of the slot's stack region.
    CorruptFrame { task: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimerDuringDispatch => write!(f, "timer interrupt with a dispatch pending"),
            Self::NoDispatchPending => write!(f, "dispatch without a pending request"),
            Self::StackExhausted { task } => write!(f, "task {} exhausted its stack", task),
            Self::CorruptFrame { task } => write!(f, "task {} has a corrupt saved frame", task),
        }
    }
}
