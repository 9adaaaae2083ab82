//! # Task Descriptors
//!
//! Defines the per-slot scheduling state kept by the scheduler. A slot is
//! identified by its index in the descriptor table; descriptors are created
//! once at boot and never destroyed.
//!
//! Only the scheduler writes `state` and `saved_sp`, and it does so only
//! from the two trap handlers (decision and dispatch). Everything outside
//! the crate sees descriptors through shared references.

use crate::stack::StackCursor;

/// Priority class of a slot. Lower value = higher precedence once eligible.
pub type PriorityClass = u8;

/// Entry point of a task body. Task bodies never return.
pub type TaskEntry = extern "C" fn() -> !;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task slot.
///
/// ```text
///   ┌─────┐  promotion   ┌───────┐   selected   ┌─────────┐
///   │ New │ ───────────► │ Ready │ ───────────► │ Running │
///   └─────┘              └───────┘ ◄─────────── └─────────┘
///                                   rescheduled
/// ```
///
/// `Waiting` and `Terminated` are part of the state set but no transition
/// leads to them: task bodies never block and never return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TaskState {
    /// Bootstrapped, but its class is not eligible yet.
    New,
    /// Eligible for selection once its class is active.
    Ready,
    /// Loaded on the processor.
    Running,
    /// Blocked on an event. Unused by the reference policy.
    Waiting,
    /// Finished. Unreachable while task bodies never return.
    Terminated,
}

// ---------------------------------------------------------------------------
// Static task description
// ---------------------------------------------------------------------------

/// What the firmware hands to the scheduler for each slot at boot.
#[derive(Clone, Copy)]
pub struct TaskSpec {
    /// Body of the task.
    pub entry: TaskEntry,
    /// Priority class the slot belongs to for its whole lifetime.
    pub class: PriorityClass,
}

impl TaskSpec {
    pub const fn new(entry: TaskEntry, class: PriorityClass) -> Self {
        Self { entry, class }
    }
}

// ---------------------------------------------------------------------------
// Task descriptor
// ---------------------------------------------------------------------------

/// Scheduling state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDescriptor {
    /// Where the slot's register context sits in its own stack region.
    /// Meaningful only while the slot is not `Running`.
    pub(crate) saved_sp: StackCursor,
    pub(crate) class: PriorityClass,
    pub(crate) state: TaskState,
}

impl TaskDescriptor {
    /// Placeholder used to build the table before boot.
    pub const EMPTY: Self = Self {
        saved_sp: StackCursor::BOTTOM,
        class: 0,
        state: TaskState::New,
    };

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[inline]
    pub fn class(&self) -> PriorityClass {
        self.class
    }

    #[inline]
    pub fn saved_sp(&self) -> StackCursor {
        self.saved_sp
    }

    /// A slot can be selected only when it is `Ready` and belongs to
    /// exactly the active class.
    #[inline]
    pub fn is_eligible(&self, active: PriorityClass) -> bool {
        self.class == active && self.state == TaskState::Ready
    }
}
