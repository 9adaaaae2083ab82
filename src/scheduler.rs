//! # Scheduler
//!
//! Hardware-agnostic scheduling state and the decision routine that runs
//! inside the periodic timer interrupt.
//!
//! ## Tick sequence
//!
//! ```text
//! SysTick entry
//!   ├─► save_context()   context pushed, cursor parked in the scratch slot
//!   └─► tick()
//!         1. commit the scratch cursor into the outgoing descriptor
//!         2. tick_count += 1
//!         3. quantum multiple or promotion epoch?  no ─► Continue
//!         4. apply due promotions (NEW ─► READY, active class widens)
//!         5. round-robin scan from current + 1 within the active class
//!         6. request dispatch
//! PendSV (tail-chained)
//!   └─► dispatch_cursor()  restore the selected slot
//! ```
//!
//! ## Design Notes
//!
//! - The descriptor table and the stacks are fixed arrays indexed by slot
//!   number; nothing is allocated or freed after boot.
//! - The scan visits each slot at most once, ending on the current slot,
//!   so it terminates even if the table were misconfigured. `boot` rejects
//!   such tables up front.
//! - Both entry points run in handler mode at fixed priorities and never
//!   nest with each other, so no lock guards this struct.

use crate::error::ConfigError;
use crate::policy::Policy;
use crate::stack::{self, Stack, StackCursor};
use crate::task::{PriorityClass, TaskDescriptor, TaskSpec, TaskState};
use crate::{log_error, log_info, log_trace, log_warn};

/// Result of one decision routine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Decision {
    /// Not a reschedule tick: the interrupted task resumes, no dispatch.
    Continue,
    /// A slot was selected and a dispatch requested. `from == to` when the
    /// outgoing task is the only eligible one.
    Reschedule { from: usize, to: usize },
    /// No eligible slot. The outgoing task keeps the processor.
    Stalled,
}

/// Process-wide scheduling state for a fixed population of `N` slots.
pub struct Scheduler<const N: usize> {
    tasks: [TaskDescriptor; N],
    stacks: [Stack; N],
    policy: Policy,
    current: usize,
    tick_count: u64,
    active_class: PriorityClass,
    last_saved_sp: StackCursor,
    dispatch_requested: bool,
    booted: bool,
    started: bool,
}

impl<const N: usize> Scheduler<N> {
    /// An empty table. Usable in a `static` initializer; call
    /// [`boot`](Self::boot) before the timer is armed.
    pub const fn new(policy: Policy) -> Self {
        Self {
            tasks: [TaskDescriptor::EMPTY; N],
            stacks: [Stack::ZEROED; N],
            policy,
            current: 0,
            tick_count: 0,
            active_class: policy.initial_class,
            last_saved_sp: StackCursor::TOP,
            dispatch_requested: false,
            booted: false,
            started: false,
        }
    }

    /// Validate the table and bootstrap every slot.
    ///
    /// Slots in the initial class start `Ready`, all others `New`.
    pub fn boot(&mut self, specs: &[TaskSpec; N]) -> Result<(), ConfigError> {
        if self.booted {
            return Err(ConfigError::AlreadyBooted);
        }

        let mut classes = [0; N];
        for (class, spec) in classes.iter_mut().zip(specs) {
            *class = spec.class;
        }
        self.policy.validate(&classes)?;

        for (id, spec) in specs.iter().enumerate() {
            let saved_sp = stack::init_stack(self.stacks[id].words_mut(), spec.entry);
            let state = if spec.class == self.policy.initial_class {
                TaskState::Ready
            } else {
                TaskState::New
            };
            self.tasks[id] = TaskDescriptor { saved_sp, class: spec.class, state };
        }

        self.booted = true;
        log_info!("booted {} tasks, initial class {}", N, self.policy.initial_class);
        Ok(())
    }

    /// Pick the first task: the lowest-numbered eligible slot.
    ///
    /// Returns its index; its bootstrap frame is at
    /// [`dispatch_cursor`](Self::dispatch_cursor). Only valid once, after a
    /// successful [`boot`](Self::boot).
    pub fn start(&mut self) -> Result<usize, ConfigError> {
        if !self.booted {
            return Err(ConfigError::NotBooted);
        }
        if self.started {
            return Err(ConfigError::AlreadyStarted);
        }

        let first = (0..N)
            .find(|&i| self.tasks[i].is_eligible(self.active_class))
            .ok_or(ConfigError::EmptyClass { class: self.active_class })?;

        self.tasks[first].state = TaskState::Running;
        self.current = first;
        self.started = true;
        log_info!("starting task {}", first);
        Ok(first)
    }

    // -----------------------------------------------------------------------
    // Trap-side operations
    // -----------------------------------------------------------------------

    /// Save step: park the outgoing task's stack cursor in the scratch slot.
    #[inline]
    pub fn save_context(&mut self, cursor: StackCursor) {
        self.last_saved_sp = cursor;
    }

    /// Decision routine. Runs once per timer interrupt, after
    /// [`save_context`](Self::save_context).
    ///
    /// Before [`start`](Self::start) the table holds no running task and
    /// the policy may be unvalidated; the tick is ignored.
    pub fn tick(&mut self) -> Decision {
        if !self.started {
            log_warn!("timer tick before scheduler start");
            return Decision::Continue;
        }

        let outgoing = self.current;
        self.tasks[outgoing].saved_sp = self.last_saved_sp;
        self.tick_count += 1;

        if !self.policy.triggers_reschedule(self.tick_count) {
            return Decision::Continue;
        }

        self.promote();

        if self.tasks[outgoing].state == TaskState::Running {
            self.tasks[outgoing].state = TaskState::Ready;
        }

        match self.select_next() {
            Some(next) => {
                self.tasks[next].state = TaskState::Running;
                self.current = next;
                self.dispatch_requested = true;
                log_trace!("tick {}: task {} -> {}", self.tick_count, outgoing, next);
                Decision::Reschedule { from: outgoing, to: next }
            }
            None => {
                self.tasks[outgoing].state = TaskState::Running;
                log_error!(
                    "tick {}: no ready task in class {}",
                    self.tick_count,
                    self.active_class
                );
                Decision::Stalled
            }
        }
    }

    /// Apply every promotion whose epoch has been reached and whose class is
    /// not active yet. Promotions only ever widen eligibility.
    fn promote(&mut self) {
        for promotion in self.policy.promotions {
            if self.tick_count < promotion.epoch || self.active_class <= promotion.class {
                continue;
            }
            self.active_class = promotion.class;

            let mut released = 0u32;
            for task in self.tasks.iter_mut().filter(|t| t.class == promotion.class) {
                if task.state == TaskState::New {
                    task.state = TaskState::Ready;
                    released += 1;
                }
            }
            log_info!(
                "tick {}: class {} active, {} tasks released",
                self.tick_count,
                promotion.class,
                released
            );
            if released == 0 {
                log_warn!("class {} had no new tasks to release", promotion.class);
            }
        }
    }

    /// Round-robin scan starting after the current slot and ending on it.
    fn select_next(&self) -> Option<usize> {
        (1..=N)
            .map(|step| (self.current + step) % N)
            .find(|&i| self.tasks[i].is_eligible(self.active_class))
    }

    /// Consume the pending-switch signal raised by [`tick`](Self::tick).
    #[inline]
    pub fn take_dispatch_request(&mut self) -> bool {
        core::mem::replace(&mut self.dispatch_requested, false)
    }

    /// Restore step: where the context of the current slot sits.
    #[inline]
    pub fn dispatch_cursor(&self) -> StackCursor {
        self.tasks[self.current].saved_sp
    }

    pub(crate) fn stack(&self, task: usize) -> &Stack {
        &self.stacks[task]
    }

    pub(crate) fn stack_mut(&mut self, task: usize) -> &mut Stack {
        &mut self.stacks[task]
    }

    // -----------------------------------------------------------------------
    // Read-only view
    // -----------------------------------------------------------------------

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The class selection is currently restricted to.
    #[inline]
    pub fn active_class(&self) -> PriorityClass {
        self.active_class
    }

    #[inline]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn descriptors(&self) -> &[TaskDescriptor; N] {
        &self.tasks
    }

    pub fn descriptor(&self, task: usize) -> &TaskDescriptor {
        &self.tasks[task]
    }

    /// Number of slots in `state`.
    pub fn count_in(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{POLICY, TASK_CLASSES, TASK_COUNT};
    use crate::policy::Promotion;
    use crate::stack::FRAME_WORDS;

    extern "C" fn idle() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn reference_specs() -> [TaskSpec; TASK_COUNT] {
        TASK_CLASSES.map(|class| TaskSpec::new(idle, class))
    }

    fn booted() -> Scheduler<TASK_COUNT> {
        let mut s = Scheduler::new(POLICY);
        s.boot(&reference_specs()).unwrap();
        s.start().unwrap();
        s
    }

    /// Drive one interrupt with the saved cursor the hardware would
    /// produce for a task that has not grown its stack.
    fn interrupt<const N: usize>(s: &mut Scheduler<N>) -> Decision {
        let cursor = s.dispatch_cursor();
        s.save_context(cursor);
        let d = s.tick();
        s.take_dispatch_request();
        d
    }

    fn run_to<const N: usize>(s: &mut Scheduler<N>, tick: u64) {
        while s.tick_count() < tick {
            interrupt(s);
        }
    }

    #[test]
    fn test_boot_states_and_frames() {
        let mut s = Scheduler::<TASK_COUNT>::new(POLICY);
        s.boot(&reference_specs()).unwrap();

        assert_eq!(s.descriptor(0).state(), TaskState::Ready);
        for i in 1..TASK_COUNT {
            assert_eq!(s.descriptor(i).state(), TaskState::New);
        }
        for (i, d) in s.descriptors().iter().enumerate() {
            assert_eq!(d.class(), TASK_CLASSES[i]);
            assert_eq!(d.saved_sp(), StackCursor::TOP.down(FRAME_WORDS).unwrap());
        }
        assert_eq!(s.active_class(), 2);
        assert_eq!(s.tick_count(), 0);
    }

    #[test]
    fn test_boot_twice_is_rejected() {
        let mut s = Scheduler::<TASK_COUNT>::new(POLICY);
        s.boot(&reference_specs()).unwrap();
        assert_eq!(s.boot(&reference_specs()), Err(ConfigError::AlreadyBooted));
    }

    #[test]
    fn test_boot_rejects_invalid_table() {
        let mut s = Scheduler::<3>::new(POLICY);
        let specs = [TaskSpec::new(idle, 2), TaskSpec::new(idle, 2), TaskSpec::new(idle, 0)];
        assert_eq!(s.boot(&specs), Err(ConfigError::EmptyClass { class: 1 }));
    }

    #[test]
    fn test_start_requires_boot() {
        let mut s = Scheduler::<TASK_COUNT>::new(POLICY);
        assert_eq!(s.start(), Err(ConfigError::NotBooted));
        assert_eq!(s.count_in(TaskState::Running), 0);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        // Two ready slots in the initial class
        let policy = Policy {
            quantum: 2,
            initial_class: 2,
            promotions: [
                Promotion { epoch: 10, class: 1 },
                Promotion { epoch: 20, class: 0 },
            ],
        };
        let specs = [
            TaskSpec::new(idle, 2),
            TaskSpec::new(idle, 2),
            TaskSpec::new(idle, 1),
            TaskSpec::new(idle, 0),
        ];
        let mut s = Scheduler::<4>::new(policy);
        s.boot(&specs).unwrap();
        assert_eq!(s.start(), Ok(0));
        assert_eq!(s.start(), Err(ConfigError::AlreadyStarted));
        assert_eq!(s.current(), 0);
        assert_eq!(s.count_in(TaskState::Running), 1);
        assert_eq!(s.descriptor(1).state(), TaskState::Ready);
    }

    #[test]
    fn test_tick_before_start_is_ignored() {
        // Never validated: a zero quantum must not reach the predicate
        let policy = Policy { quantum: 0, ..POLICY };
        let mut s = Scheduler::<TASK_COUNT>::new(policy);
        assert_eq!(s.tick(), Decision::Continue);
        assert_eq!(s.tick_count(), 0);
        assert!(!s.take_dispatch_request());

        let mut s = Scheduler::<TASK_COUNT>::new(POLICY);
        s.boot(&reference_specs()).unwrap();
        assert_eq!(s.tick(), Decision::Continue);
        assert_eq!(s.tick_count(), 0);
        assert_eq!(s.count_in(TaskState::Running), 0);
    }

    #[test]
    fn test_start_runs_first_ready_task() {
        let s = booted();
        assert_eq!(s.current(), 0);
        assert_eq!(s.descriptor(0).state(), TaskState::Running);
        assert_eq!(s.count_in(TaskState::Running), 1);
    }

    #[test]
    fn test_tick_count_advances_by_one() {
        let mut s = booted();
        for expected in 1..=50 {
            interrupt(&mut s);
            assert_eq!(s.tick_count(), expected);
        }
    }

    #[test]
    fn test_non_reschedule_tick_requests_nothing() {
        let mut s = booted();
        let cursor = s.dispatch_cursor();
        s.save_context(cursor);
        assert_eq!(s.tick(), Decision::Continue);
        assert!(!s.take_dispatch_request());
        assert_eq!(s.current(), 0);
        assert_eq!(s.descriptor(0).state(), TaskState::Running);
    }

    #[test]
    fn test_save_is_committed_every_tick() {
        let mut s = booted();
        let parked = StackCursor::new(100);
        s.save_context(parked);
        s.tick();
        assert_eq!(s.descriptor(0).saved_sp(), parked);
    }

    #[test]
    fn test_single_eligible_task_is_reselected() {
        let mut s = booted();
        run_to(&mut s, 2);
        let cursor = s.dispatch_cursor();
        s.save_context(cursor);
        assert_eq!(s.tick(), Decision::Reschedule { from: 0, to: 0 });
        assert!(s.take_dispatch_request());
        assert!(!s.take_dispatch_request());
        assert_eq!(s.dispatch_cursor(), cursor);
    }

    #[test]
    fn test_first_epoch_promotes_class_one() {
        let mut s = booted();
        run_to(&mut s, 1999);
        assert_eq!(s.current(), 0);
        assert_eq!(s.active_class(), 2);

        assert_eq!(interrupt(&mut s), Decision::Reschedule { from: 0, to: 1 });
        assert_eq!(s.active_class(), 1);
        assert_eq!(s.descriptor(0).state(), TaskState::Ready);
        for i in 2..=3 {
            assert_eq!(s.descriptor(i).state(), TaskState::Ready);
        }
        for i in 4..=6 {
            assert_eq!(s.descriptor(i).state(), TaskState::New);
        }
    }

    #[test]
    fn test_round_robin_within_active_class() {
        let mut s = booted();
        run_to(&mut s, 2000);
        // 2001, 2004, 2007, ... are quantum multiples
        let mut order = [0usize; 6];
        for slot in order.iter_mut() {
            let next = s.tick_count() + 1;
            run_to(&mut s, next);
            while !s.policy().triggers_reschedule(s.tick_count()) {
                interrupt(&mut s);
            }
            *slot = s.current();
        }
        assert_eq!(order, [2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_second_epoch_promotes_class_zero() {
        let mut s = booted();
        run_to(&mut s, 3999);
        assert_eq!(s.current(), 2);
        interrupt(&mut s);
        assert_eq!(s.active_class(), 0);
        assert_eq!(s.current(), 4);
        for i in 1..=3 {
            assert!(!s.descriptor(i).is_eligible(s.active_class()));
        }
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let mut s = booted();
        run_to(&mut s, 4000);
        let before = *s.descriptors();
        // Many later reschedules never revisit class 1 or 2
        for _ in 0..300 {
            interrupt(&mut s);
            assert_eq!(s.active_class(), 0);
            assert!(s.current() >= 4);
        }
        for i in 0..4 {
            assert_eq!(s.descriptor(i).state(), before[i].state());
        }
    }

    #[test]
    fn test_epochs_fire_inside_a_long_quantum() {
        let policy = Policy {
            quantum: 100,
            initial_class: 2,
            promotions: [
                Promotion { epoch: 5, class: 1 },
                Promotion { epoch: 7, class: 0 },
            ],
        };
        let mut s = Scheduler::<3>::new(policy);
        s.boot(&[TaskSpec::new(idle, 2), TaskSpec::new(idle, 1), TaskSpec::new(idle, 0)]).unwrap();
        s.start().unwrap();
        run_to(&mut s, 5);
        assert_eq!(s.current(), 1);
        run_to(&mut s, 7);
        assert_eq!(s.current(), 2);
        assert_eq!(s.active_class(), 0);
        assert_eq!(s.descriptor(1).state(), TaskState::Ready);
    }

    #[test]
    fn test_exactly_one_running_task_after_every_tick() {
        let mut s = booted();
        for _ in 0..4100 {
            interrupt(&mut s);
            assert_eq!(s.count_in(TaskState::Running), 1);
            assert_eq!(s.descriptor(s.current()).state(), TaskState::Running);
            assert_eq!(s.descriptor(s.current()).class(), s.active_class());
        }
    }

    #[test]
    fn test_waiting_task_is_skipped_and_not_released() {
        let mut s = booted();
        s.tasks[2].state = TaskState::Waiting;
        run_to(&mut s, 2000);
        assert_eq!(s.descriptor(2).state(), TaskState::Waiting);
        // 2001: scan from 2 skips the waiting slot
        interrupt(&mut s);
        assert_eq!(s.current(), 3);
    }

    #[test]
    fn test_stall_keeps_outgoing_task() {
        let mut s = booted();
        // Break the invariant by hand: no ready member left in class 1
        for i in 1..=3 {
            s.tasks[i].state = TaskState::Waiting;
        }
        run_to(&mut s, 1999);
        assert_eq!(interrupt(&mut s), Decision::Stalled);
        assert_eq!(s.current(), 0);
        assert_eq!(s.descriptor(0).state(), TaskState::Running);
    }
}
