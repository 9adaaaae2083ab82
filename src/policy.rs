//! # Promotion Policy
//!
//! The rule that decides *when* the scheduler looks for a new task and
//! *which* class it looks in.
//!
//! - Every `quantum` ticks the decision routine rotates within the active
//!   class.
//! - At each promotion epoch the active class moves to a numerically lower
//!   class, whose `New` members all become `Ready`. Only members of the
//!   active class are ever selected.
//!
//! Because the selection scan runs inside the timer interrupt and must not
//! spin, the policy is checked against the task table at boot: every class
//! that can become active has at least one member, and no slot sits in a
//! class that never does.

use crate::error::ConfigError;
use crate::task::PriorityClass;

/// A tick at which `class` becomes the active class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub epoch: u64,
    pub class: PriorityClass,
}

/// Reschedule and promotion rule. Fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Ticks between ordinary reschedule checks.
    pub quantum: u32,
    /// Active class from the first tick.
    pub initial_class: PriorityClass,
    /// Promotions in epoch order.
    pub promotions: [Promotion; 2],
}

impl Policy {
    /// True on ticks where the decision routine selects a task: multiples
    /// of the quantum, and each promotion epoch regardless of the quantum.
    #[inline]
    pub fn triggers_reschedule(&self, tick: u64) -> bool {
        tick % self.quantum as u64 == 0 || self.promotions.iter().any(|p| p.epoch == tick)
    }

    /// Whether `class` is ever the active class.
    pub fn schedules(&self, class: PriorityClass) -> bool {
        class == self.initial_class || self.promotions.iter().any(|p| p.class == class)
    }

    /// Check the policy on its own and against the class of every slot.
    pub fn validate(&self, classes: &[PriorityClass]) -> Result<(), ConfigError> {
        if classes.is_empty() {
            return Err(ConfigError::NoTasks);
        }
        if self.quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }

        let mut last_epoch = 0;
        let mut last_class = self.initial_class;
        for p in &self.promotions {
            if p.epoch <= last_epoch {
                return Err(ConfigError::EpochOrder);
            }
            if p.class >= last_class {
                return Err(ConfigError::ClassOrder);
            }
            last_epoch = p.epoch;
            last_class = p.class;
        }

        let active_classes =
            core::iter::once(self.initial_class).chain(self.promotions.iter().map(|p| p.class));
        for class in active_classes {
            if !classes.contains(&class) {
                return Err(ConfigError::EmptyClass { class });
            }
        }

        if let Some((task, &class)) = classes.iter().enumerate().find(|&(_, &c)| !self.schedules(c)) {
            return Err(ConfigError::StrandedTask { task, class });
        }

        Ok(())
    }
}
