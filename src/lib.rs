//! # Strata
//!
//! A preemptive, fixed-population task scheduler for a single ARM
//! Cortex-M4 core. Tasks are grouped into priority classes; only one class
//! is active at a time and its members share the processor round-robin,
//! one quantum each. At fixed tick counts (promotion epochs) a
//! numerically lower class becomes the active one.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 Task bodies (main.rs)                   │
//! ├────────────────────────────────────────────────────────┤
//! │             Kernel API (kernel.rs)                      │
//! │        init() · start() · timer_tick() · halt()        │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │   Policy           │  Hosted harness   │
//! │  scheduler.rs│   policy.rs        │  sim.rs           │
//! │  ─ tick()    │   ─ reschedule?    │  ─ Machine        │
//! │  ─ promote() │   ─ validate()     │  ─ step()         │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │     Descriptors (task.rs) · Stacks & frames (stack.rs)  │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    SysTick save · PendSV restore · first-task launch   │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: the descriptor table and all task stacks are fixed arrays
//!   inside one statically allocated [`scheduler::Scheduler`].
//! - **Index-addressed**: slots are referred to by index and saved stack
//!   positions by word offset into the slot's own region.
//! - **No locks after start**: only the SysTick and PendSV handlers touch
//!   the table, and their priorities keep them from nesting.
//!
//! The hardware port and the global instance build only for bare-metal ARM.
//! Everything else, including the [`sim`] harness, builds and tests on the
//! host.

#![no_std]

mod log;

pub mod config;
pub mod error;
pub mod policy;
pub mod scheduler;
pub mod sim;
pub mod stack;
pub mod sync;
pub mod task;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod arch;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod kernel;
