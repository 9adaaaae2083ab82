//! # Architecture Port
//!
//! Hardware boundary of the scheduler. The Cortex-M4 port supplies the
//! SysTick save step, the PendSV restore step, first-task launch and the
//! timer and priority setup the handoff relies on.

pub mod cortex_m4;
