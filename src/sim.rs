//! # Hosted Trap Harness
//!
//! Replays the SysTick/PendSV handoff in software so the scheduler can be
//! exercised on a development host. A [`Machine`] owns a [`Scheduler`], a
//! simulated register file and a simulated PSP, and performs the same memory
//! traffic as the Cortex-M4 port:
//!
//! ```text
//!  Running ──timer──► save + decide ──┬─ Continue ──────────► Running
//!                                     └─ dispatch requested ─► DispatchPending
//!  DispatchPending ──tail-chain──► restore ──► Running
//! ```
//!
//! - **Exception entry** stacks R0-R3, R12, LR, PC, xPSR below PSP, plus
//!   S0-S15 and FPSCR when the task has live FP state.
//! - **Save** pushes S16-S31 (FP state only), then R4-R11 and EXC_RETURN,
//!   and parks the cursor.
//! - **Restore** pops the same blocks from the selected slot's cursor, then
//!   the exception return pops the hardware frame EXC_RETURN describes.
//!
//! A timer interrupt that arrives while a dispatch is still pending is
//! rejected: on hardware the priority configuration makes it impossible.

use crate::config::STACK_WORDS;
use crate::error::{ConfigError, ProtocolError};
use crate::policy::Policy;
use crate::scheduler::{Decision, Scheduler};
use crate::stack::{
    fp_saved_words, has_fp_frame, hw_frame_words, StackCursor, CALLEE_SAVED_WORDS,
    EXC_RETURN_THREAD_PSP, EXC_RETURN_THREAD_PSP_FP, FP_CALLEE_SAVED_WORDS, HW_FP_FRAME_WORDS,
    HW_FRAME_WORDS, SW_FRAME_WORDS,
};
use crate::task::TaskSpec;

/// Where the harness is in the two-phase handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A task is on the core; the next timer interrupt may arrive.
    Running,
    /// The decision requested a switch and the dispatch trap has not run.
    DispatchPending,
}

// Hardware frame layout, relative to its lowest word
const R12: usize = 4;
const LR: usize = 5;
const PC: usize = 6;
const XPSR: usize = 7;
const S0: usize = HW_FRAME_WORDS;
const FPSCR: usize = S0 + 16;

/// Simulated processor registers of the task on the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterFile {
    /// R0-R3.
    pub args: [u32; 4],
    /// R4-R11.
    pub callee_saved: [u32; CALLEE_SAVED_WORDS],
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
    /// CONTROL.FPCA: the task has used the FPU since it was last restored
    /// from a basic frame.
    pub fp_active: bool,
    /// S0-S15.
    pub fp_args: [u32; 16],
    /// S16-S31.
    pub fp_callee_saved: [u32; FP_CALLEE_SAVED_WORDS],
    pub fpscr: u32,
}

impl RegisterFile {
    /// EXC_RETURN the processor would produce when interrupting this task.
    fn exc_return(&self) -> u32 {
        if self.fp_active {
            EXC_RETURN_THREAD_PSP_FP
        } else {
            EXC_RETURN_THREAD_PSP
        }
    }

    /// Full FP frame; a basic frame is its first [`HW_FRAME_WORDS`] words.
    fn hw_frame(&self) -> [u32; HW_FP_FRAME_WORDS] {
        let mut frame = [0; HW_FP_FRAME_WORDS];
        frame[..R12].copy_from_slice(&self.args);
        frame[R12] = self.r12;
        frame[LR] = self.lr;
        frame[PC] = self.pc;
        frame[XPSR] = self.xpsr;
        frame[S0..FPSCR].copy_from_slice(&self.fp_args);
        frame[FPSCR] = self.fpscr;
        frame
    }

    fn load_hw_frame(&mut self, frame: &[u32]) {
        self.args.copy_from_slice(&frame[..R12]);
        self.r12 = frame[R12];
        self.lr = frame[LR];
        self.pc = frame[PC];
        self.xpsr = frame[XPSR];
        self.fp_active = frame.len() == HW_FP_FRAME_WORDS;
        if self.fp_active {
            self.fp_args.copy_from_slice(&frame[S0..FPSCR]);
            self.fpscr = frame[FPSCR];
        }
    }
}

/// A single simulated core running `N` task slots.
pub struct Machine<const N: usize> {
    scheduler: Scheduler<N>,
    regs: RegisterFile,
    /// Task whose stack PSP points into.
    on_core: usize,
    psp: StackCursor,
    phase: Phase,
}

impl<const N: usize> Machine<N> {
    /// Boot the scheduler and launch the first task from its bootstrap
    /// frame, as the firmware does before arming the timer.
    pub fn boot(policy: Policy, specs: &[TaskSpec; N]) -> Result<Self, ConfigError> {
        let mut scheduler = Scheduler::new(policy);
        scheduler.boot(specs)?;
        let first = scheduler.start()?;

        let mut machine = Self {
            scheduler,
            regs: RegisterFile::default(),
            on_core: first,
            psp: StackCursor::TOP,
            phase: Phase::Running,
        };
        machine.launch(first);
        Ok(machine)
    }

    /// First launch: skip the software part of the bootstrap frame and
    /// unstack the basic hardware frame by hand.
    fn launch(&mut self, task: usize) {
        let words = self.scheduler.stack(task).words();
        self.regs = RegisterFile::default();
        self.regs.load_hw_frame(&words[STACK_WORDS - HW_FRAME_WORDS..]);
        self.on_core = task;
        self.psp = StackCursor::TOP;
        self.phase = Phase::Running;
    }

    /// One timer period: interrupt entry, save, decision and, when a
    /// dispatch was requested, the tail-chained restore.
    pub fn step(&mut self) -> Result<Decision, ProtocolError> {
        let decision = self.timer_interrupt()?;
        if self.phase == Phase::DispatchPending {
            self.dispatch()?;
        }
        Ok(decision)
    }

    /// Run `ticks` timer periods, handing each decision to `observe`.
    pub fn run<F>(&mut self, ticks: u64, mut observe: F) -> Result<(), ProtocolError>
    where
        F: FnMut(&Self, Decision),
    {
        for _ in 0..ticks {
            let decision = self.step()?;
            observe(self, decision);
        }
        Ok(())
    }

    /// SysTick: exception entry, save step, decision. Leaves the machine in
    /// `DispatchPending` when the decision requested a switch.
    pub fn timer_interrupt(&mut self) -> Result<Decision, ProtocolError> {
        if self.phase != Phase::Running {
            return Err(ProtocolError::TimerDuringDispatch);
        }
        let task = self.on_core;
        let exc_return = self.regs.exc_return();
        let exhausted = ProtocolError::StackExhausted { task };
        let hw = self.psp.down(hw_frame_words(exc_return)).ok_or(exhausted)?;
        let fp = hw.down(fp_saved_words(exc_return)).ok_or(exhausted)?;
        let saved = fp.down(SW_FRAME_WORDS).ok_or(exhausted)?;
        let exc_slot = saved.index() + CALLEE_SAVED_WORDS;

        let frame = self.regs.hw_frame();
        let words = self.scheduler.stack_mut(task).words_mut();
        words[hw.index()..self.psp.index()].copy_from_slice(&frame[..hw_frame_words(exc_return)]);
        if has_fp_frame(exc_return) {
            words[fp.index()..hw.index()].copy_from_slice(&self.regs.fp_callee_saved);
        }
        words[saved.index()..exc_slot].copy_from_slice(&self.regs.callee_saved);
        words[exc_slot] = exc_return;
        self.scheduler.save_context(saved);

        let decision = self.scheduler.tick();

        if self.scheduler.take_dispatch_request() {
            self.phase = Phase::DispatchPending;
        } else {
            // Exception return straight to the interrupted task. Nothing
            // was clobbered, only copied out.
            self.psp = hw;
            self.exception_return(exc_return)?;
        }
        Ok(decision)
    }

    /// PendSV: restore the slot the decision selected.
    pub fn dispatch(&mut self) -> Result<(), ProtocolError> {
        if self.phase != Phase::DispatchPending {
            return Err(ProtocolError::NoDispatchPending);
        }
        let next = self.scheduler.current();
        self.restore(next)
    }

    fn restore(&mut self, task: usize) -> Result<(), ProtocolError> {
        let corrupt = ProtocolError::CorruptFrame { task };
        let cursor = self.scheduler.dispatch_cursor();
        let exc_slot = cursor.up(CALLEE_SAVED_WORDS).ok_or(corrupt)?;
        let fp = cursor.up(SW_FRAME_WORDS).ok_or(corrupt)?;

        let words = self.scheduler.stack(task).words();
        let exc_return = words[exc_slot.index()];
        let hw = fp.up(fp_saved_words(exc_return)).ok_or(corrupt)?;

        self.regs.callee_saved.copy_from_slice(&words[cursor.index()..exc_slot.index()]);
        if has_fp_frame(exc_return) {
            self.regs.fp_callee_saved.copy_from_slice(&words[fp.index()..hw.index()]);
        }
        self.on_core = task;
        self.psp = hw;
        self.exception_return(exc_return)
    }

    /// Pop the hardware frame `exc_return` describes and resume thread mode.
    fn exception_return(&mut self, exc_return: u32) -> Result<(), ProtocolError> {
        let task = self.on_core;
        let top = self
            .psp
            .up(hw_frame_words(exc_return))
            .ok_or(ProtocolError::CorruptFrame { task })?;
        let words = self.scheduler.stack(task).words();
        self.regs.load_hw_frame(&words[self.psp.index()..top.index()]);
        self.psp = top;
        self.phase = Phase::Running;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn scheduler(&self) -> &Scheduler<N> {
        &self.scheduler
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Task whose context is loaded on the simulated core.
    pub fn on_core(&self) -> usize {
        self.on_core
    }

    pub fn psp(&self) -> StackCursor {
        self.psp
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Stand-in for task code changing its registers between ticks.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }
}
