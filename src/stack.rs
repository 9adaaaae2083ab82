//! # Stack Regions and Frame Bootstrapping
//!
//! Each slot owns a fixed, 8-byte aligned block of [`STACK_WORDS`] words.
//! Positions inside a block are expressed as a [`StackCursor`], a word index
//! relative to the start of that block. Cursors stay valid no matter where
//! the scheduler lives in memory; the arch layer converts them to and from
//! raw PSP values at the trap boundary.
//!
//! ## Saved context (top = high address, growing down)
//!
//! ```text
//! [Hardware stacked frame]             8 words, or 26 with FP state
//!   S0-S15, FPSCR, reserved            (FP frame only)
//!   xPSR, PC, LR, R12, R3-R0
//! [S16-S31]                            16 words, FP frame only
//! [Software saved context]             9 words
//!   EXC_RETURN
//!   R11 .. R4                          <- cursor
//! ```
//!
//! Bit 4 of the saved EXC_RETURN tells which layout follows: clear when the
//! task had live floating-point state at preemption. The dispatch trap pops
//! R4-R11 and EXC_RETURN, pops S16-S31 if bit 4 is clear, points PSP past
//! them and returns with that EXC_RETURN, which makes the processor pop the
//! matching hardware frame.
//!
//! ## Bootstrap frame
//!
//! A basic frame: R4-R11 zero, EXC_RETURN `0xFFFF_FFFD` (thread mode, PSP,
//! no FP state), R0-R3 and R12 zero, LR 0, PC the task entry and xPSR with
//! only the Thumb bit. A fresh frame is therefore indistinguishable from a
//! task that was preempted right before its first instruction.

use crate::config::STACK_WORDS;
use crate::task::TaskEntry;

/// R4-R11.
pub const CALLEE_SAVED_WORDS: usize = 8;

/// Words in the software-saved part of a context (R4-R11, EXC_RETURN).
pub const SW_FRAME_WORDS: usize = CALLEE_SAVED_WORDS + 1;

/// S16-S31, saved by software only for tasks with live FP state.
pub const FP_CALLEE_SAVED_WORDS: usize = 16;

/// Words the processor stacks on exception entry (R0-R3, R12, LR, PC, xPSR).
pub const HW_FRAME_WORDS: usize = 8;

/// Hardware frame with FP state: adds S0-S15, FPSCR and a reserved word.
pub const HW_FP_FRAME_WORDS: usize = HW_FRAME_WORDS + 18;

/// Words in a bootstrap frame.
pub const FRAME_WORDS: usize = SW_FRAME_WORDS + HW_FRAME_WORDS;

/// Initial xPSR: only the Thumb bit set.
pub const INITIAL_XPSR: u32 = 0x0100_0000;

/// Return to thread mode on PSP with a basic frame.
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Return to thread mode on PSP with an FP frame.
pub const EXC_RETURN_THREAD_PSP_FP: u32 = 0xFFFF_FFED;

const EXC_RETURN_BASIC_FRAME: u32 = 1 << 4;

/// Whether `exc_return` describes a frame with FP state.
#[inline]
pub const fn has_fp_frame(exc_return: u32) -> bool {
    exc_return & EXC_RETURN_BASIC_FRAME == 0
}

/// Size of the hardware frame stacked under `exc_return`.
#[inline]
pub const fn hw_frame_words(exc_return: u32) -> usize {
    if has_fp_frame(exc_return) {
        HW_FP_FRAME_WORDS
    } else {
        HW_FRAME_WORDS
    }
}

/// Size of the S16-S31 block saved under `exc_return`.
#[inline]
pub const fn fp_saved_words(exc_return: u32) -> usize {
    if has_fp_frame(exc_return) {
        FP_CALLEE_SAVED_WORDS
    } else {
        0
    }
}

/// Word offsets inside a bootstrap frame, relative to its cursor.
pub mod offset {
    pub const EXC_RETURN: usize = 8;
    pub const R0: usize = 9;
    pub const R12: usize = 13;
    pub const LR: usize = 14;
    pub const PC: usize = 15;
    pub const XPSR: usize = 16;
}

const _: () = assert!(STACK_WORDS >= FRAME_WORDS, "stack region cannot hold a bootstrap frame");
const _: () = assert!(STACK_WORDS % 2 == 0, "stack top must stay 8-byte aligned");
const _: () = assert!(offset::XPSR == FRAME_WORDS - 1);

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Word index into a slot's private stack region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct StackCursor(usize);

impl StackCursor {
    /// Lowest word of a region.
    pub const BOTTOM: Self = Self(0);
    /// One past the highest word of a region (empty stack).
    pub const TOP: Self = Self(STACK_WORDS);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Move toward lower addresses, as a push does. `None` when the region
    /// would be exceeded.
    #[inline]
    pub fn down(self, words: usize) -> Option<Self> {
        self.0.checked_sub(words).map(Self)
    }

    /// Move toward higher addresses, as a pop does. `None` past the top.
    #[inline]
    pub fn up(self, words: usize) -> Option<Self> {
        match self.0.checked_add(words) {
            Some(i) if i <= STACK_WORDS => Some(Self(i)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// One slot's stack memory.
#[repr(C, align(8))]
pub struct Stack([u32; STACK_WORDS]);

impl Stack {
    pub const ZEROED: Self = Self([0; STACK_WORDS]);

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.0
    }

    #[inline]
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.0
    }

    /// Convert a raw stack pointer into a cursor. `None` when `ptr` lies
    /// outside this region or is not word aligned.
    pub fn cursor_of(&self, ptr: *const u32) -> Option<StackCursor> {
        let base = self.0.as_ptr() as usize;
        let addr = ptr as usize;
        let bytes = addr.checked_sub(base)?;
        if bytes % core::mem::size_of::<u32>() != 0 {
            return None;
        }
        let index = bytes / core::mem::size_of::<u32>();
        (index <= STACK_WORDS).then_some(StackCursor(index))
    }

    /// Raw pointer to the word at `cursor`, for loading into PSP.
    #[inline]
    pub fn ptr_at(&mut self, cursor: StackCursor) -> *mut u32 {
        self.0.as_mut_ptr().wrapping_add(cursor.index())
    }
}

// ---------------------------------------------------------------------------
// Bootstrapper
// ---------------------------------------------------------------------------

/// Pushes words downward from the top of a region.
struct FramePusher<'a> {
    region: &'a mut [u32],
    cursor: usize,
}

impl<'a> FramePusher<'a> {
    fn new(region: &'a mut [u32]) -> Self {
        let cursor = region.len();
        Self { region, cursor }
    }

    fn push(&mut self, word: u32) {
        self.cursor -= 1;
        self.region[self.cursor] = word;
    }

    fn finish(self) -> StackCursor {
        StackCursor(self.cursor)
    }
}

/// Build a suspended-looking context at the top of `region` so that the
/// dispatch trap starts `entry` as if resuming it.
///
/// The region must hold at least [`FRAME_WORDS`] words plus whatever the
/// task body will use. Growth beyond the region is not detected; a region
/// shorter than one frame panics at boot.
pub fn init_stack(region: &mut [u32], entry: TaskEntry) -> StackCursor {
    let mut frame = FramePusher::new(region);
    frame.push(INITIAL_XPSR);
    // Exception return ignores bit 0 of the stacked PC; keep it halfword
    // aligned as the architecture requires.
    frame.push(entry_address(entry) & !1);
    frame.push(0); // LR placeholder
    // R12, R3-R0
    for _ in 0..5 {
        frame.push(0);
    }
    frame.push(EXC_RETURN_THREAD_PSP);
    // R11-R4
    for _ in 0..CALLEE_SAVED_WORDS {
        frame.push(0);
    }
    frame.finish()
}

#[inline]
pub(crate) fn entry_address(entry: TaskEntry) -> u32 {
    entry as usize as u32
}
