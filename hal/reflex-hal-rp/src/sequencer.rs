//! State machine wrapper implementing `Sequencer`

use embassy_rp::pio::{Instance, StateMachine};
use reflex_hal::{MicroOp, Sequencer};

use crate::block::regs;
use crate::pio::encode;

/// One PIO state machine running a fixed program
pub struct PioSequencer<'d, PIO: Instance, const SM: usize> {
    sm: StateMachine<'d, PIO, SM>,
    block: u8,
    origin: u8,
}

impl<'d, PIO: Instance, const SM: usize> PioSequencer<'d, PIO, SM> {
    /// Wrap a configured state machine
    ///
    /// `origin` is the load offset of its program; `hold` jumps back to it.
    pub fn new(sm: StateMachine<'d, PIO, SM>, block: u8, origin: u8) -> Self {
        Self { sm, block, origin }
    }

    pub fn origin(&self) -> u8 {
        self.origin
    }
}

impl<PIO: Instance, const SM: usize> Sequencer for PioSequencer<'_, PIO, SM> {
    fn hold(&mut self) {
        self.sm.set_enable(false);
        self.sm.clear_fifos();
        self.sm.restart();
        // SAFETY: the state machine is disabled and the origin belongs to
        // the program loaded for it.
        unsafe { self.sm.exec_jmp(self.origin) };
    }

    fn push(&mut self, word: u32) -> bool {
        self.sm.tx().try_push(word)
    }

    fn exec(&mut self, op: MicroOp) {
        // SAFETY: only register moves and non-blocking pulls are injected,
        // none of which touch pins or program flow.
        unsafe { self.sm.exec_instr(encode(op)) };
    }

    fn queued(&self) -> usize {
        regs(self.block).flevel().read().tx(SM) as usize
    }
}
