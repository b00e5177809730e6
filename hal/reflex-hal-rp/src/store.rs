//! PIO instruction memory as an `InstructionStore`

use embassy_rp::pio::{Common, Instance, LoadedProgram};
use pio::Program;
use reflex_hal::{InstructionStore, StoreFull};

use crate::pio::PROGRAM_SIZE;

/// Instruction memory of one PIO block
///
/// Also hands out the block's common resources, which are needed to turn
/// GPIOs into PIO pins.
pub struct PioStore<'d, PIO: Instance> {
    common: Common<'d, PIO>,
}

impl<'d, PIO: Instance> PioStore<'d, PIO> {
    pub fn new(common: Common<'d, PIO>) -> Self {
        Self { common }
    }

    pub fn common_mut(&mut self) -> &mut Common<'d, PIO> {
        &mut self.common
    }
}

impl<'d, PIO: Instance> InstructionStore for PioStore<'d, PIO> {
    type Program = Program<PROGRAM_SIZE>;
    type Handle = LoadedProgram<'d, PIO>;

    fn load(&mut self, program: &Self::Program) -> Result<Self::Handle, StoreFull> {
        self.common.try_load_program(program).map_err(|_| StoreFull)
    }

    fn origin(handle: &Self::Handle) -> u8 {
        handle.origin
    }
}
