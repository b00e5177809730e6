//! Shared instruction memory of a coprocessor block

/// The instruction memory has no room left for a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreFull;

/// Instruction memory shared by all sequencers of one coprocessor block
pub trait InstructionStore {
    /// Program image accepted by this store
    type Program: ?Sized;

    /// Handle to a loaded program, needed later to configure sequencers
    type Handle;

    /// Load a program and return its handle
    fn load(&mut self, program: &Self::Program) -> Result<Self::Handle, StoreFull>;

    /// Load offset of a loaded program
    fn origin(handle: &Self::Handle) -> u8;
}
