//! Sequencer program registry
//!
//! One registry per coprocessor block. Programs are loaded once at boot and
//! never reloaded: every later configure call refers to the offsets recorded
//! here.

use heapless::Vec;
use reflex_hal::InstructionStore;

/// Programs a block can hold at once
pub const MAX_PROGRAMS: usize = 4;

/// Microprograms of the two protocol modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramId {
    /// Full frame: frame/gate start and gate clock
    FrameVertical,
    /// Full frame: gate enable pulses
    GateEnable,
    /// Full frame: pixel data shifter
    FrameShifter,
    /// Partial update: skip/change region walker
    RegionVertical,
    /// Partial update: pixel data shifter with in-band region counters
    RegionShifter,
    /// Partial update: end-of-frame deadline
    FrameDeadline,
}

/// Registry error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Instruction memory is full
    CapacityExceeded(ProgramId),
    /// The program was already loaded into this block
    AlreadyLoaded(ProgramId),
    /// The registry table is full
    TooManyPrograms,
}

/// Loaded programs of one coprocessor block
pub struct ProgramRegistry<S: InstructionStore> {
    store: S,
    loaded: Vec<(ProgramId, S::Handle), MAX_PROGRAMS>,
}

impl<S: InstructionStore> ProgramRegistry<S> {
    /// Wrap a block's instruction store
    pub fn new(store: S) -> Self {
        Self {
            store,
            loaded: Vec::new(),
        }
    }

    /// Load a program and return its offset
    pub fn load(&mut self, id: ProgramId, program: &S::Program) -> Result<u8, RegistryError> {
        if self.handle(id).is_some() {
            return Err(RegistryError::AlreadyLoaded(id));
        }
        if self.loaded.is_full() {
            return Err(RegistryError::TooManyPrograms);
        }

        let handle = self
            .store
            .load(program)
            .map_err(|_| RegistryError::CapacityExceeded(id))?;
        let origin = S::origin(&handle);
        self.loaded
            .push((id, handle))
            .map_err(|_| RegistryError::TooManyPrograms)?;
        Ok(origin)
    }

    /// Handle of a loaded program
    pub fn handle(&self, id: ProgramId) -> Option<&S::Handle> {
        self.loaded
            .iter()
            .find(|(loaded, _)| *loaded == id)
            .map(|(_, handle)| handle)
    }

    /// Load offset of a loaded program
    pub fn offset(&self, id: ProgramId) -> Option<u8> {
        self.handle(id).map(S::origin)
    }

    /// Number of programs loaded
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// True if nothing has been loaded yet
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    /// Access the underlying store
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
