//! Sequencer abstractions
//!
//! A sequencer is a tiny execution unit replaying one fixed microprogram. The
//! core never sees the program itself; it only needs to hold a sequencer in
//! reset, feed its transmit queue and inject the handful of micro-instructions
//! used for charging.

/// Number of cooperating sequencers in one bank (one protocol mode)
pub const BANK_SIZE: usize = 3;

/// Micro-instructions executed out of band while a sequencer is held
///
/// These exist because charge values are wider than any immediate operand
/// the microprograms could carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MicroOp {
    /// Non-blocking pull from the transmit queue into the output shift register
    Pull,
    /// Shift all 32 bits of the output shift register into the input shift register
    OutIsr,
    /// Shift all 32 bits of the output shift register into Y
    OutY,
    /// Copy the output shift register into X
    MovXOsr,
    /// Copy the input shift register into X
    MovXIsr,
}

/// Destination queue of a sequencer, addressed by coprocessor block and lane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueTarget {
    /// Coprocessor block index
    pub block: u8,
    /// Sequencer index within the block
    pub lane: u8,
}

impl QueueTarget {
    /// Bit of this lane in a block-wide mask
    pub const fn mask(&self) -> u8 {
        1 << self.lane
    }
}

/// A single hardware sequencer
pub trait Sequencer {
    /// Hold the sequencer in reset
    ///
    /// After this call the sequencer is disabled, its queues are empty and
    /// its program counter sits at the program origin.
    fn hold(&mut self);

    /// Push a word into the transmit queue
    ///
    /// Returns `false` if the queue was full and the word was not accepted.
    fn push(&mut self, word: u32) -> bool;

    /// Execute a micro-instruction immediately
    fn exec(&mut self, op: MicroOp);

    /// Number of words waiting in the transmit queue
    fn queued(&self) -> usize;
}

/// Block-wide controls shared by the sequencers of one coprocessor
pub trait GroupControl {
    /// Clear inter-sequencer flags (bit per flag)
    fn clear_flags(&mut self, mask: u8);

    /// Restart the clock dividers of the masked sequencers and enable them
    ///
    /// Must be a single register write so that every masked sequencer starts
    /// counting on the same system clock edge.
    fn restart_group(&mut self, mask: u8);

    /// Disable the masked sequencers
    fn disable(&mut self, mask: u8);

    /// Force a flag high; sequencers waiting on it are released
    fn force_flag(&mut self, flag: u8);
}

/// A set of cooperating sequencers bound to the panel pins for one mode
pub trait SequencerBank {
    /// Borrow the members and the group control at the same time
    fn split(&mut self) -> ([&mut dyn Sequencer; BANK_SIZE], &mut dyn GroupControl);

    /// Transmit queue of a member
    fn target(&self, member: usize) -> QueueTarget;

    /// Route the shared panel pins to this bank
    ///
    /// Binding one bank implicitly releases the pins from the other.
    fn bind_pins(&mut self);

    /// Mask of all members in their block
    fn mask(&self) -> u8 {
        let mut mask = 0;
        for member in 0..BANK_SIZE {
            mask |= self.target(member).mask();
        }
        mask
    }
}
