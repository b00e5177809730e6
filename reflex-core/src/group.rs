//! Lock-step start barrier
//!
//! A group is the set of sequencers that together produce one waveform. They
//! must all be charged while held, then have their clock dividers restarted
//! in one register write, and only then be released by a single start flag.
//! Skipping a step does not fail loudly; it produces skewed output. The phase
//! machine below makes the order explicit.

use reflex_hal::{GroupControl, Sequencer, BANK_SIZE};

use crate::charge::{charge, ChargeError, Role};

/// Flag forced high to release a group
pub const START_FLAG: u8 = 0;

/// Flags used by the microprograms for inter-sequencer signalling
pub const ALL_FLAGS: u8 = 0xFF;

/// Group lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Held in reset, not every member charged yet
    Unloaded,
    /// Every member charged, still held
    Charged,
    /// Clock dividers restarted together, waiting for the start flag
    Armed,
    /// Released
    Running,
}

/// Operations on a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupOp {
    /// Hold every member in reset
    Hold,
    /// Charge one member
    Charge,
    /// Restart clock dividers and enable
    Arm,
    /// Force the start flag
    Trigger,
}

/// Sequencing error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencingError {
    /// The operation is not legal in the current phase
    IllegalTransition { from: Phase, op: GroupOp },
    /// A member was charged twice without an intervening hold
    AlreadyCharged(usize),
    /// Member index out of range
    UnknownMember(usize),
    /// Charging a member failed
    Charge(ChargeError),
}

impl From<ChargeError> for SequencingError {
    fn from(err: ChargeError) -> Self {
        SequencingError::Charge(err)
    }
}

impl Phase {
    /// Next phase after `op`, or `None` if the operation is illegal
    ///
    /// `Charge` keeps the group `Unloaded`; the group promotes itself to
    /// `Charged` once the last member is charged.
    pub fn transition(self, op: GroupOp) -> Option<Self> {
        use GroupOp::*;
        use Phase::*;

        match (self, op) {
            (_, Hold) => Some(Unloaded),
            (Unloaded, Charge) => Some(Unloaded),
            (Charged, Arm) => Some(Armed),
            (Armed, Trigger) => Some(Running),
            _ => None,
        }
    }
}

/// Lifecycle tracker for one group of `BANK_SIZE` sequencers
#[derive(Debug, Clone)]
pub struct SequencerGroup {
    phase: Phase,
    charged: u8,
}

impl Default for SequencerGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl SequencerGroup {
    const ALL_CHARGED: u8 = (1 << BANK_SIZE) - 1;

    /// A group that has never been charged
    pub const fn new() -> Self {
        Self {
            phase: Phase::Unloaded,
            charged: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn step(&mut self, op: GroupOp) -> Result<Phase, SequencingError> {
        self.phase
            .transition(op)
            .ok_or(SequencingError::IllegalTransition {
                from: self.phase,
                op,
            })
    }

    /// Stop the group and hold every member in reset
    ///
    /// Also clears stale inter-sequencer flags left by the previous frame.
    pub fn hold(
        &mut self,
        members: &mut [&mut dyn Sequencer; BANK_SIZE],
        control: &mut dyn GroupControl,
        mask: u8,
    ) {
        control.disable(mask);
        for member in members.iter_mut() {
            member.hold();
        }
        control.clear_flags(ALL_FLAGS);
        self.charged = 0;
        self.phase = Phase::Unloaded;
    }

    /// Charge one held member
    pub fn charge_member(
        &mut self,
        index: usize,
        member: &mut dyn Sequencer,
        role: &Role,
    ) -> Result<(), SequencingError> {
        if index >= BANK_SIZE {
            return Err(SequencingError::UnknownMember(index));
        }
        let next = self.step(GroupOp::Charge)?;
        if self.charged & (1 << index) != 0 {
            return Err(SequencingError::AlreadyCharged(index));
        }

        charge(member, role)?;
        self.charged |= 1 << index;
        self.phase = if self.charged == Self::ALL_CHARGED {
            Phase::Charged
        } else {
            next
        };
        Ok(())
    }

    /// Restart every member's clock divider in one write and enable them
    pub fn arm(&mut self, control: &mut dyn GroupControl, mask: u8) -> Result<(), SequencingError> {
        let next = self.step(GroupOp::Arm)?;
        control.restart_group(mask);
        self.phase = next;
        Ok(())
    }

    /// Release the armed group
    pub fn trigger(&mut self, control: &mut dyn GroupControl) -> Result<(), SequencingError> {
        let next = self.step(GroupOp::Trigger)?;
        control.force_flag(START_FLAG);
        self.phase = next;
        Ok(())
    }
}
