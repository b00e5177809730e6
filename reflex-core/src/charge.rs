//! Sequencer charging
//!
//! Before a frame, every sequencer is held in reset and its loop counters are
//! primed through the transmit queue. The counts are wider than any immediate
//! operand, so most roles push a word and then inject micro-instructions to
//! move it into place.
//!
//! A plan that pushes fewer words than the program pulls leaves the sequencer
//! stalled forever with no visible error. The plans below are the only way
//! charge sequences are produced, and each one is pinned by a test.

use heapless::Vec;
use reflex_hal::{MicroOp, Sequencer};

use crate::config::{PanelGeometry, SHIFTER_START_EDGES};

/// Longest charge plan of any role
pub const MAX_CHARGE_STEPS: usize = 8;

/// One step of a charge plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeStep {
    /// Push a word into the transmit queue
    Push(u32),
    /// Execute a micro-instruction
    Exec(MicroOp),
}

/// Ordered charge steps for one sequencer
pub type ChargePlan = Vec<ChargeStep, MAX_CHARGE_STEPS>;

/// Charging error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeError {
    /// The transmit queue refused a word
    QueueFull,
}

/// What a sequencer does, and therefore how it is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Counts gate clock half-periods; pulls its own count after release
    Vertical {
        /// Loop count pushed into the queue
        loops: u32,
    },
    /// Emits a fixed number of pulses, then halts
    PulseGenerator {
        /// Number of pulses
        pulses: u32,
    },
    /// Nested loop: `inner + 1` byte pairs per half-line, `outer + 1` half-lines
    DataShifter {
        /// Inner counter, backed up in the input shift register
        inner: u32,
        /// Outer counter
        outer: u32,
    },
    /// Walks the skip/change control stream of a partial update
    Region {
        /// The frame opens on changed lines rather than skipped ones
        opens_with_change: bool,
    },
}

impl Role {
    /// Full frame: gate clock and frame start
    pub fn frame_vertical(geometry: &PanelGeometry) -> Self {
        Role::Vertical {
            loops: geometry.lines as u32 * 2 + 1,
        }
    }

    /// Full frame: one gate enable pulse per half-line
    pub fn gate_enable(geometry: &PanelGeometry) -> Self {
        Role::PulseGenerator {
            pulses: geometry.half_lines(),
        }
    }

    /// Full frame: every half-line plus one trailing zero half-line
    pub fn frame_shifter(geometry: &PanelGeometry) -> Self {
        Role::DataShifter {
            inner: geometry.pairs_per_half_line() - 1,
            outer: geometry.half_lines(),
        }
    }

    /// Partial update: the outer count arrives in-band before each region
    pub fn region_shifter(geometry: &PanelGeometry) -> Self {
        Role::DataShifter {
            inner: geometry.pairs_per_half_line() - 1,
            outer: 0,
        }
    }

    /// Partial update: end-of-frame countdown
    pub fn deadline(ticks: u32) -> Self {
        Role::PulseGenerator { pulses: ticks }
    }

    /// Build the charge plan for this role
    pub fn plan(&self) -> ChargePlan {
        match *self {
            Role::Vertical { loops } => plan_of(&[ChargeStep::Push(loops)]),
            Role::PulseGenerator { pulses } => plan_of(&[
                ChargeStep::Push(pulses.saturating_sub(1)),
                ChargeStep::Exec(MicroOp::Pull),
                ChargeStep::Exec(MicroOp::MovXOsr),
            ]),
            Role::DataShifter { inner, outer } => plan_of(&[
                ChargeStep::Push(inner),
                ChargeStep::Exec(MicroOp::Pull),
                ChargeStep::Exec(MicroOp::OutIsr),
                ChargeStep::Exec(MicroOp::MovXIsr),
                ChargeStep::Push(outer),
                ChargeStep::Exec(MicroOp::Pull),
                ChargeStep::Exec(MicroOp::OutY),
            ]),
            Role::Region { opens_with_change } => plan_of(&[
                ChargeStep::Push(opens_with_change as u32),
                ChargeStep::Exec(MicroOp::Pull),
                ChargeStep::Exec(MicroOp::OutY),
            ]),
        }
    }

    /// Words the program pulls by itself once released
    pub fn self_pulled_words(&self) -> usize {
        match self {
            Role::Vertical { .. } => 1,
            _ => 0,
        }
    }
}

fn plan_of(steps: &[ChargeStep]) -> ChargePlan {
    let mut plan = ChargePlan::new();
    let fits = plan.extend_from_slice(steps);
    debug_assert!(fits.is_ok(), "charge plan exceeds MAX_CHARGE_STEPS");
    plan
}

/// Apply a role's charge plan to a held sequencer
pub fn charge(sequencer: &mut dyn Sequencer, role: &Role) -> Result<(), ChargeError> {
    for step in role.plan() {
        match step {
            ChargeStep::Push(word) => {
                if !sequencer.push(word) {
                    return Err(ChargeError::QueueFull);
                }
            }
            ChargeStep::Exec(op) => sequencer.exec(op),
        }
    }
    Ok(())
}

/// Output budget of a charged data shifter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShifterBudget {
    /// Inner loop executions per half-line
    pub pairs_per_half_line: u32,
    /// Half-lines emitted per charge
    pub half_lines: u32,
}

impl ShifterBudget {
    /// Budget of a charged shifter, `None` for other roles
    pub fn of(role: &Role) -> Option<Self> {
        match *role {
            Role::DataShifter { inner, outer } => Some(Self {
                pairs_per_half_line: inner + 1,
                half_lines: outer + 1,
            }),
            _ => None,
        }
    }

    /// Clock edges per half-line: two per byte pair plus the start pulse
    pub fn edges_per_half_line(&self) -> u32 {
        2 * self.pairs_per_half_line + SHIFTER_START_EDGES
    }

    /// Words consumed per half-line (two bytes per pair)
    pub fn words_per_half_line(&self) -> u32 {
        self.pairs_per_half_line * 2 / 4
    }

    /// Words the shifter consumes before it halts
    pub fn total_words(&self) -> u32 {
        self.half_lines * self.words_per_half_line()
    }
}
