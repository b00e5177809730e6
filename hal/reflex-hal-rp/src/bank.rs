//! Sequencer banks for both protocol modes
//!
//! Both PIO blocks are configured against the same twelve panel pins at boot.
//! Only one block may drive them at a time; `bind_pins` moves the function
//! select of every pin in one pass.

use embassy_rp::peripherals::{
    PIN_0, PIN_1, PIN_10, PIN_11, PIN_2, PIN_3, PIN_4, PIN_5, PIN_6, PIN_7, PIN_8, PIN_9, PIO0,
    PIO1,
};
use embassy_rp::pio::{
    Common, Config, Direction as PioDirection, FifoJoin, Instance, LoadedProgram, Pin, Pio,
    ShiftConfig, ShiftDirection, StateMachine,
};
use embassy_rp::Peri;
use fixed::types::U24F8;
use reflex_core::config::PanelConfig;
use reflex_core::registry::{ProgramId, ProgramRegistry, RegistryError};
use reflex_hal::{GroupControl, QueueTarget, Sequencer, SequencerBank, BANK_SIZE};

use crate::block::{route_pins, BlockControl};
use crate::pio::{self as programs, divider_bits, shifter_divider, vertical_divider};
use crate::sequencer::PioSequencer;
use crate::store::PioStore;

/// GPIOs shared by both banks, in pin order
pub const PANEL_GPIOS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const FULL_BLOCK: u8 = 0;
const PARTIAL_BLOCK: u8 = 1;

/// Bank setup error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupError {
    /// A program could not be loaded
    Registry(RegistryError),
    /// A program is missing from the registry after loading
    NotLoaded(ProgramId),
}

impl From<RegistryError> for SetupError {
    fn from(err: RegistryError) -> Self {
        SetupError::Registry(err)
    }
}

/// Panel pins, owned by the banks for the lifetime of the driver
pub struct PanelPins<'d> {
    pub intb: Peri<'d, PIN_0>,
    pub gsp: Peri<'d, PIN_1>,
    pub gck: Peri<'d, PIN_2>,
    pub gen: Peri<'d, PIN_3>,
    pub bsp: Peri<'d, PIN_4>,
    pub bck: Peri<'d, PIN_5>,
    pub r0: Peri<'d, PIN_6>,
    pub r1: Peri<'d, PIN_7>,
    pub g0: Peri<'d, PIN_8>,
    pub g1: Peri<'d, PIN_9>,
    pub b0: Peri<'d, PIN_10>,
    pub b1: Peri<'d, PIN_11>,
}

/// The panel pins as seen by one PIO block
struct BlockPins<'d, PIO: Instance> {
    intb: Pin<'d, PIO>,
    gsp: Pin<'d, PIO>,
    gck: Pin<'d, PIO>,
    gen: Pin<'d, PIO>,
    bsp: Pin<'d, PIO>,
    bck: Pin<'d, PIO>,
    data: [Pin<'d, PIO>; 6],
}

impl<'d, PIO: Instance> BlockPins<'d, PIO> {
    /// Hand every panel pin to `common`
    ///
    /// # Safety
    ///
    /// The pins are cloned so that both blocks can hold them. The caller
    /// must make sure only one block's function select is active at a time.
    unsafe fn claim(common: &mut Common<'d, PIO>, pins: &PanelPins<'d>) -> Self {
        Self {
            intb: common.make_pio_pin(pins.intb.clone_unchecked()),
            gsp: common.make_pio_pin(pins.gsp.clone_unchecked()),
            gck: common.make_pio_pin(pins.gck.clone_unchecked()),
            gen: common.make_pio_pin(pins.gen.clone_unchecked()),
            bsp: common.make_pio_pin(pins.bsp.clone_unchecked()),
            bck: common.make_pio_pin(pins.bck.clone_unchecked()),
            data: [
                common.make_pio_pin(pins.r0.clone_unchecked()),
                common.make_pio_pin(pins.r1.clone_unchecked()),
                common.make_pio_pin(pins.g0.clone_unchecked()),
                common.make_pio_pin(pins.g1.clone_unchecked()),
                common.make_pio_pin(pins.b0.clone_unchecked()),
                common.make_pio_pin(pins.b1.clone_unchecked()),
            ],
        }
    }

    fn data_refs(&self) -> [&Pin<'d, PIO>; 6] {
        let [a, b, c, d, e, f] = &self.data;
        [a, b, c, d, e, f]
    }
}

/// Load offsets, for the boot log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadReport {
    /// frame_vertical, gate_enable, frame_shifter on PIO0
    pub full: [u8; BANK_SIZE],
    /// region_vertical, region_shifter, frame_deadline on PIO1
    pub partial: [u8; BANK_SIZE],
}

/// Full-frame bank on PIO0
pub struct FullBank<'d> {
    vertical: PioSequencer<'d, PIO0, 0>,
    gate: PioSequencer<'d, PIO0, 1>,
    shifter: PioSequencer<'d, PIO0, 2>,
    control: BlockControl,
}

/// Partial-update bank on PIO1
pub struct PartialBank<'d> {
    walker: PioSequencer<'d, PIO1, 0>,
    shifter: PioSequencer<'d, PIO1, 1>,
    deadline: PioSequencer<'d, PIO1, 2>,
    control: BlockControl,
}

impl SequencerBank for FullBank<'_> {
    fn split(&mut self) -> ([&mut dyn Sequencer; BANK_SIZE], &mut dyn GroupControl) {
        (
            [&mut self.vertical, &mut self.gate, &mut self.shifter],
            &mut self.control,
        )
    }

    fn target(&self, member: usize) -> QueueTarget {
        QueueTarget {
            block: FULL_BLOCK,
            lane: member as u8,
        }
    }

    fn bind_pins(&mut self) {
        route_pins(FULL_BLOCK, &PANEL_GPIOS);
    }
}

impl SequencerBank for PartialBank<'_> {
    fn split(&mut self) -> ([&mut dyn Sequencer; BANK_SIZE], &mut dyn GroupControl) {
        (
            [&mut self.walker, &mut self.shifter, &mut self.deadline],
            &mut self.control,
        )
    }

    fn target(&self, member: usize) -> QueueTarget {
        QueueTarget {
            block: PARTIAL_BLOCK,
            lane: member as u8,
        }
    }

    fn bind_pins(&mut self) {
        route_pins(PARTIAL_BLOCK, &PANEL_GPIOS);
    }
}

/// Both banks, configured and held
pub struct PanelBanks<'d> {
    pub full: FullBank<'d>,
    pub partial: PartialBank<'d>,
    pub offsets: LoadReport,
}

fn loaded<'r, 'd, PIO: Instance>(
    registry: &'r ProgramRegistry<PioStore<'d, PIO>>,
    id: ProgramId,
) -> Result<&'r LoadedProgram<'d, PIO>, SetupError> {
    registry.handle(id).ok_or(SetupError::NotLoaded(id))
}

fn shifter_config<'d, PIO: Instance>(
    program: &LoadedProgram<'d, PIO>,
    pins: &BlockPins<'d, PIO>,
    divider: u32,
) -> Config<'d, PIO> {
    let mut cfg = Config::default();
    cfg.use_program(program, &[&pins.bsp, &pins.bck]);
    cfg.set_out_pins(&pins.data_refs());
    cfg.shift_out = ShiftConfig {
        auto_fill: true,
        threshold: 32,
        direction: ShiftDirection::Right,
    };
    cfg.fifo_join = FifoJoin::TxOnly;
    cfg.clock_divider = U24F8::from_bits(divider);
    cfg
}

fn drive_all<'d, PIO: Instance, const SM: usize>(
    sm: &mut StateMachine<'d, PIO, SM>,
    pins: &BlockPins<'d, PIO>,
) {
    sm.set_pin_dirs(
        PioDirection::Out,
        &[&pins.intb, &pins.gsp, &pins.gck, &pins.gen, &pins.bsp, &pins.bck],
    );
    sm.set_pin_dirs(PioDirection::Out, &pins.data_refs());
}

/// Load both program sets and configure every state machine
///
/// Program loading is the only fallible step; the banks come back held,
/// with no block bound to the pins yet.
pub fn setup_banks<'d>(
    pio0: Pio<'d, PIO0>,
    pio1: Pio<'d, PIO1>,
    pins: PanelPins<'d>,
    config: &PanelConfig,
) -> Result<PanelBanks<'d>, SetupError> {
    let Pio {
        common: common0,
        sm0: mut vertical_sm,
        sm1: mut gate_sm,
        sm2: mut full_shifter_sm,
        ..
    } = pio0;
    let Pio {
        common: common1,
        sm0: mut walker_sm,
        sm1: mut region_shifter_sm,
        sm2: mut deadline_sm,
        ..
    } = pio1;

    let mut full_registry = ProgramRegistry::new(PioStore::new(common0));
    let mut partial_registry = ProgramRegistry::new(PioStore::new(common1));

    // SAFETY: the full bank binds its function select only after the partial
    // bank released the pins, and the other way round (see `bind_pins`).
    let full_pins = unsafe { BlockPins::claim(full_registry.store_mut().common_mut(), &pins) };
    let partial_pins =
        unsafe { BlockPins::claim(partial_registry.store_mut().common_mut(), &pins) };

    let offsets = LoadReport {
        full: [
            full_registry.load(ProgramId::FrameVertical, &programs::frame_vertical())?,
            full_registry.load(ProgramId::GateEnable, &programs::gate_enable())?,
            full_registry.load(ProgramId::FrameShifter, &programs::frame_shifter())?,
        ],
        partial: [
            partial_registry.load(ProgramId::RegionVertical, &programs::region_vertical())?,
            partial_registry.load(ProgramId::RegionShifter, &programs::region_shifter())?,
            partial_registry.load(ProgramId::FrameDeadline, &programs::frame_deadline())?,
        ],
    };

    let slow = divider_bits(vertical_divider(&config.protocol));
    let fast = divider_bits(shifter_divider(&config.protocol, &config.geometry));

    // Full frame
    let program = loaded(&full_registry, ProgramId::FrameVertical)?;
    let mut cfg = Config::default();
    cfg.use_program(program, &[&full_pins.gck]);
    cfg.set_set_pins(&[&full_pins.intb, &full_pins.gsp]);
    cfg.clock_divider = U24F8::from_bits(slow);
    vertical_sm.set_config(&cfg);
    drive_all(&mut vertical_sm, &full_pins);

    let program = loaded(&full_registry, ProgramId::GateEnable)?;
    let mut cfg = Config::default();
    cfg.use_program(program, &[]);
    cfg.set_set_pins(&[&full_pins.gen]);
    cfg.clock_divider = U24F8::from_bits(slow);
    gate_sm.set_config(&cfg);

    let program = loaded(&full_registry, ProgramId::FrameShifter)?;
    full_shifter_sm.set_config(&shifter_config(program, &full_pins, fast));

    // Partial update
    let program = loaded(&partial_registry, ProgramId::RegionVertical)?;
    let mut cfg = Config::default();
    cfg.use_program(program, &[&partial_pins.gck]);
    cfg.set_set_pins(&[
        &partial_pins.intb,
        &partial_pins.gsp,
        &partial_pins.gck,
        &partial_pins.gen,
    ]);
    cfg.clock_divider = U24F8::from_bits(slow);
    walker_sm.set_config(&cfg);
    drive_all(&mut walker_sm, &partial_pins);

    let program = loaded(&partial_registry, ProgramId::RegionShifter)?;
    region_shifter_sm.set_config(&shifter_config(program, &partial_pins, fast));

    let program = loaded(&partial_registry, ProgramId::FrameDeadline)?;
    let mut cfg = Config::default();
    cfg.use_program(program, &[]);
    cfg.set_set_pins(&[&partial_pins.intb]);
    cfg.clock_divider = U24F8::from_bits(slow);
    deadline_sm.set_config(&cfg);

    let [vertical, gate, full_shifter] = offsets.full;
    let [walker, region_shifter, deadline] = offsets.partial;

    Ok(PanelBanks {
        full: FullBank {
            vertical: PioSequencer::new(vertical_sm, FULL_BLOCK, vertical),
            gate: PioSequencer::new(gate_sm, FULL_BLOCK, gate),
            shifter: PioSequencer::new(full_shifter_sm, FULL_BLOCK, full_shifter),
            control: BlockControl::new(FULL_BLOCK),
        },
        partial: PartialBank {
            walker: PioSequencer::new(walker_sm, PARTIAL_BLOCK, walker),
            shifter: PioSequencer::new(region_shifter_sm, PARTIAL_BLOCK, region_shifter),
            deadline: PioSequencer::new(deadline_sm, PARTIAL_BLOCK, deadline),
            control: BlockControl::new(PARTIAL_BLOCK),
        },
        offsets,
    })
}
