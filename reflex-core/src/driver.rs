//! Panel driver
//!
//! Owns both sequencer banks and the transfer channels, and turns a frame
//! into the full hold, charge, arm, launch, trigger sequence. Every present
//! re-derives the whole sequencer state from scratch, so a frame with bad
//! timing never leaks into the next one.

use embedded_hal::delay::DelayNs;
use reflex_hal::{SequencerBank, TransferChannel, BANK_SIZE};

use crate::chain::{ChainEngine, ChainError, ChainPlan};
use crate::charge::Role;
use crate::config::{PanelConfig, PanelGeometry, ProtocolTiming};
use crate::group::{SequencerGroup, SequencingError};
use crate::partial::PartialPlan;
use crate::pipeline::{FrameKind, FramePresenter, PresentError};

/// Full-frame bank member streaming pixel data
pub const FULL_SHIFTER: usize = 2;
/// Partial bank member walking the control stream
pub const REGION_WALKER: usize = 0;
/// Partial bank member streaming pixel data
pub const REGION_SHIFTER: usize = 1;

/// Transfer channels used per frame
pub const CHAIN_CHANNELS: usize = 2;

fn charge_bank<B: SequencerBank>(
    bank: &mut B,
    group: &mut SequencerGroup,
    roles: &[Role; BANK_SIZE],
) -> Result<(), SequencingError> {
    let mask = bank.mask();
    let (mut members, control) = bank.split();
    group.hold(&mut members, control, mask);
    for (i, role) in roles.iter().enumerate() {
        group.charge_member(i, members[i], role)?;
    }
    group.arm(control, mask)
}

fn trigger_bank<B: SequencerBank>(
    bank: &mut B,
    group: &mut SequencerGroup,
) -> Result<(), SequencingError> {
    let (_, control) = bank.split();
    group.trigger(control)
}

fn release_bank<B: SequencerBank>(bank: &mut B, group: &mut SequencerGroup) {
    let mask = bank.mask();
    let (mut members, control) = bank.split();
    group.hold(&mut members, control, mask);
}

/// Drives the panel through two sequencer banks sharing one set of pins
pub struct PanelDriver<F, P, C, D>
where
    F: SequencerBank,
    P: SequencerBank,
    C: TransferChannel,
    D: DelayNs,
{
    full: F,
    partial: P,
    full_group: SequencerGroup,
    partial_group: SequencerGroup,
    engine: ChainEngine<C, CHAIN_CHANNELS>,
    delay: D,
    geometry: PanelGeometry,
    protocol: ProtocolTiming,
    sys_clock_hz: u32,
    mode: Option<FrameKind>,
}

impl<F, P, C, D> PanelDriver<F, P, C, D>
where
    F: SequencerBank,
    P: SequencerBank,
    C: TransferChannel,
    D: DelayNs,
{
    /// Take the banks and channels claimed at startup
    ///
    /// Pins stay unbound until the first present.
    pub fn new(
        full: F,
        partial: P,
        channels: [C; CHAIN_CHANNELS],
        delay: D,
        config: &PanelConfig,
    ) -> Self {
        Self {
            full,
            partial,
            full_group: SequencerGroup::new(),
            partial_group: SequencerGroup::new(),
            engine: ChainEngine::new(channels),
            delay,
            geometry: config.geometry,
            protocol: config.protocol,
            sys_clock_hz: config.clock.sys_clock_hz,
            mode: None,
        }
    }

    /// Bank currently bound to the pins
    pub fn mode(&self) -> Option<FrameKind> {
        self.mode
    }

    /// Duration of `periods` gate clock periods
    pub fn gate_clock_periods_ns(&self, periods: u32) -> u32 {
        self.protocol
            .half_periods_ns(2 * periods, self.sys_clock_hz)
    }

    fn switch_to(&mut self, kind: FrameKind) {
        if self.mode == Some(kind) {
            return;
        }
        match kind {
            FrameKind::Full => {
                release_bank(&mut self.partial, &mut self.partial_group);
                self.full.bind_pins();
            }
            FrameKind::Partial => {
                release_bank(&mut self.full, &mut self.full_group);
                self.partial.bind_pins();
            }
        }
        self.mode = Some(kind);
    }

    fn ensure_idle(&self) -> Result<(), PresentError> {
        if !self.engine.is_idle() {
            return Err(ChainError::Busy.into());
        }
        Ok(())
    }

    fn start_full(&mut self, plan: &ChainPlan<'_>) -> Result<(), PresentError> {
        self.switch_to(FrameKind::Full);
        let roles = [
            Role::frame_vertical(&self.geometry),
            Role::gate_enable(&self.geometry),
            Role::frame_shifter(&self.geometry),
        ];
        charge_bank(&mut self.full, &mut self.full_group, &roles)?;
        self.engine.launch(plan)?;
        trigger_bank(&mut self.full, &mut self.full_group)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn full_bank(&self) -> &F {
        &self.full
    }

    #[cfg(test)]
    pub(crate) fn partial_bank(&self) -> &P {
        &self.partial
    }

    #[cfg(test)]
    pub(crate) fn engine(&self) -> &ChainEngine<C, CHAIN_CHANNELS> {
        &self.engine
    }

    #[cfg(test)]
    pub(crate) fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }
}

impl<F, P, C, D> FramePresenter for PanelDriver<F, P, C, D>
where
    F: SequencerBank,
    P: SequencerBank,
    C: TransferChannel,
    D: DelayNs,
{
    fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    fn settle(&mut self) {
        let ns = self.protocol.settle_ns(self.sys_clock_hz);
        self.delay.delay_ns(ns);
    }

    fn present_full(&mut self, frame: &[u8]) -> Result<(), PresentError> {
        self.ensure_idle()?;
        let target = self.full.target(FULL_SHIFTER);
        let plan = ChainPlan::full_frame(frame, target, &self.geometry)?;
        self.start_full(&plan)
    }

    fn present_partial(&mut self, plan: &PartialPlan, payload: &[u8]) -> Result<(), PresentError> {
        self.ensure_idle()?;
        let chain = ChainPlan::partial(
            plan.control(),
            self.partial.target(REGION_WALKER),
            payload,
            self.partial.target(REGION_SHIFTER),
            plan.payload_words(&self.geometry),
        )?;

        self.switch_to(FrameKind::Partial);
        let roles = [
            plan.region_role(),
            Role::region_shifter(&self.geometry),
            plan.deadline_role(),
        ];
        charge_bank(&mut self.partial, &mut self.partial_group, &roles)?;
        self.engine.launch(&chain)?;
        trigger_bank(&mut self.partial, &mut self.partial_group)?;
        Ok(())
    }

    fn present_dark(&mut self) -> Result<(), PresentError> {
        self.ensure_idle()?;
        let target = self.full.target(FULL_SHIFTER);
        let plan = ChainPlan::dark_frame(target, &self.geometry)?;
        self.start_full(&plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartialTiming;
    use crate::group::{Phase, ALL_FLAGS, START_FLAG};
    use crate::partial::{plan, RegionDescriptor};
    use crate::payload::AlignedBuffer;
    use crate::soft::{GroupEvent, SoftBank, SoftChannel};
    use reflex_hal::Sequencer;

    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += ns as u64;
        }
    }

    type SoftDriver = PanelDriver<SoftBank, SoftBank, SoftChannel, RecordingDelay>;

    fn config() -> PanelConfig {
        let mut config = PanelConfig::default();
        config.geometry = PanelGeometry { width: 8, lines: 4 };
        config
    }

    fn driver() -> SoftDriver {
        PanelDriver::new(
            SoftBank::new(0),
            SoftBank::new(1),
            [SoftChannel::new(0), SoftChannel::new(1)],
            RecordingDelay::default(),
            &config(),
        )
    }

    #[test]
    fn test_full_frame_sequence() {
        let mut driver = driver();
        let frame = AlignedBuffer::<32>::new();

        driver.present_full(&frame).unwrap();

        assert_eq!(driver.mode(), Some(FrameKind::Full));
        let bank = driver.full_bank();
        assert_eq!(bank.binds, 1);
        assert_eq!(
            bank.group.events.as_slice(),
            &[
                GroupEvent::Disable(0b111),
                GroupEvent::ClearFlags(ALL_FLAGS),
                GroupEvent::Restart(0b111),
                GroupEvent::Force(START_FLAG),
            ]
        );
        // Vertical pulls its own count: 2 * 4 + 1
        assert_eq!(bank.members[0].queued(), 1);
        assert_eq!(bank.members[1].x, 7);
        assert_eq!((bank.members[2].x, bank.members[2].y), (1, 8));

        let [primary, padding] = driver.engine().channels();
        let primary = primary.record.unwrap();
        let padding = padding.record.unwrap();
        assert_eq!((primary.words, padding.words), (8, 1));
        assert_eq!(primary.target, bank.target(FULL_SHIFTER));
        assert_eq!(primary.chain_to, Some(1));
    }

    #[test]
    fn test_partial_switches_banks() {
        let mut driver = driver();
        let config = config();
        let frame = AlignedBuffer::<32>::new();
        driver.present_full(&frame).unwrap();

        let plan = plan(
            &[RegionDescriptor::new(1, 2)],
            &config.geometry,
            &PartialTiming::default(),
        )
        .unwrap();
        let payload = AlignedBuffer::<{ 4 * (1 + 2 * 2 + 1) }>::new();
        driver.present_partial(&plan, &payload).unwrap();

        assert_eq!(driver.mode(), Some(FrameKind::Partial));
        // The full bank was stopped before the partial bank took the pins
        assert_eq!(
            &driver.full_bank().group.events[4..],
            &[GroupEvent::Disable(0b111), GroupEvent::ClearFlags(ALL_FLAGS)]
        );
        let bank = driver.partial_bank();
        assert_eq!(bank.binds, 1);
        assert_eq!(bank.members[REGION_WALKER].y, 0);
        assert_eq!((bank.members[REGION_SHIFTER].x, bank.members[REGION_SHIFTER].y), (1, 0));
        assert_eq!(bank.members[2].x, plan.deadline() - 1);

        let [control, data] = driver.engine().channels();
        let control = control.record.unwrap();
        let data = data.record.unwrap();
        assert_eq!(control.words, 3);
        assert_eq!(control.target, bank.target(REGION_WALKER));
        assert_eq!(data.words, 6);
        assert!(control.started && data.started);
        assert_eq!((control.chain_to, data.chain_to), (None, None));
    }

    #[test]
    fn test_same_mode_does_not_rebind() {
        let mut driver = driver();
        let frame = AlignedBuffer::<32>::new();
        driver.present_full(&frame).unwrap();
        driver.present_dark().unwrap();
        assert_eq!(driver.full_bank().binds, 1);
        assert_eq!(driver.partial_bank().binds, 0);
    }

    #[test]
    fn test_busy_chain_leaves_sequencers_alone() {
        let mut driver = driver();
        let frame = AlignedBuffer::<32>::new();
        driver.present_full(&frame).unwrap();
        let events = driver.full_bank().group.events.len();

        driver.engine().channels()[0].set_busy_polls(1);
        assert_eq!(
            driver.present_full(&frame),
            Err(PresentError::Chain(ChainError::Busy))
        );
        assert_eq!(driver.full_bank().group.events.len(), events);
    }

    #[test]
    fn test_wrong_payload_length_rejected() {
        let mut driver = driver();
        let config = config();
        let plan = plan(
            &[RegionDescriptor::new(1, 2)],
            &config.geometry,
            &PartialTiming::default(),
        )
        .unwrap();
        let payload = AlignedBuffer::<8>::new();
        assert!(matches!(
            driver.present_partial(&plan, &payload),
            Err(PresentError::Chain(ChainError::LengthMismatch { .. }))
        ));
        assert_eq!(driver.mode(), None);
    }

    #[test]
    fn test_settle_waits_scaled_delay() {
        let mut driver = driver();
        driver.settle();
        let expected = ProtocolTiming::default().settle_ns(config().clock.sys_clock_hz);
        assert_eq!(driver.delay_mut().total_ns, expected as u64);
    }

    #[test]
    fn test_group_phase_after_present() {
        let mut bank = SoftBank::new(0);
        let mut group = SequencerGroup::new();
        let g = PanelGeometry::default();
        let roles = [
            Role::frame_vertical(&g),
            Role::gate_enable(&g),
            Role::frame_shifter(&g),
        ];
        charge_bank(&mut bank, &mut group, &roles).unwrap();
        assert_eq!(group.phase(), Phase::Armed);
        trigger_bank(&mut bank, &mut group).unwrap();
        assert_eq!(group.phase(), Phase::Running);
    }
}
