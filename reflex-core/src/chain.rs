//! Chained transfer engine
//!
//! A frame is streamed as a short chain of transfer descriptors: the pixel
//! payload, then a run of zero words that flushes the last half-line through
//! the data shifter. The successor is armed by the hardware when its
//! predecessor completes, so the stream has no gap and needs no CPU.
//!
//! Every descriptor is paced by its destination's data request. The combined
//! stream length must equal what the destination was charged to consume,
//! which is checked when the plan is built.

use heapless::Vec;
use reflex_hal::{QueueTarget, TransferChannel, TransferDescriptor, WordSource, WORD_BYTES};

use crate::charge::{Role, ShifterBudget};
use crate::config::PanelGeometry;

/// Most descriptors in one chain
pub const MAX_LINKS: usize = 3;

/// Chain error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainError {
    /// The previous chain has not drained
    Busy,
    /// Buffer does not start on a word boundary
    Misaligned,
    /// Buffer length is not a whole number of words
    Ragged { len: usize },
    /// Source holds fewer words than the descriptor moves
    ShortSource { link: usize },
    /// Words streamed to a queue differ from what it was charged to consume
    LengthMismatch { expected: u32, actual: u32 },
    /// More descriptors than `MAX_LINKS`
    TooManyLinks,
    /// A descriptor chains to itself or to a missing descriptor
    BadLink(usize),
    /// The engine has fewer channels than the plan has descriptors
    NotEnoughChannels,
}

fn source_words(source: &WordSource<'_>) -> Result<Option<usize>, ChainError> {
    match source {
        WordSource::Buffer(bytes) => {
            if bytes.as_ptr() as usize % WORD_BYTES != 0 {
                return Err(ChainError::Misaligned);
            }
            if bytes.len() % WORD_BYTES != 0 {
                return Err(ChainError::Ragged { len: bytes.len() });
            }
            Ok(Some(bytes.len() / WORD_BYTES))
        }
        WordSource::Words(words) => Ok(Some(words.len())),
        WordSource::Zeros => Ok(None),
    }
}

/// A validated set of descriptors
#[derive(Debug, Clone, Default)]
pub struct ChainPlan<'a> {
    links: Vec<TransferDescriptor<'a>, MAX_LINKS>,
}

impl<'a> ChainPlan<'a> {
    /// An empty plan
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Append a descriptor and return its index
    pub fn push(&mut self, desc: TransferDescriptor<'a>) -> Result<usize, ChainError> {
        let index = self.links.len();
        if let Some(available) = source_words(&desc.source)? {
            if available < desc.words as usize {
                return Err(ChainError::ShortSource { link: index });
            }
        }
        self.links
            .push(desc)
            .map_err(|_| ChainError::TooManyLinks)?;
        Ok(index)
    }

    /// Descriptors in push order
    pub fn links(&self) -> &[TransferDescriptor<'a>] {
        &self.links
    }

    /// Total words the plan delivers to `target`
    pub fn words_to(&self, target: QueueTarget) -> u32 {
        self.links
            .iter()
            .filter(|link| link.target == target)
            .map(|link| link.words)
            .sum()
    }

    /// Check the words delivered to `target` against its charged budget
    pub fn expect_words(&self, target: QueueTarget, expected: u32) -> Result<(), ChainError> {
        let actual = self.words_to(target);
        if actual != expected {
            return Err(ChainError::LengthMismatch { expected, actual });
        }
        Ok(())
    }

    /// True if some other descriptor chains into `index`
    pub fn is_chained(&self, index: usize) -> bool {
        self.links.iter().any(|link| link.chain_to == Some(index))
    }

    fn check_links(&self) -> Result<(), ChainError> {
        for (i, link) in self.links.iter().enumerate() {
            if let Some(next) = link.chain_to {
                if next == i || next >= self.links.len() {
                    return Err(ChainError::BadLink(i));
                }
            }
        }
        Ok(())
    }

    /// Pixel payload followed by one zero half-line
    pub fn full_frame(
        frame: &'a [u8],
        target: QueueTarget,
        geometry: &PanelGeometry,
    ) -> Result<Self, ChainError> {
        let words = (frame.len() / WORD_BYTES) as u32;
        let mut plan = Self::new();
        plan.push(TransferDescriptor {
            source: WordSource::Buffer(frame),
            words,
            target,
            chain_to: Some(1),
        })?;
        plan.push(Self::padding(target, geometry))?;
        plan.check_full(target, geometry)?;
        Ok(plan)
    }

    /// An all-dark frame streamed from the zero source
    pub fn dark_frame(target: QueueTarget, geometry: &PanelGeometry) -> Result<Self, ChainError> {
        let mut plan = Self::new();
        plan.push(TransferDescriptor {
            source: WordSource::Zeros,
            words: geometry.frame_words(),
            target,
            chain_to: Some(1),
        })?;
        plan.push(Self::padding(target, geometry))?;
        plan.check_full(target, geometry)?;
        Ok(plan)
    }

    /// Region control stream and partial payload, each paced by its own queue
    ///
    /// The payload already carries its zero half-lines, so nothing is chained.
    pub fn partial(
        control: &'a [u32],
        control_target: QueueTarget,
        payload: &'a [u8],
        payload_target: QueueTarget,
        expected_payload_words: u32,
    ) -> Result<Self, ChainError> {
        let mut plan = Self::new();
        plan.push(TransferDescriptor {
            source: WordSource::Words(control),
            words: control.len() as u32,
            target: control_target,
            chain_to: None,
        })?;
        plan.push(TransferDescriptor {
            source: WordSource::Buffer(payload),
            words: (payload.len() / WORD_BYTES) as u32,
            target: payload_target,
            chain_to: None,
        })?;
        plan.expect_words(payload_target, expected_payload_words)?;
        Ok(plan)
    }

    fn padding(target: QueueTarget, geometry: &PanelGeometry) -> TransferDescriptor<'static> {
        TransferDescriptor {
            source: WordSource::Zeros,
            words: geometry.half_line_words(),
            target,
            chain_to: None,
        }
    }

    fn check_full(&self, target: QueueTarget, geometry: &PanelGeometry) -> Result<(), ChainError> {
        self.check_links()?;
        let expected = ShifterBudget::of(&Role::frame_shifter(geometry))
            .map(|budget| budget.total_words())
            .unwrap_or(0);
        self.expect_words(target, expected)
    }
}

/// Drives a fixed set of transfer channels
pub struct ChainEngine<C: TransferChannel, const N: usize> {
    channels: [C; N],
    launches: u32,
}

impl<C: TransferChannel, const N: usize> ChainEngine<C, N> {
    /// Take ownership of the channels claimed at startup
    pub fn new(channels: [C; N]) -> Self {
        Self {
            channels,
            launches: 0,
        }
    }

    /// True when no channel is moving words
    pub fn is_idle(&self) -> bool {
        self.channels.iter().all(|channel| !channel.is_busy())
    }

    /// Spin until the previous chain has drained
    ///
    /// No timeout: the protocol's own cadence bounds the wait.
    pub fn wait_idle(&self) {
        while !self.is_idle() {
            core::hint::spin_loop();
        }
    }

    /// Program and start a chain
    ///
    /// Descriptor `i` runs on channel `i`. Chained successors are armed
    /// before any head is started.
    pub fn launch(&mut self, plan: &ChainPlan<'_>) -> Result<(), ChainError> {
        if !self.is_idle() {
            return Err(ChainError::Busy);
        }
        let links = plan.links();
        if links.len() > N {
            return Err(ChainError::NotEnoughChannels);
        }
        plan.check_links()?;

        for heads in [false, true] {
            for (i, link) in links.iter().enumerate() {
                let is_head = !plan.is_chained(i);
                if is_head != heads {
                    continue;
                }
                let chain_to = link.chain_to.map(|next| self.channels[next].id());
                self.channels[i].configure(link, chain_to, is_head);
            }
        }
        self.launches = self.launches.wrapping_add(1);
        Ok(())
    }

    /// Chains launched since startup
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// The owned channels
    pub fn channels(&self) -> &[C; N] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::payload::AlignedBuffer;
    use crate::soft::{run_chain, SoftChannel};
    use proptest::prelude::*;
    use std::vec::Vec as StdVec;

    const SHIFTER: QueueTarget = QueueTarget { block: 0, lane: 2 };
    const REGION: QueueTarget = QueueTarget { block: 1, lane: 0 };

    fn small_geometry() -> PanelGeometry {
        PanelGeometry { width: 8, lines: 2 }
    }

    #[test]
    fn test_full_frame_emits_payload_then_padding() {
        let geometry = small_geometry();
        let mut frame = AlignedBuffer::<16>::new();
        for (i, byte) in frame.iter_mut().enumerate() {
            *byte = i as u8 + 1;
        }

        let plan = ChainPlan::full_frame(&frame, SHIFTER, &geometry).unwrap();
        let mut out = StdVec::new();
        run_chain(&plan, &mut |target, word| {
            assert_eq!(target, SHIFTER);
            out.push(word);
        });

        // N = 4 payload words, W = 1 padding word
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], u32::from_le_bytes([1, 2, 3, 4]));
        assert_eq!(out[3], u32::from_le_bytes([13, 14, 15, 16]));
        assert_eq!(out[4], 0);
    }

    #[test]
    fn test_default_panel_chain_length() {
        let geometry = PanelGeometry::default();
        let frame = AlignedBuffer::<76_800>::new();
        let plan = ChainPlan::full_frame(&frame, SHIFTER, &geometry).unwrap();

        assert_eq!(plan.links()[0].words, 19_200);
        assert_eq!(plan.links()[1].words, 30);
        assert_eq!(plan.words_to(SHIFTER), 19_230);
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let geometry = small_geometry();
        let frame = AlignedBuffer::<20>::new();
        assert_eq!(
            ChainPlan::full_frame(&frame, SHIFTER, &geometry).err(),
            Some(ChainError::LengthMismatch {
                expected: 5,
                actual: 6
            })
        );
    }

    #[test]
    fn test_ragged_and_misaligned_rejected() {
        let geometry = small_geometry();
        let frame = AlignedBuffer::<20>::new();
        assert_eq!(
            ChainPlan::full_frame(&frame[..15], SHIFTER, &geometry).err(),
            Some(ChainError::Ragged { len: 15 })
        );
        assert_eq!(
            ChainPlan::full_frame(&frame[1..17], SHIFTER, &geometry).err(),
            Some(ChainError::Misaligned)
        );
    }

    #[test]
    fn test_dark_frame_is_all_zero() {
        let geometry = small_geometry();
        let plan = ChainPlan::dark_frame(SHIFTER, &geometry).unwrap();
        let mut out = StdVec::new();
        run_chain(&plan, &mut |_, word| out.push(word));
        assert_eq!(out, [0u32; 5]);
    }

    #[test]
    fn test_partial_plan_checks_payload_words() {
        let control = [1u32, 2, 3];
        let payload = AlignedBuffer::<8>::new();
        let plan = ChainPlan::partial(&control, REGION, &payload, SHIFTER, 2).unwrap();
        assert_eq!(plan.words_to(REGION), 3);
        assert_eq!(plan.words_to(SHIFTER), 2);

        assert_eq!(
            ChainPlan::partial(&control, REGION, &payload, SHIFTER, 3).err(),
            Some(ChainError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_short_source_rejected() {
        let words = [0u32; 2];
        let mut plan = ChainPlan::new();
        assert_eq!(
            plan.push(TransferDescriptor {
                source: WordSource::Words(&words),
                words: 3,
                target: SHIFTER,
                chain_to: None,
            }),
            Err(ChainError::ShortSource { link: 0 })
        );
    }

    #[test]
    fn test_launch_arms_successor_before_head() {
        let geometry = small_geometry();
        let frame = AlignedBuffer::<16>::new();
        let plan = ChainPlan::full_frame(&frame, SHIFTER, &geometry).unwrap();
        let mut engine = ChainEngine::new([SoftChannel::new(4), SoftChannel::new(5)]);

        engine.launch(&plan).unwrap();

        let [primary, padding] = engine.channels();
        let primary = primary.record.unwrap();
        let padding = padding.record.unwrap();
        assert!(primary.started);
        assert_eq!(primary.chain_to, Some(5));
        assert!(!padding.started);
        assert_eq!(padding.chain_to, None);
        assert!(padding.sequence < primary.sequence);
        assert_eq!(engine.launches(), 1);
    }

    #[test]
    fn test_launch_refused_while_busy() {
        let geometry = small_geometry();
        let frame = AlignedBuffer::<16>::new();
        let plan = ChainPlan::full_frame(&frame, SHIFTER, &geometry).unwrap();
        let mut engine = ChainEngine::new([SoftChannel::new(0), SoftChannel::new(1)]);
        engine.launch(&plan).unwrap();

        engine.channels()[0].set_busy_polls(3);
        assert_eq!(engine.launch(&plan), Err(ChainError::Busy));

        // Each poll drains one step
        engine.wait_idle();
        assert!(engine.is_idle());
        assert!(engine.launch(&plan).is_ok());
    }

    #[test]
    fn test_too_many_links_for_engine() {
        let control = [0u32; 1];
        let payload = AlignedBuffer::<4>::new();
        let plan = ChainPlan::partial(&control, REGION, &payload, SHIFTER, 1).unwrap();
        let mut engine = ChainEngine::new([SoftChannel::new(0)]);
        assert_eq!(engine.launch(&plan), Err(ChainError::NotEnoughChannels));
    }

    proptest! {
        #[test]
        fn test_chain_emits_every_word_once_in_order(
            widths in prop::collection::vec(0u32..48, 1..=MAX_LINKS),
            chained in any::<bool>(),
        ) {
            let sources: StdVec<StdVec<u32>> = widths
                .iter()
                .enumerate()
                .map(|(link, &words)| (0..words).map(|w| (link as u32) << 16 | w).collect())
                .collect();
            let mut plan = ChainPlan::new();
            for (i, source) in sources.iter().enumerate() {
                let chain_to = (chained && i + 1 < sources.len()).then_some(i + 1);
                plan.push(TransferDescriptor {
                    source: WordSource::Words(source.as_slice()),
                    words: source.len() as u32,
                    target: SHIFTER,
                    chain_to,
                })
                .unwrap();
            }

            let mut out = StdVec::new();
            run_chain(&plan, &mut |target, word| {
                assert_eq!(target, SHIFTER);
                out.push(word);
            });
            let expected: StdVec<u32> = sources.iter().flatten().copied().collect();
            prop_assert_eq!(out, expected);

            let mut engine = ChainEngine::new([
                SoftChannel::new(0),
                SoftChannel::new(1),
                SoftChannel::new(2),
            ]);
            engine.launch(&plan).unwrap();
            for (i, channel) in engine.channels().iter().enumerate() {
                match channel.record {
                    Some(record) => {
                        prop_assert_eq!(record.words, widths[i]);
                        prop_assert_eq!(record.started, !plan.is_chained(i));
                        channel.set_busy_polls(record.words);
                    }
                    None => prop_assert!(i >= widths.len()),
                }
            }
            engine.wait_idle();
            prop_assert!(engine.is_idle());
        }
    }
}
