//! Render-side half of the pipeline

use crate::config::{PanelGeometry, PartialTiming, UpdatePolicy};
use crate::diff::{diff_rows, RowDiff};
use crate::exchange::FrameReader;
use crate::partial;
use crate::payload::{build_partial_payload, PayloadError};

use super::{Decompressor, DropReason, FrameKind, FramePresenter, RenderStats, StepOutcome};

/// Working buffers of the render core
///
/// `front` is on screen (and possibly still streaming), `back` receives the
/// next decoded frame, `partial` holds the partial-update payload.
pub struct FrameBuffers<'a> {
    pub front: &'a mut [u8],
    pub back: &'a mut [u8],
    pub partial: &'a mut [u8],
}

/// Picks up, decodes and presents frames
pub struct RenderPipeline<'a, D: Decompressor, P: FramePresenter, const N: usize> {
    reader: FrameReader<'a, N>,
    decompressor: D,
    presenter: P,
    buffers: FrameBuffers<'a>,
    geometry: PanelGeometry,
    timing: PartialTiming,
    policy: UpdatePolicy,
    stats: RenderStats,
}

impl<'a, D: Decompressor, P: FramePresenter, const N: usize> RenderPipeline<'a, D, P, N> {
    pub fn new(
        reader: FrameReader<'a, N>,
        decompressor: D,
        presenter: P,
        buffers: FrameBuffers<'a>,
        geometry: PanelGeometry,
        timing: PartialTiming,
        policy: UpdatePolicy,
    ) -> Self {
        Self {
            reader,
            decompressor,
            presenter,
            buffers,
            geometry,
            timing,
            policy,
            stats: RenderStats::default(),
        }
    }

    /// Handle at most one published frame
    pub fn step(&mut self) -> StepOutcome {
        let Some(frame) = self.reader.pickup() else {
            return StepOutcome::Idle;
        };
        let frame_bytes = self.geometry.frame_bytes();
        let back = &mut self.buffers.back[..frame_bytes];
        let decoded = self.decompressor.decompress_frame(frame.bytes(), back);
        // Release the slot before the long part of the step
        drop(frame);

        let outcome = match decoded {
            Ok(()) => self.present_back(),
            Err(err) => StepOutcome::Dropped(DropReason::Decode(err)),
        };
        self.stats.record(&outcome);
        outcome
    }

    /// Paint `back` with `paint` and present it as a full frame
    pub fn present_pattern(
        &mut self,
        paint: impl FnOnce(&PanelGeometry, &mut [u8]) -> Result<(), PayloadError>,
    ) -> Result<StepOutcome, PayloadError> {
        paint(&self.geometry, self.buffers.back)?;
        let outcome = self.present(FrameKind::Full, None);
        self.stats.record(&outcome);
        Ok(outcome)
    }

    fn present_back(&mut self) -> StepOutcome {
        let frame_bytes = self.geometry.frame_bytes();
        let diff = diff_rows(
            &self.buffers.front[..frame_bytes],
            &self.buffers.back[..frame_bytes],
            &self.geometry,
        );
        match diff {
            RowDiff::Unchanged => StepOutcome::Unchanged,
            RowDiff::Regions {
                regions,
                changed_lines,
            } if self.policy.partial_updates
                && changed_lines <= self.policy.max_partial_lines as u32 =>
            {
                self.present(FrameKind::Partial, Some(regions.as_slice()))
            }
            _ => self.present(FrameKind::Full, None),
        }
    }

    fn present(
        &mut self,
        kind: FrameKind,
        regions: Option<&[partial::RegionDescriptor]>,
    ) -> StepOutcome {
        // The partial buffer may still be streaming
        self.presenter.wait_idle();

        let frame_bytes = self.geometry.frame_bytes();
        let partial_update = match (kind, regions) {
            (FrameKind::Partial, Some(regions)) => {
                match partial::plan(regions, &self.geometry, &self.timing) {
                    Ok(plan) => build_partial_payload(
                        &self.buffers.back[..frame_bytes],
                        regions,
                        &self.geometry,
                        self.buffers.partial,
                    )
                    .ok()
                    .map(|len| (plan, len)),
                    Err(_) => None,
                }
            }
            _ => None,
        };

        self.presenter.settle();
        let (kind, result) = match partial_update {
            Some((plan, len)) => (
                FrameKind::Partial,
                self.presenter
                    .present_partial(&plan, &self.buffers.partial[..len]),
            ),
            None => (
                FrameKind::Full,
                self.presenter
                    .present_full(&self.buffers.back[..frame_bytes]),
            ),
        };

        match result {
            Ok(()) => {
                core::mem::swap(&mut self.buffers.front, &mut self.buffers.back);
                StepOutcome::Presented(kind)
            }
            Err(err) => StepOutcome::Dropped(DropReason::Present(err)),
        }
    }

    /// Counters since startup
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// The image currently on screen
    pub fn front(&self) -> &[u8] {
        self.buffers.front
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::exchange::FrameExchange;
    use crate::partial::PartialPlan;
    use crate::pipeline::{DecodeError, FrameProducer, Lz4Decompressor, PresentError};
    use reflex_protocol::encode_header;
    use std::vec;
    use std::vec::Vec;

    const SLOT: usize = 2048;

    fn geometry() -> PanelGeometry {
        PanelGeometry { width: 8, lines: 16 }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Shown {
        Full(Vec<u8>),
        Partial { control: Vec<u32>, payload: Vec<u8> },
    }

    #[derive(Default)]
    struct RecordingPresenter {
        shown: Vec<Shown>,
        settles: u32,
    }

    impl FramePresenter for RecordingPresenter {
        fn is_idle(&self) -> bool {
            true
        }

        fn settle(&mut self) {
            self.settles += 1;
        }

        fn present_full(&mut self, frame: &[u8]) -> Result<(), PresentError> {
            self.shown.push(Shown::Full(frame.to_vec()));
            Ok(())
        }

        fn present_partial(
            &mut self,
            plan: &PartialPlan,
            payload: &[u8],
        ) -> Result<(), PresentError> {
            self.shown.push(Shown::Partial {
                control: plan.control().to_vec(),
                payload: payload.to_vec(),
            });
            Ok(())
        }

        fn present_dark(&mut self) -> Result<(), PresentError> {
            Ok(())
        }
    }

    fn compressed_frame(frame: &[u8]) -> Vec<u8> {
        let mut packed = vec![0u8; lz4_flex::block::get_maximum_output_size(frame.len())];
        let len = lz4_flex::block::compress_into(frame, &mut packed).unwrap();
        let mut out = Vec::from(encode_header(len as u32));
        out.extend_from_slice(&packed[..len]);
        out
    }

    struct Rig {
        front: Vec<u8>,
        back: Vec<u8>,
        partial: Vec<u8>,
    }

    impl Rig {
        fn new() -> Self {
            let geometry = geometry();
            Self {
                front: vec![0; geometry.frame_bytes()],
                back: vec![0; geometry.frame_bytes()],
                partial: vec![0; 1024],
            }
        }

        fn buffers(&mut self) -> FrameBuffers<'_> {
            FrameBuffers {
                front: &mut self.front,
                back: &mut self.back,
                partial: &mut self.partial,
            }
        }
    }

    fn policy(max_partial_lines: u16) -> UpdatePolicy {
        UpdatePolicy {
            partial_updates: true,
            max_partial_lines,
        }
    }

    #[test]
    fn test_idle_without_doorbell() {
        let mut exchange = FrameExchange::<SLOT>::new();
        let (_, reader) = exchange.split();
        let mut rig = Rig::new();
        let mut pipeline = RenderPipeline::new(
            reader,
            Lz4Decompressor,
            RecordingPresenter::default(),
            rig.buffers(),
            geometry(),
            PartialTiming::default(),
            policy(8),
        );
        assert_eq!(pipeline.step(), StepOutcome::Idle);
    }

    #[test]
    fn test_full_then_partial_then_unchanged() {
        let geometry = geometry();
        let mut exchange = FrameExchange::<SLOT>::new();
        let (writer, reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);
        let mut rig = Rig::new();
        let mut pipeline = RenderPipeline::new(
            reader,
            Lz4Decompressor,
            RecordingPresenter::default(),
            rig.buffers(),
            geometry,
            PartialTiming::default(),
            policy(8),
        );

        let first: Vec<u8> = (0..geometry.frame_bytes()).map(|i| i as u8).collect();
        producer.feed(&compressed_frame(&first));
        // Every row differs from the blank screen
        assert_eq!(pipeline.step(), StepOutcome::Presented(FrameKind::Full));
        assert_eq!(pipeline.front(), first.as_slice());

        let mut second = first.clone();
        second[3 * 8] = 0xEE;
        producer.feed(&compressed_frame(&second));
        assert_eq!(pipeline.step(), StepOutcome::Presented(FrameKind::Partial));
        assert_eq!(pipeline.front(), second.as_slice());

        producer.feed(&compressed_frame(&second));
        assert_eq!(pipeline.step(), StepOutcome::Unchanged);

        let shown = &pipeline.presenter().shown;
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0], Shown::Full(first));
        let mut payload = Vec::from(2u32.to_le_bytes());
        payload.extend_from_slice(&second[24..32]);
        payload.extend_from_slice(&[0; 4]);
        assert_eq!(
            shown[1],
            Shown::Partial {
                control: vec![2, 0, 11],
                payload,
            }
        );
        assert_eq!(pipeline.presenter().settles, 2);

        let stats = pipeline.stats();
        assert_eq!((stats.full, stats.partial, stats.unchanged), (1, 1, 1));
    }

    #[test]
    fn test_large_change_goes_full() {
        let geometry = geometry();
        let mut exchange = FrameExchange::<SLOT>::new();
        let (writer, reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);
        let mut rig = Rig::new();
        let mut pipeline = RenderPipeline::new(
            reader,
            Lz4Decompressor,
            RecordingPresenter::default(),
            rig.buffers(),
            geometry,
            PartialTiming::default(),
            policy(4),
        );

        let mut frame = vec![0u8; geometry.frame_bytes()];
        for line in 0..5 {
            frame[line * 8] = 1;
        }
        producer.feed(&compressed_frame(&frame));
        assert_eq!(pipeline.step(), StepOutcome::Presented(FrameKind::Full));
    }

    #[test]
    fn test_zero_length_frame_keeps_previous_image() {
        let geometry = geometry();
        let mut exchange = FrameExchange::<SLOT>::new();
        let (writer, reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);
        let mut rig = Rig::new();
        let mut pipeline = RenderPipeline::new(
            reader,
            Lz4Decompressor,
            RecordingPresenter::default(),
            rig.buffers(),
            geometry,
            PartialTiming::default(),
            policy(8),
        );

        let shown = vec![0x5Au8; geometry.frame_bytes()];
        producer.feed(&compressed_frame(&shown));
        assert_eq!(pipeline.step(), StepOutcome::Presented(FrameKind::Full));

        let report = producer.feed(&encode_header(0));
        assert_eq!(report.published, 1);
        assert_eq!(
            pipeline.step(),
            StepOutcome::Dropped(DropReason::Decode(DecodeError::Empty))
        );
        assert_eq!(pipeline.front(), shown.as_slice());
        assert_eq!(pipeline.presenter().shown.len(), 1);
        assert_eq!(pipeline.stats().dropped, 1);
    }

    #[test]
    fn test_corrupt_frame_dropped() {
        let mut exchange = FrameExchange::<SLOT>::new();
        let (writer, reader) = exchange.split();
        let mut producer = FrameProducer::new(writer);
        let mut rig = Rig::new();
        let mut pipeline = RenderPipeline::new(
            reader,
            Lz4Decompressor,
            RecordingPresenter::default(),
            rig.buffers(),
            geometry(),
            PartialTiming::default(),
            policy(8),
        );

        let mut stream = Vec::from(encode_header(3));
        stream.extend_from_slice(&[0xF0, 0xFF, 0xFF]);
        producer.feed(&stream);
        assert!(matches!(
            pipeline.step(),
            StepOutcome::Dropped(DropReason::Decode(DecodeError::Corrupt))
        ));
        assert!(pipeline.presenter().shown.is_empty());
    }

    #[test]
    fn test_pattern_is_presented_full() {
        let mut exchange = FrameExchange::<SLOT>::new();
        let (_, reader) = exchange.split();
        let mut rig = Rig::new();
        let mut pipeline = RenderPipeline::new(
            reader,
            Lz4Decompressor,
            RecordingPresenter::default(),
            rig.buffers(),
            geometry(),
            PartialTiming::default(),
            policy(8),
        );

        let outcome = pipeline
            .present_pattern(crate::payload::colour_bars)
            .unwrap();
        assert_eq!(outcome, StepOutcome::Presented(FrameKind::Full));
        // One-pixel bars at width 8: white then 0b001111 share the first pair
        let (msb, lsb) = crate::payload::pack_pixel_pair(0b111111, 0b001111);
        assert_eq!(msb, 0b101111);
        assert_eq!(pipeline.front()[0], msb);
        assert_eq!(pipeline.front()[4], lsb);
    }
}
