//! Frame streaming pipeline
//!
//! Two halves joined by the frame exchange. The producer runs on the link
//! core and turns the inbound byte stream into published slots. The render
//! pipeline runs on the other core: it picks up the newest slot, decompresses
//! it, waits for the previous transfer chain to drain and presents the frame.

pub mod decompress;
pub mod producer;
pub mod render;

pub use decompress::{DecodeError, Decompressor, Lz4Decompressor};
pub use producer::{FrameProducer, ProducerStats};
pub use render::{FrameBuffers, RenderPipeline};

use crate::chain::ChainError;
use crate::group::SequencingError;
use crate::partial::PartialPlan;

/// How a frame reached the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    /// Every line rewritten by the full-frame sequencer set
    Full,
    /// Changed lines only, by the partial-update sequencer set
    Partial,
}

/// Why a frame was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DropReason {
    /// Decompression failed; the previous image stays up
    Decode(DecodeError),
    /// The panel could not be reprogrammed
    Present(PresentError),
}

/// Result of one render step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepOutcome {
    /// Doorbell not set
    Idle,
    /// A frame was handed to the transfer chain
    Presented(FrameKind),
    /// Identical to the image on screen; nothing reprogrammed
    Unchanged,
    /// Frame discarded
    Dropped(DropReason),
}

/// Counters published by the render core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RenderStats {
    pub full: u32,
    pub partial: u32,
    pub unchanged: u32,
    pub dropped: u32,
}

impl RenderStats {
    /// Count one outcome
    pub fn record(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Idle => {}
            StepOutcome::Presented(FrameKind::Full) => self.full += 1,
            StepOutcome::Presented(FrameKind::Partial) => self.partial += 1,
            StepOutcome::Unchanged => self.unchanged += 1,
            StepOutcome::Dropped(_) => self.dropped += 1,
        }
    }

    /// Frames picked up, whatever became of them
    pub fn total(&self) -> u32 {
        self.full + self.partial + self.unchanged + self.dropped
    }
}

/// Reprogramming failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PresentError {
    /// The sequencer lifecycle was violated
    Sequencing(SequencingError),
    /// The transfer chain was rejected
    Chain(ChainError),
}

impl From<SequencingError> for PresentError {
    fn from(err: SequencingError) -> Self {
        PresentError::Sequencing(err)
    }
}

impl From<ChainError> for PresentError {
    fn from(err: ChainError) -> Self {
        PresentError::Chain(err)
    }
}

/// Something that can put a frame on the panel
///
/// Callers wait for [`is_idle`](Self::is_idle) and call
/// [`settle`](Self::settle) before each present; the present calls
/// themselves never block on a running chain.
pub trait FramePresenter {
    /// True once the previous transfer chain has drained
    fn is_idle(&self) -> bool;

    /// Spin until the previous transfer chain has drained
    fn wait_idle(&self) {
        while !self.is_idle() {
            core::hint::spin_loop();
        }
    }

    /// Wait out the residual pulses after the last transfer word
    fn settle(&mut self);

    /// Stream a formatted full frame
    fn present_full(&mut self, frame: &[u8]) -> Result<(), PresentError>;

    /// Stream a partial update
    fn present_partial(&mut self, plan: &PartialPlan, payload: &[u8]) -> Result<(), PresentError>;

    /// Stream an all-dark frame from the zero source
    fn present_dark(&mut self) -> Result<(), PresentError>;
}
