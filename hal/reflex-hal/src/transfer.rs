//! Bulk transfer channels feeding sequencer queues

use crate::sequencer::QueueTarget;

/// Size of one transfer element in bytes
pub const WORD_BYTES: usize = 4;

/// Where a transfer reads its words from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSource<'a> {
    /// Incrementing read through a word-aligned byte buffer (little-endian words)
    Buffer(&'a [u8]),
    /// Incrementing read through a word slice
    Words(&'a [u32]),
    /// The same zero word, read repeatedly
    Zeros,
}

/// One link of a transfer chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor<'a> {
    /// Word source
    pub source: WordSource<'a>,
    /// Number of 32-bit words to move
    pub words: u32,
    /// Destination queue, also the data-request that paces the transfer
    pub target: QueueTarget,
    /// Index (within the same chain) of the descriptor to arm on completion
    pub chain_to: Option<usize>,
}

/// A single bulk transfer channel
pub trait TransferChannel {
    /// Hardware channel number, used as a chain target
    fn id(&self) -> u8;

    /// Program the channel
    ///
    /// `chain_to` is the id of the channel to trigger on completion. With
    /// `start` set the channel begins on the destination's first data
    /// request; otherwise it stays armed until triggered by a chain.
    fn configure(&mut self, desc: &TransferDescriptor<'_>, chain_to: Option<u8>, start: bool);

    /// True while a triggered channel still has words to move
    fn is_busy(&self) -> bool;
}
