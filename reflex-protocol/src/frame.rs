//! Length-prefixed frame decoder
//!
//! Reads arrive in arbitrary sizes, so the decoder keeps its position between
//! calls and hands out borrowed payload chunks instead of copying.

/// Size of the length prefix in bytes
pub const HEADER_LEN: usize = 4;

/// One step of decoding progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Segment<'a> {
    /// A length prefix was completed
    Start {
        /// Declared payload length in bytes
        len: u32,
    },
    /// A chunk of payload bytes, in order
    Data(&'a [u8]),
    /// The declared number of payload bytes has been delivered
    End,
}

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Collecting the length prefix
    Header { buf: [u8; HEADER_LEN], have: usize },
    /// Delivering payload bytes
    Payload { remaining: u32 },
    /// Payload complete, `End` not yet reported
    Finish,
}

/// Incremental decoder for the length-prefixed stream
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    frames: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder waiting for a length prefix
    pub const fn new() -> Self {
        Self {
            state: DecodeState::Header {
                buf: [0; HEADER_LEN],
                have: 0,
            },
            frames: 0,
        }
    }

    /// Decode the next segment from `input`, advancing it past consumed bytes
    ///
    /// Returns `None` once `input` is exhausted without completing a segment.
    /// Call repeatedly until it returns `None`, then feed the next read.
    ///
    /// A zero-length frame yields `Start { len: 0 }` immediately followed by
    /// `End`, without consuming any further bytes.
    pub fn decode<'a>(&mut self, input: &mut &'a [u8]) -> Option<Segment<'a>> {
        match self.state {
            DecodeState::Header { mut buf, mut have } => {
                if input.is_empty() {
                    return None;
                }
                let take = (HEADER_LEN - have).min(input.len());
                buf[have..have + take].copy_from_slice(&input[..take]);
                *input = &input[take..];
                have += take;

                if have < HEADER_LEN {
                    self.state = DecodeState::Header { buf, have };
                    return None;
                }

                let len = u32::from_le_bytes(buf);
                self.state = if len == 0 {
                    DecodeState::Finish
                } else {
                    DecodeState::Payload { remaining: len }
                };
                Some(Segment::Start { len })
            }
            DecodeState::Payload { remaining } => {
                if input.is_empty() {
                    return None;
                }
                let take = input.len().min(remaining as usize);
                let (chunk, rest) = input.split_at(take);
                *input = rest;

                let remaining = remaining - take as u32;
                self.state = if remaining == 0 {
                    DecodeState::Finish
                } else {
                    DecodeState::Payload { remaining }
                };
                Some(Segment::Data(chunk))
            }
            DecodeState::Finish => {
                self.reset();
                self.frames = self.frames.wrapping_add(1);
                Some(Segment::End)
            }
        }
    }

    /// True between a completed length prefix and the frame's `End`
    pub fn in_frame(&self) -> bool {
        !matches!(self.state, DecodeState::Header { .. })
    }

    /// Payload bytes still expected for the current frame
    pub fn remaining(&self) -> u32 {
        match self.state {
            DecodeState::Payload { remaining } => remaining,
            _ => 0,
        }
    }

    /// Number of frames fully decoded so far
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Drop any partial frame and wait for a new length prefix
    pub fn reset(&mut self) {
        self.state = DecodeState::Header {
            buf: [0; HEADER_LEN],
            have: 0,
        };
    }
}

/// Encode the length prefix for a payload of `len` bytes
pub fn encode_header(len: u32) -> [u8; HEADER_LEN] {
    len.to_le_bytes()
}
