//! Host link framing
//!
//! The host streams compressed frames over a plain byte link. Each frame is a
//! little-endian length prefix followed by exactly that many payload bytes:
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ LENGTH (LE)  │ COMPRESSED PIXEL DATA        │
//! │ 4B           │ LENGTH bytes                 │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! There is no start marker, checksum or acknowledgement. Flow control is
//! whatever backpressure the transport provides; the receiver never asks the
//! host to slow down and simply keeps the newest complete frame.

#![no_std]
#![deny(unsafe_code)]

pub mod frame;

pub use frame::{encode_header, FrameDecoder, Segment, HEADER_LEN};
