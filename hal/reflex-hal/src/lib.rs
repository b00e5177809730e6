//! Hardware abstraction traits for the Reflex panel driver
//!
//! This crate defines the seams between the board-agnostic timing logic in
//! `reflex-core` and a chip-specific implementation (`reflex-hal-rp`, or the
//! software emulator in `reflex-core::soft`).
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      reflex-firmware                      │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  reflex-core (registry, charging, barrier, chain, plans)  │
//! └───────────────────────────────────────────────────────────┘
//!                              │ uses traits
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │   reflex-hal: Sequencer, GroupControl, SequencerBank,     │
//! │   InstructionStore, TransferChannel, BiasOscillator       │
//! └───────────────────────────────────────────────────────────┘
//!                 │                             │
//!                 ▼                             ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  reflex-hal-rp (RP2350)  │   │   reflex-core::soft      │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod bias;
pub mod program;
pub mod sequencer;
pub mod transfer;

pub use bias::BiasOscillator;
pub use program::{InstructionStore, StoreFull};
pub use sequencer::{GroupControl, MicroOp, QueueTarget, Sequencer, SequencerBank, BANK_SIZE};
pub use transfer::{TransferChannel, TransferDescriptor, WordSource, WORD_BYTES};
