//! RP2350-specific HAL for the Reflex panel driver
//!
//! This crate implements the `reflex-hal` traits on top of embassy-rp:
//!
//! - PIO microprograms for both protocol modes and their clock dividers
//! - State machine wrappers driven by injected micro-instructions
//! - Block-wide group control and pin hand-over between PIO blocks
//! - DMA channels programmed directly, so links can be armed without firing
//! - PWM bias oscillator
//!
//! PIO0 carries the full-frame bank, PIO1 the partial-update bank. Both are
//! configured once at boot; afterwards only `bind_pins` decides which block
//! drives the panel.

#![no_std]

pub mod bank;
pub mod bias;
pub mod block;
pub mod dma;
pub mod pio;
pub mod sequencer;
pub mod store;

pub use bank::{setup_banks, FullBank, LoadReport, PanelBanks, PanelPins, PartialBank, SetupError};
pub use bias::BiasPwm;
pub use dma::DmaChannel;
pub use store::PioStore;
