//! Board-agnostic timing engine and frame pipeline for the Reflex panel
//!
//! Everything that does not touch a register lives here:
//!
//! - Program registry and sequencer charging plans
//! - Lock-step start barrier with an explicit lifecycle
//! - Transfer chain planning and launch
//! - Partial-update control stream and deadline calculation
//! - Pixel formatting and partial payload building
//! - Two-slot frame exchange and the producer/render pipeline
//! - Panel driver and power sequencing
//! - Configuration types and the `panel.toml` parser
//!
//! The chip-specific side implements the `reflex-hal` traits. On the host the
//! `soft` emulator stands in for it.

#![no_std]
#![deny(unsafe_code)]

pub mod chain;
pub mod charge;
pub mod config;
pub mod config_file;
pub mod diff;
pub mod driver;
pub mod exchange;
pub mod group;
pub mod partial;
pub mod payload;
pub mod pipeline;
pub mod power;
pub mod registry;

#[cfg(test)]
pub mod soft;

pub use chain::{ChainEngine, ChainError, ChainPlan};
pub use charge::{charge, ChargeError, Role, ShifterBudget};
pub use config::PanelConfig;
pub use driver::PanelDriver;
pub use exchange::{FrameError, FrameExchange, FrameReader, FrameWriter};
pub use group::{Phase, SequencerGroup, SequencingError};
pub use partial::{PartialPlan, PlanError, RegionDescriptor};
pub use pipeline::{FramePresenter, PresentError, RenderStats, StepOutcome};
pub use power::{PanelPower, PowerError};
pub use registry::{ProgramId, ProgramRegistry, RegistryError};
