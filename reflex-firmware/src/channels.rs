//! Cross-core signals
//!
//! The frame exchange carries the frames themselves; these only carry
//! counters for the periodic log. Both are latest-value signals, so a slow
//! reader simply sees the newest snapshot.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use reflex_core::pipeline::{ProducerStats, RenderStats};

/// Render counters, published by the render task on core 1
pub static RENDER_STATS: Signal<CriticalSectionRawMutex, RenderStats> = Signal::new();

/// Link counters, published by the link task on core 0
pub static LINK_STATS: Signal<CriticalSectionRawMutex, ProducerStats> = Signal::new();
