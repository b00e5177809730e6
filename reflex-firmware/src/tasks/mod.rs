//! Embassy async tasks
//!
//! Core 0 runs the link and stats tasks; core 1 runs only the render task.

pub mod link_rx;
pub mod render;
pub mod stats;

pub use link_rx::link_rx_task;
pub use render::{render_task, RenderContext};
pub use stats::stats_task;
