//! Periodic pipeline statistics

use defmt::*;
use embassy_time::{Duration, Ticker};

use reflex_core::pipeline::{ProducerStats, RenderStats};

use crate::channels::{LINK_STATS, RENDER_STATS};

/// Log interval
const STATS_INTERVAL_SECS: u64 = 5;

#[embassy_executor::task]
pub async fn stats_task() {
    let mut ticker = Ticker::every(Duration::from_secs(STATS_INTERVAL_SECS));
    let mut render = RenderStats::default();
    let mut link = ProducerStats::default();

    loop {
        ticker.next().await;

        if let Some(stats) = RENDER_STATS.try_take() {
            render = stats;
        }
        if let Some(stats) = LINK_STATS.try_take() {
            link = stats;
        }

        info!(
            "frames: {} received, {} oversized | {} full, {} partial, {} unchanged, {} dropped",
            link.published,
            link.oversized,
            render.full,
            render.partial,
            render.unchanged,
            render.dropped
        );
    }
}
