//! Render task (core 1)
//!
//! Powers the panel up, shows a colour-bar pattern, then polls the exchange
//! doorbell. The panel is powered back down if bring-up fails or the
//! sequencers keep refusing frames.

use defmt::*;
use embassy_futures::yield_now;
use embassy_rp::gpio::Output;
use embassy_time::{Delay, Duration, Instant};

use reflex_core::payload::colour_bars;
use reflex_core::pipeline::{
    DropReason, FrameKind, FramePresenter, Lz4Decompressor, RenderPipeline, StepOutcome,
};
use reflex_core::{PanelDriver, PanelPower};
use reflex_hal_rp::{BiasPwm, DmaChannel, FullBank, PartialBank};

use crate::channels::RENDER_STATS;
use crate::SLOT_BYTES;

/// Panel driver as built at startup
pub type Driver = PanelDriver<FullBank<'static>, PartialBank<'static>, DmaChannel<'static>, Delay>;

/// Everything the render core owns
pub struct RenderContext {
    pub pipeline: RenderPipeline<'static, Lz4Decompressor, Driver, SLOT_BYTES>,
    pub power: PanelPower<Output<'static>, BiasPwm<'static>>,
}

/// How often the counters are published for the stats log
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Gate clock periods between the supply rise and the first frame
const POWER_UP_GCK_PERIODS: u32 = 2;

/// Consecutive present failures before the panel is shut down
const MAX_PRESENT_FAILURES: u8 = 8;

#[embassy_executor::task]
pub async fn render_task(mut ctx: RenderContext) {
    info!("Render task started");

    let gck_gap_ns = ctx
        .pipeline
        .presenter()
        .gate_clock_periods_ns(POWER_UP_GCK_PERIODS);
    let mut delay = Delay;
    if let Err(e) = ctx
        .power
        .power_up(ctx.pipeline.presenter_mut(), &mut delay, gck_gap_ns)
        .await
    {
        error!("Panel power-up failed: {:?}", e);
        shut_down(&mut ctx, &mut delay).await;
        return;
    }
    info!("Panel powered up");

    match ctx.pipeline.present_pattern(colour_bars) {
        Ok(outcome) => debug!("Startup pattern: {:?}", outcome),
        Err(e) => warn!("Startup pattern failed: {:?}", e),
    }

    let mut mode = ctx.pipeline.presenter().mode();
    let mut last_publish = Instant::now();
    let mut present_failures = 0u8;

    loop {
        match ctx.pipeline.step() {
            StepOutcome::Idle => yield_now().await,
            StepOutcome::Presented(kind) => {
                present_failures = 0;
                if mode != Some(kind) {
                    info!("Switched to {:?} updates", kind);
                    mode = Some(kind);
                }
                match kind {
                    FrameKind::Full => debug!("Full frame presented"),
                    FrameKind::Partial => trace!("Partial frame presented"),
                }
            }
            StepOutcome::Unchanged => trace!("Frame unchanged"),
            StepOutcome::Dropped(DropReason::Decode(e)) => {
                warn!("Frame dropped, decode failed: {:?}", e);
            }
            StepOutcome::Dropped(DropReason::Present(e)) => {
                warn!("Frame dropped, present failed: {:?}", e);
                present_failures += 1;
                if present_failures >= MAX_PRESENT_FAILURES {
                    error!("{} frames refused in a row", present_failures);
                    shut_down(&mut ctx, &mut delay).await;
                    return;
                }
                // Let the chain drain before the next attempt
                ctx.pipeline.presenter().wait_idle();
            }
        }

        if last_publish.elapsed() >= STATS_INTERVAL {
            RENDER_STATS.signal(ctx.pipeline.stats());
            last_publish = Instant::now();
        }
    }
}

/// Leave the panel dark and unpowered
async fn shut_down(ctx: &mut RenderContext, delay: &mut Delay) {
    match ctx
        .power
        .power_down(ctx.pipeline.presenter_mut(), delay)
        .await
    {
        Ok(()) => info!("Panel powered down"),
        Err(e) => error!("Panel power-down incomplete: {:?}", e),
    }
    RENDER_STATS.signal(ctx.pipeline.stats());
}
