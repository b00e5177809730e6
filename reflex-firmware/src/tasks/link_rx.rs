//! Host link receive task
//!
//! Feeds every UART read straight into the frame exchange. The task never
//! waits on the render core: a frame the renderer has not picked up yet is
//! simply replaced by the next one.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embedded_io_async::Read;

use reflex_core::pipeline::FrameProducer;

use crate::channels::LINK_STATS;
use crate::SLOT_BYTES;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 256;

/// Link RX task - decodes length-prefixed frames into the exchange
#[embassy_executor::task]
pub async fn link_rx_task(mut rx: BufferedUartRx, mut producer: FrameProducer<'static, SLOT_BYTES>) {
    info!("Link RX task started");

    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                trace!("RX: {} bytes", n);

                let report = producer.feed(&buf[..n]);
                if let Some(e) = report.rejected {
                    warn!("Frame rejected: {:?}", e);
                }
                if report.published > 0 {
                    LINK_STATS.signal(producer.stats());
                }
            }
            Ok(_) => {
                // No bytes read, continue
            }
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}
