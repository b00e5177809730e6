//! Reflex - Reflective Display Driver Firmware
//!
//! Main firmware binary for RP2350-based Sharpie panel drivers.
//! Core 0 receives compressed frames over the host link; core 1 decodes,
//! diffs and streams them to the panel through the PIO timing engine.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{Executor, Spawner};
use embassy_rp::bind_interrupts;
use embassy_rp::block::ImageDef;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::{PIO0, PIO1, UART0};
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::{Delay, Timer};
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_probe as _};

use reflex_core::config::MAX_REGIONS;
use reflex_core::exchange::FrameExchange;
use reflex_core::payload::{AlignedBuffer, COUNTER_BYTES};
use reflex_core::pipeline::{FrameBuffers, FrameProducer, Lz4Decompressor, RenderPipeline};
use reflex_core::{PanelDriver, PanelPower};
use reflex_hal_rp::{setup_banks, BiasPwm, DmaChannel, PanelPins};

mod channels;
mod config;
mod tasks;

use crate::tasks::{link_rx_task, render_task, stats_task, RenderContext};

#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
    PIO1_IRQ_0 => PioInterruptHandler<PIO1>;
});

/// Largest compressed frame the link can hand over
pub const SLOT_BYTES: usize = 64 * 1024;

/// Largest formatted frame (240 x 320 at one byte per pixel)
pub const FRAME_BYTES: usize = 76_800;

/// Largest partial payload: every line changed, plus per-region framing
/// for the widest half-line a frame of `FRAME_BYTES` allows
pub const PARTIAL_BYTES: usize = FRAME_BYTES + MAX_REGIONS * (COUNTER_BYTES + 512);

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 4096]> = StaticCell::new();

// Frame memory shared between the cores
static EXCHANGE: ConstStaticCell<FrameExchange<SLOT_BYTES>> =
    ConstStaticCell::new(FrameExchange::new());
static FRONT: ConstStaticCell<AlignedBuffer<FRAME_BYTES>> =
    ConstStaticCell::new(AlignedBuffer::new());
static BACK: ConstStaticCell<AlignedBuffer<FRAME_BYTES>> =
    ConstStaticCell::new(AlignedBuffer::new());
static PARTIAL: ConstStaticCell<AlignedBuffer<PARTIAL_BYTES>> =
    ConstStaticCell::new(AlignedBuffer::new());

static CORE1_STACK: ConstStaticCell<Stack<16384>> = ConstStaticCell::new(Stack::new());
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Reflex firmware starting...");

    // Initialize RP2350 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let mut config = config::load_config();
    // The PIO dividers are computed from the clock actually running
    config.clock.sys_clock_hz = embassy_rp::clocks::clk_sys_freq();
    info!(
        "Panel {}x{}, sys clock {} Hz",
        config.geometry.width, config.geometry.lines, config.clock.sys_clock_hz
    );

    let mut led = Output::new(p.PIN_25, Level::Low);

    if config.geometry.frame_bytes() > FRAME_BYTES {
        error!(
            "Frame of {} bytes exceeds the {} byte buffers",
            config.geometry.frame_bytes(),
            FRAME_BYTES
        );
        error_blink(&mut led).await;
    }

    // Setup UART for the host link
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.link.baud_rate;

    let tx_buf = TX_BUF.init([0u8; 64]);
    let rx_buf = RX_BUF.init([0u8; 4096]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_16, p.PIN_17, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (_tx, rx) = uart.split();
    info!("Host link at {} baud", config.link.baud_rate);

    // Load both PIO program sets
    let pio0 = Pio::new(p.PIO0, Irqs);
    let pio1 = Pio::new(p.PIO1, Irqs);
    let pins = PanelPins {
        intb: p.PIN_0,
        gsp: p.PIN_1,
        gck: p.PIN_2,
        gen: p.PIN_3,
        bsp: p.PIN_4,
        bck: p.PIN_5,
        r0: p.PIN_6,
        r1: p.PIN_7,
        g0: p.PIN_8,
        g1: p.PIN_9,
        b0: p.PIN_10,
        b1: p.PIN_11,
    };
    let banks = match setup_banks(pio0, pio1, pins, &config) {
        Ok(banks) => banks,
        Err(e) => {
            error!("PIO setup failed: {:?}", e);
            error_blink(&mut led).await;
        }
    };
    info!(
        "PIO programs loaded: full at {:?}, partial at {:?}",
        banks.offsets.full, banks.offsets.partial
    );

    let channels = [DmaChannel::new(p.DMA_CH0), DmaChannel::new(p.DMA_CH1)];
    let driver = PanelDriver::new(banks.full, banks.partial, channels, Delay, &config);

    let bias = BiasPwm::new(
        p.PWM_SLICE6,
        p.PIN_12,
        p.PIN_13,
        p.PWM_SLICE7,
        p.PIN_14,
        config.clock.sys_clock_hz,
        config.power.bias_hz,
    );
    let supply = Output::new(p.PIN_15, Level::Low);
    let power = PanelPower::new(supply, bias, config.power);

    // Split the exchange between the two cores
    let (writer, reader) = EXCHANGE.take().split();
    let front: &'static mut [u8] = FRONT.take();
    let back: &'static mut [u8] = BACK.take();
    let partial: &'static mut [u8] = PARTIAL.take();
    let buffers = FrameBuffers {
        front,
        back,
        partial,
    };
    let pipeline = RenderPipeline::new(
        reader,
        Lz4Decompressor,
        driver,
        buffers,
        config.geometry,
        config.partial,
        config.policy,
    );
    let context = RenderContext { pipeline, power };

    spawn_core1(p.CORE1, CORE1_STACK.take(), move || {
        let executor1 = EXECUTOR1.init(Executor::new());
        executor1.run(|spawner| spawner.spawn(unwrap!(render_task(context))));
    });
    info!("Render core started");

    spawner.spawn(unwrap!(link_rx_task(rx, FrameProducer::new(writer))));
    spawner.spawn(unwrap!(stats_task()));

    info!("All tasks spawned, entering main loop");

    // Heartbeat
    loop {
        led.toggle();
        Timer::after_secs(1).await;
    }
}

/// Blink the LED forever after a fatal startup error
async fn error_blink(led: &mut Output<'_>) -> ! {
    loop {
        led.toggle();
        Timer::after_millis(500).await;
    }
}
