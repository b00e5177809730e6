//! Panel power and bias sequencing
//!
//! Pixel data may only be sent once the primary supply is stable, an
//! all-dark frame has been written and the bias oscillator has run for at
//! least one and a half cycles. Power-down is the mirror image.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use reflex_hal::BiasOscillator;

use crate::config::PowerTiming;
use crate::pipeline::{FramePresenter, PresentError};

/// Power sequencing step, reported through errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Off,
    SupplyRising,
    DarkFrame,
    BiasSettling,
    Ready,
    ShuttingDown,
}

/// Power sequencing error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerError<E> {
    /// The supply enable pin failed
    Supply(E),
    /// The dark frame could not be written
    Present(PresentError),
}

/// Primary supply switch plus bias oscillator
pub struct PanelPower<S: OutputPin, B: BiasOscillator> {
    supply: S,
    bias: B,
    timing: PowerTiming,
    state: PowerState,
}

impl<S: OutputPin, B: BiasOscillator> PanelPower<S, B> {
    pub fn new(supply: S, bias: B, timing: PowerTiming) -> Self {
        Self {
            supply,
            bias,
            timing,
            state: PowerState::Off,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Bring the panel up to the point where frames may be sent
    ///
    /// `gck_gap_ns` is the wait after the supply rise before the first
    /// frame, at least two gate clock periods.
    pub async fn power_up<P: FramePresenter, D: DelayNs>(
        &mut self,
        presenter: &mut P,
        delay: &mut D,
        gck_gap_ns: u32,
    ) -> Result<(), PowerError<S::Error>> {
        self.state = PowerState::SupplyRising;
        self.supply.set_high().map_err(PowerError::Supply)?;
        delay.delay_us(self.timing.supply_rise_us).await;
        delay.delay_ns(gck_gap_ns).await;

        self.state = PowerState::DarkFrame;
        presenter.present_dark().map_err(PowerError::Present)?;
        delay.delay_ms(self.timing.dark_frame_ms).await;
        delay.delay_us(self.timing.bias_lead_us).await;

        self.state = PowerState::BiasSettling;
        self.bias.start();
        delay.delay_us(self.timing.bias_settle_us()).await;

        self.state = PowerState::Ready;
        Ok(())
    }

    /// Blank the panel, stop the bias and drop the supply
    ///
    /// The bias is stopped and the supply dropped even when the dark frame
    /// cannot be written; that failure is still reported.
    pub async fn power_down<P: FramePresenter, D: DelayNs>(
        &mut self,
        presenter: &mut P,
        delay: &mut D,
    ) -> Result<(), PowerError<S::Error>> {
        self.state = PowerState::ShuttingDown;
        presenter.wait_idle();
        presenter.settle();
        let dark = presenter.present_dark();
        if dark.is_ok() {
            delay.delay_ms(self.timing.dark_frame_ms).await;
        }

        self.bias.stop();
        delay.delay_us(self.timing.shutdown_settle_us).await;
        self.supply.set_low().map_err(PowerError::Supply)?;
        self.state = PowerState::Off;
        dark.map_err(PowerError::Present)
    }
}
