//! PWM bias oscillator
//!
//! VA and VB come from the two outputs of one slice, VB inverted, so they are
//! in antiphase by construction. VCOM runs on a second slice with the same
//! period; both slices are enabled in one register write so VCOM stays in
//! phase with VA.

use embassy_rp::pac;
use embassy_rp::peripherals::{PIN_12, PIN_13, PIN_14, PWM_SLICE6, PWM_SLICE7};
use embassy_rp::pwm::{Config, Pwm};
use embassy_rp::Peri;
use fixed::types::U12F4;
use reflex_hal::BiasOscillator;

/// Slices driving VA/VB and VCOM
const SLICE_MASK: u32 = (1 << 6) | (1 << 7);

/// Largest integer PWM divider
const MAX_DIVIDER: u32 = 255;

/// Integer divider and wrap value for a square wave of `bias_hz`
///
/// Picks the smallest divider whose period still fits the 16-bit counter, so
/// the frequency error stays small.
pub fn bias_timing(sys_clock_hz: u32, bias_hz: u32) -> (u8, u16) {
    if bias_hz == 0 {
        return (MAX_DIVIDER as u8, u16::MAX);
    }
    let period = sys_clock_hz / bias_hz;
    let divider = period.div_ceil(u16::MAX as u32 + 1).clamp(1, MAX_DIVIDER);
    let top = (period / divider).saturating_sub(1).min(u16::MAX as u32);
    (divider as u8, top as u16)
}

/// Bias oscillator on PWM slices 6 and 7
pub struct BiasPwm<'d> {
    va_vb: Pwm<'d>,
    vcom: Pwm<'d>,
    running_ab: Config,
    running_vcom: Config,
    running: bool,
}

impl<'d> BiasPwm<'d> {
    /// Claim the slices and park every output low
    pub fn new(
        slice6: Peri<'d, PWM_SLICE6>,
        va: Peri<'d, PIN_12>,
        vb: Peri<'d, PIN_13>,
        slice7: Peri<'d, PWM_SLICE7>,
        vcom: Peri<'d, PIN_14>,
        sys_clock_hz: u32,
        bias_hz: u32,
    ) -> Self {
        let (divider, top) = bias_timing(sys_clock_hz, bias_hz);
        let half = (top as u32 + 1) / 2;

        let mut running_ab = Config::default();
        running_ab.divider = U12F4::from_num(divider);
        running_ab.top = top;
        running_ab.compare_a = half as u16;
        running_ab.compare_b = half as u16;
        running_ab.invert_b = true;
        running_ab.enable = false;

        let mut running_vcom = Config::default();
        running_vcom.divider = U12F4::from_num(divider);
        running_vcom.top = top;
        running_vcom.compare_a = half as u16;
        running_vcom.enable = false;

        let parked = parked(&running_ab);
        let va_vb = Pwm::new_output_ab(slice6, va, vb, parked.clone());
        let vcom = Pwm::new_output_a(slice7, vcom, parked);

        Self {
            va_vb,
            vcom,
            running_ab,
            running_vcom,
            running: false,
        }
    }
}

/// Outputs held low: zero duty on both channels, nothing inverted
fn parked(running: &Config) -> Config {
    let mut config = running.clone();
    config.compare_a = 0;
    config.compare_b = 0;
    config.invert_b = false;
    config.enable = true;
    config
}

impl BiasOscillator for BiasPwm<'_> {
    fn start(&mut self) {
        if self.running {
            return;
        }
        self.va_vb.set_config(&self.running_ab);
        self.vcom.set_config(&self.running_vcom);
        self.va_vb.set_counter(0);
        self.vcom.set_counter(0);
        pac::PWM.en().modify(|w| w.0 |= SLICE_MASK);
        self.running = true;
    }

    fn stop(&mut self) {
        self.va_vb.set_config(&parked(&self.running_ab));
        self.vcom.set_config(&parked(&self.running_vcom));
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bias_timing_60hz() {
        // 2_500_000 counts per period needs a divider of 39
        assert_eq!(bias_timing(150_000_000, 60), (39, 64_101));
    }

    #[test]
    fn test_bias_timing_fits_counter() {
        let (divider, top) = bias_timing(150_000_000, 1);
        assert_eq!(divider, 255);
        assert_eq!(top, u16::MAX);
        assert_eq!(bias_timing(150_000_000, 0), (255, u16::MAX));
    }
}
