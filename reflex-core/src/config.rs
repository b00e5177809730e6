//! Panel, timing and runtime configuration
//!
//! Every count the sequencers are charged with is derived from these structs
//! at call time; nothing is precomputed into constants elsewhere.

/// Maximum number of changed regions in one partial update
pub const MAX_REGIONS: usize = 16;

/// Clock edges the data shifter spends on the start pulse of each half-line
pub const SHIFTER_START_EDGES: u32 = 4;

/// Configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Panel width must be a non-zero multiple of 8 pixels
    InvalidWidth,
    /// Panel must have at least one line
    InvalidLines,
    /// System clock must be non-zero
    InvalidClock,
    /// Half-line width of the partial timing must be non-zero
    InvalidHalfLineWidth,
    /// Bias frequency must be non-zero
    InvalidBiasFrequency,
    /// Bias must run at least 1.5 cycles (3 half-cycles) before pixel data
    BiasSettleTooShort,
    /// Partial-update line limit exceeds the panel height
    PartialLimitTooLarge,
}

/// System clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// System clock frequency in Hz
    pub sys_clock_hz: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sys_clock_hz: 150_000_000,
        }
    }
}

/// Panel geometry
///
/// One byte per pixel. A line is sent as two half-lines: the MSB plane, then
/// the LSB plane, each `width / 2` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelGeometry {
    /// Pixels per line
    pub width: u16,
    /// Number of scanlines
    pub lines: u16,
}

impl Default for PanelGeometry {
    fn default() -> Self {
        Self {
            width: 240,
            lines: 320,
        }
    }
}

impl PanelGeometry {
    /// Bytes in one formatted line
    pub const fn line_bytes(&self) -> usize {
        self.width as usize
    }

    /// Bytes in one half-line (one bit plane of a line)
    pub const fn half_line_bytes(&self) -> usize {
        self.width as usize / 2
    }

    /// Words in one half-line
    pub const fn half_line_words(&self) -> u32 {
        (self.half_line_bytes() / 4) as u32
    }

    /// Bytes in one full formatted frame
    pub const fn frame_bytes(&self) -> usize {
        self.width as usize * self.lines as usize
    }

    /// Words in one full formatted frame
    pub const fn frame_words(&self) -> u32 {
        (self.frame_bytes() / 4) as u32
    }

    /// Half-lines in one full frame
    pub const fn half_lines(&self) -> u32 {
        self.lines as u32 * 2
    }

    /// Byte pairs the data shifter emits per half-line
    pub const fn pairs_per_half_line(&self) -> u32 {
        (self.half_line_bytes() / 2) as u32
    }
}

/// Full-frame protocol timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtocolTiming {
    /// System clock cycles per gate clock half-period
    pub gck_half_period_cycles: u32,
    /// Gate clock half-periods to wait after the last transfer word
    ///
    /// The protocol emits five residual half-periods; one more is margin.
    pub settle_pulses: u32,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            gck_half_period_cycles: 12_400,
            settle_pulses: 6,
        }
    }
}

impl ProtocolTiming {
    /// Duration of `count` gate clock half-periods in nanoseconds
    pub fn half_periods_ns(&self, count: u32, sys_clock_hz: u32) -> u32 {
        if sys_clock_hz == 0 {
            return 0;
        }
        let cycles = self.gck_half_period_cycles as u64 * count as u64;
        let ns = (cycles * 1_000_000_000).div_ceil(sys_clock_hz as u64);
        ns.min(u32::MAX as u64) as u32
    }

    /// Settle delay after the transfer chain drains, in nanoseconds
    ///
    /// Scales with the clock: the residual pulses are clocked by the
    /// sequencers, so a faster clock finishes them sooner.
    pub fn settle_ns(&self, sys_clock_hz: u32) -> u32 {
        self.half_periods_ns(self.settle_pulses, sys_clock_hz)
    }
}

/// Partial-update timing constants for the deadline calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartialTiming {
    /// Deadline ticks spent per changed half-line
    pub half_line_width: u32,
    /// Warm-up ticks when the frame opens with skipped lines
    pub lead_with_skip: u32,
    /// Warm-up ticks when the frame opens with changed lines
    pub lead_with_change: u32,
}

impl Default for PartialTiming {
    fn default() -> Self {
        Self {
            half_line_width: 32,
            lead_with_skip: 64,
            lead_with_change: 32,
        }
    }
}

/// Panel power and bias sequencing timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerTiming {
    /// Primary supply rise time in microseconds
    pub supply_rise_us: u32,
    /// Time to clock out one all-dark frame, in milliseconds
    pub dark_frame_ms: u32,
    /// Gap between the dark frame and bias start, in microseconds
    pub bias_lead_us: u32,
    /// Bias oscillator frequency in Hz
    pub bias_hz: u32,
    /// Bias half-cycles to wait before the first pixel data
    pub bias_settle_half_cycles: u32,
    /// Wait between stopping the bias and dropping the supply, in microseconds
    pub shutdown_settle_us: u32,
}

impl Default for PowerTiming {
    fn default() -> Self {
        Self {
            supply_rise_us: 1_000,
            dark_frame_ms: 60,
            bias_lead_us: 30,
            bias_hz: 60,
            bias_settle_half_cycles: 4,
            shutdown_settle_us: 30,
        }
    }
}

impl PowerTiming {
    /// Time for the bias to settle, in microseconds
    pub fn bias_settle_us(&self) -> u32 {
        if self.bias_hz == 0 {
            return 0;
        }
        (self.bias_settle_half_cycles as u64 * 500_000).div_ceil(self.bias_hz as u64) as u32
    }
}

/// When the consumer chooses a partial update over a full frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdatePolicy {
    /// Allow partial updates at all
    pub partial_updates: bool,
    /// Largest number of changed lines still sent as a partial update
    pub max_partial_lines: u16,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            partial_updates: true,
            max_partial_lines: 160,
        }
    }
}

/// Host link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// UART baud rate
    pub baud_rate: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: 3_000_000,
        }
    }
}

/// Complete driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelConfig {
    pub clock: ClockConfig,
    pub geometry: PanelGeometry,
    pub protocol: ProtocolTiming,
    pub partial: PartialTiming,
    pub power: PowerTiming,
    pub policy: UpdatePolicy,
    pub link: LinkConfig,
}

impl PanelConfig {
    /// Check the invariants the timing engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geometry.width == 0 || self.geometry.width % 8 != 0 {
            return Err(ConfigError::InvalidWidth);
        }
        if self.geometry.lines == 0 {
            return Err(ConfigError::InvalidLines);
        }
        if self.clock.sys_clock_hz == 0 {
            return Err(ConfigError::InvalidClock);
        }
        if self.partial.half_line_width == 0 {
            return Err(ConfigError::InvalidHalfLineWidth);
        }
        if self.power.bias_hz == 0 {
            return Err(ConfigError::InvalidBiasFrequency);
        }
        if self.power.bias_settle_half_cycles < 3 {
            return Err(ConfigError::BiasSettleTooShort);
        }
        if self.policy.max_partial_lines > self.geometry.lines {
            return Err(ConfigError::PartialLimitTooLarge);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let g = PanelGeometry::default();
        assert_eq!(g.half_line_bytes(), 120);
        assert_eq!(g.half_line_words(), 30);
        assert_eq!(g.frame_bytes(), 76_800);
        assert_eq!(g.frame_words(), 19_200);
        assert_eq!(g.pairs_per_half_line(), 60);
        assert_eq!(g.half_lines(), 640);
    }

    #[test]
    fn test_settle_scales_with_clock() {
        let timing = ProtocolTiming::default();
        // 12_400 cycles at 200 MHz is 62 µs; six of them
        assert_eq!(timing.settle_ns(200_000_000), 372_000);
        // Halving the clock doubles the wait
        assert_eq!(timing.settle_ns(100_000_000), 744_000);
        assert_eq!(timing.settle_ns(0), 0);
    }

    #[test]
    fn test_bias_settle() {
        let power = PowerTiming::default();
        // Two full 60 Hz cycles
        assert_eq!(power.bias_settle_us(), 33_334);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(PanelConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PanelConfig::default();
        config.geometry.width = 244;
        assert_eq!(config.validate(), Err(ConfigError::InvalidWidth));

        let mut config = PanelConfig::default();
        config.power.bias_settle_half_cycles = 2;
        assert_eq!(config.validate(), Err(ConfigError::BiasSettleTooShort));

        let mut config = PanelConfig::default();
        config.policy.max_partial_lines = 321;
        assert_eq!(config.validate(), Err(ConfigError::PartialLimitTooLarge));
    }
}
