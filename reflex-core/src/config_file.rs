//! Simple TOML parser for panel configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! `panel.toml`. It does NOT support the full TOML spec.
//!
//! Supported features:
//! - Key = value pairs (integer, boolean)
//! - [section] headers
//! - Integers with `_` digit separators
//! - Comments (# ...)
//!
//! Keys that are absent keep their default value.

use crate::config::PanelConfig;

/// Parse error, with the 1-based line it occurred on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection(usize),
    /// Key not valid in its section
    UnknownKey(usize),
    /// Value of the wrong type or out of range
    InvalidValue(usize),
    /// Line is neither a header nor `key = value`
    Malformed(usize),
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Clock,
    Panel,
    Protocol,
    Partial,
    Power,
    Policy,
    Link,
}

/// Parse `panel.toml` on top of the default configuration
pub fn parse_config(input: &str) -> Result<PanelConfig, ParseError> {
    let mut config = PanelConfig::default();
    let mut section = Section::Root;

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(line).trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])
                .ok_or(ParseError::InvalidSection(line_no))?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::Malformed(line_no))?;
        apply(&mut config, section, key, value, line_no)?;
    }

    Ok(config)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_section_header(header: &str) -> Option<Section> {
    match header.trim() {
        "clock" => Some(Section::Clock),
        "panel" => Some(Section::Panel),
        "protocol" => Some(Section::Protocol),
        "partial" => Some(Section::Partial),
        "power" => Some(Section::Power),
        "policy" => Some(Section::Policy),
        "link" => Some(Section::Link),
        _ => None,
    }
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse an unsigned integer, allowing `_` between digits
fn parse_u32(value: &str) -> Option<u32> {
    let mut result: u32 = 0;
    let mut digits = 0;
    for c in value.chars() {
        if c == '_' {
            continue;
        }
        let digit = c.to_digit(10)?;
        result = result.checked_mul(10)?.checked_add(digit)?;
        digits += 1;
    }
    if digits == 0 {
        return None;
    }
    Some(result)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn apply(
    config: &mut PanelConfig,
    section: Section,
    key: &str,
    value: &str,
    line_no: usize,
) -> Result<(), ParseError> {
    let int = || parse_u32(value).ok_or(ParseError::InvalidValue(line_no));
    let short = || {
        parse_u32(value)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or(ParseError::InvalidValue(line_no))
    };

    match (section, key) {
        (Section::Clock, "sys_clock_hz") => config.clock.sys_clock_hz = int()?,
        (Section::Panel, "width") => config.geometry.width = short()?,
        (Section::Panel, "lines") => config.geometry.lines = short()?,
        (Section::Protocol, "gck_half_period_cycles") => {
            config.protocol.gck_half_period_cycles = int()?
        }
        (Section::Protocol, "settle_pulses") => config.protocol.settle_pulses = int()?,
        (Section::Partial, "half_line_width") => config.partial.half_line_width = int()?,
        (Section::Partial, "lead_with_skip") => config.partial.lead_with_skip = int()?,
        (Section::Partial, "lead_with_change") => config.partial.lead_with_change = int()?,
        (Section::Power, "supply_rise_us") => config.power.supply_rise_us = int()?,
        (Section::Power, "dark_frame_ms") => config.power.dark_frame_ms = int()?,
        (Section::Power, "bias_lead_us") => config.power.bias_lead_us = int()?,
        (Section::Power, "bias_hz") => config.power.bias_hz = int()?,
        (Section::Power, "bias_settle_half_cycles") => {
            config.power.bias_settle_half_cycles = int()?
        }
        (Section::Power, "shutdown_settle_us") => config.power.shutdown_settle_us = int()?,
        (Section::Policy, "partial_updates") => {
            config.policy.partial_updates =
                parse_bool(value).ok_or(ParseError::InvalidValue(line_no))?
        }
        (Section::Policy, "max_partial_lines") => config.policy.max_partial_lines = short()?,
        (Section::Link, "baud_rate") => config.link.baud_rate = int()?,
        _ => return Err(ParseError::UnknownKey(line_no)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u32() {
        assert_eq!(parse_u32("12_400"), Some(12_400));
        assert_eq!(parse_u32("0"), Some(0));
        assert_eq!(parse_u32("_"), None);
        assert_eq!(parse_u32("-1"), None);
        assert_eq!(parse_u32("4294967296"), None);
    }

    #[test]
    fn test_parse_full_file() {
        let input = "\
# comment line
[clock]
sys_clock_hz = 200_000_000   # overclocked

[panel]
width = 240
lines = 320

[policy]
partial_updates = false
max_partial_lines = 40
";
        let config = parse_config(input).unwrap();
        assert_eq!(config.clock.sys_clock_hz, 200_000_000);
        assert_eq!(config.geometry.width, 240);
        assert!(!config.policy.partial_updates);
        assert_eq!(config.policy.max_partial_lines, 40);
        // Untouched sections keep their defaults
        assert_eq!(config.protocol, PanelConfig::default().protocol);
    }

    #[test]
    fn test_empty_input_gives_defaults() {
        assert_eq!(parse_config(""), Ok(PanelConfig::default()));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert_eq!(
            parse_config("[panel]\nwidth = 240\n[display]"),
            Err(ParseError::InvalidSection(3))
        );
        assert_eq!(
            parse_config("[panel]\ncolour = 1"),
            Err(ParseError::UnknownKey(2))
        );
        assert_eq!(
            parse_config("[panel]\nlines = 70000"),
            Err(ParseError::InvalidValue(2))
        );
        assert_eq!(
            parse_config("[policy]\npartial_updates = yes"),
            Err(ParseError::InvalidValue(2))
        );
        assert_eq!(parse_config("width"), Err(ParseError::Malformed(1)));
        // Keys outside any section are unknown
        assert_eq!(parse_config("width = 240"), Err(ParseError::UnknownKey(1)));
    }
}
